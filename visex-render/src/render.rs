use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use anyhow::Result;
use std::collections::HashMap;
use tiny_skia::{
    Color, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Stroke, Transform,
};
use visex_core::{ImageStimulus, Placement, Stimulus};

/// What the current frame should show. Built by the host loop from the
/// experiment state.
pub enum Screen<'a> {
    Welcome {
        present_key: char,
        absent_key: char,
    },
    Fixation,
    Array {
        placements: &'a [Placement<ImageStimulus>],
    },
    Feedback {
        correct: bool,
    },
    Blank,
    Debrief {
        stats: DebriefStats,
    },
}

/// Aggregates shown on the final screen.
#[derive(Debug, Clone, Copy)]
pub struct DebriefStats {
    pub trials: usize,
    pub accuracy: Option<f64>,
    pub mean_rt_ms: Option<f64>,
}

#[derive(Clone)]
struct CachedGlyph {
    bitmap: Vec<u8>,
    width: u32,
    height: u32,
    bearing_x: i32,
    bearing_y: i32,
}

#[derive(Hash, Eq, PartialEq, Clone, Copy)]
struct GlyphCacheKey {
    glyph_id: u16,
    scale_bits: u32, // f32 bits for exact scale matching
}

/// Software renderer for the search display: fixation cross, image array,
/// feedback marks and text screens, drawn into a tiny-skia pixmap.
pub struct SearchRenderer {
    width: u32,
    height: u32,
    center_x: f32,
    center_y: f32,
    /// Pixels per fixation-relative unit.
    px_per_unit: f32,
    font: FontArc,
    glyph_cache: HashMap<GlyphCacheKey, CachedGlyph>,
    /// Decoded stimulus images keyed by asset cache id.
    stimulus_cache: HashMap<usize, Pixmap>,
}

impl SearchRenderer {
    pub fn new(width: u32, height: u32, font: FontArc, px_per_unit: f32) -> Self {
        Self {
            width,
            height,
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            px_per_unit,
            font,
            glyph_cache: HashMap::with_capacity(256),
            stimulus_cache: HashMap::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.center_x = width as f32 / 2.0;
        self.center_y = height as f32 / 2.0;
    }

    /// Register a decoded, already-scaled stimulus image.
    pub fn register_stimulus(&mut self, cache_id: usize, pixmap: Pixmap) {
        self.stimulus_cache.insert(cache_id, pixmap);
    }

    pub fn has_stimulus(&self, cache_id: usize) -> bool {
        self.stimulus_cache.contains_key(&cache_id)
    }

    /// Render a complete frame for the given screen.
    pub fn render_frame(
        &mut self,
        pixmap: &mut Pixmap,
        screen: &Screen<'_>,
        progress: Option<(usize, usize)>,
    ) -> Result<()> {
        pixmap.fill(Color::from_rgba8(128, 128, 128, 255));

        match screen {
            Screen::Welcome {
                present_key,
                absent_key,
            } => self.render_welcome(pixmap, *present_key, *absent_key)?,
            Screen::Fixation => self.render_fixation_cross(pixmap),
            Screen::Array { placements } => {
                self.render_array(pixmap, placements);
                self.render_fixation_cross(pixmap);
            }
            Screen::Feedback { correct } => self.render_feedback(pixmap, *correct),
            Screen::Blank => {}
            Screen::Debrief { stats } => self.render_debrief(pixmap, stats)?,
        }

        if let Some((current, total)) = progress {
            let text = format!("Trial: {current}/{total}");
            self.draw_text(
                pixmap,
                &text,
                70.0,
                30.0,
                14.0,
                Color::from_rgba8(60, 60, 60, 255),
            )?;
        }

        Ok(())
    }

    fn render_welcome(&mut self, pixmap: &mut Pixmap, present: char, absent: char) -> Result<()> {
        self.draw_text(
            pixmap,
            "VISUAL SEARCH",
            self.center_x,
            self.center_y - 100.0,
            32.0,
            Color::BLACK,
        )?;
        self.draw_text(
            pixmap,
            "Look for the target among the items.",
            self.center_x,
            self.center_y - 30.0,
            18.0,
            Color::from_rgba8(40, 40, 40, 255),
        )?;
        let keys = format!(
            "Press '{}' if the target is present, '{}' if it is absent.",
            present.to_uppercase(),
            absent.to_uppercase()
        );
        self.draw_text(
            pixmap,
            &keys,
            self.center_x,
            self.center_y,
            18.0,
            Color::from_rgba8(40, 40, 40, 255),
        )?;
        self.draw_text(
            pixmap,
            "Press SPACE to begin",
            self.center_x,
            self.center_y + 60.0,
            18.0,
            Color::from_rgba8(40, 40, 40, 255),
        )?;
        self.draw_text(
            pixmap,
            "Press ESC to exit",
            self.center_x,
            self.center_y + 90.0,
            14.0,
            Color::from_rgba8(90, 90, 90, 255),
        )?;
        Ok(())
    }

    fn render_fixation_cross(&self, pixmap: &mut Pixmap) {
        let mut paint = Paint::default();
        paint.set_color(Color::BLACK);
        paint.anti_alias = true;

        let arm = self.px_per_unit * 0.5;
        let stroke = Stroke {
            width: 2.0,
            ..Default::default()
        };

        let mut pb = PathBuilder::new();
        pb.move_to(self.center_x - arm, self.center_y);
        pb.line_to(self.center_x + arm, self.center_y);
        pb.move_to(self.center_x, self.center_y - arm);
        pb.line_to(self.center_x, self.center_y + arm);
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    fn render_array(&self, pixmap: &mut Pixmap, placements: &[Placement<ImageStimulus>]) {
        for placement in placements {
            let Some(image) = self.stimulus_cache.get(&placement.stimulus.cache_id()) else {
                continue;
            };
            // unit coordinates have y up, pixels have y down
            let (ux, uy) = placement.position;
            let x = self.center_x + ux * self.px_per_unit - image.width() as f32 / 2.0;
            let y = self.center_y - uy * self.px_per_unit - image.height() as f32 / 2.0;
            pixmap.draw_pixmap(
                x.round() as i32,
                y.round() as i32,
                image.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
    }

    fn render_feedback(&self, pixmap: &mut Pixmap, correct: bool) {
        let size = self.px_per_unit;
        let stroke = Stroke {
            width: size * 0.2,
            ..Default::default()
        };
        let mut paint = Paint::default();
        paint.anti_alias = true;

        if correct {
            // green tick
            paint.set_color(Color::from_rgba8(0, 150, 0, 255));
            let mut pb = PathBuilder::new();
            pb.move_to(self.center_x - size, self.center_y);
            pb.line_to(self.center_x - size * 0.25, self.center_y + size * 0.75);
            pb.line_to(self.center_x + size, self.center_y - size * 0.75);
            if let Some(path) = pb.finish() {
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        } else {
            // red cross
            paint.set_color(Color::from_rgba8(190, 0, 0, 255));
            let mut pb = PathBuilder::new();
            pb.move_to(self.center_x - size, self.center_y - size);
            pb.line_to(self.center_x + size, self.center_y + size);
            pb.move_to(self.center_x + size, self.center_y - size);
            pb.line_to(self.center_x - size, self.center_y + size);
            if let Some(path) = pb.finish() {
                pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }
    }

    fn render_debrief(&mut self, pixmap: &mut Pixmap, stats: &DebriefStats) -> Result<()> {
        self.draw_text(
            pixmap,
            "EXPERIMENT COMPLETE",
            self.center_x,
            self.center_y - 80.0,
            28.0,
            Color::BLACK,
        )?;

        let trials = format!("Trials completed: {}", stats.trials);
        self.draw_text(
            pixmap,
            &trials,
            self.center_x,
            self.center_y - 20.0,
            18.0,
            Color::from_rgba8(40, 40, 40, 255),
        )?;

        if let Some(accuracy) = stats.accuracy {
            let text = format!("Accuracy: {:.1}%", accuracy * 100.0);
            self.draw_text(
                pixmap,
                &text,
                self.center_x,
                self.center_y + 10.0,
                18.0,
                Color::from_rgba8(40, 40, 40, 255),
            )?;
        }

        if let Some(mean_rt) = stats.mean_rt_ms {
            let text = format!("Mean RT: {mean_rt:.1} ms");
            self.draw_text(
                pixmap,
                &text,
                self.center_x,
                self.center_y + 40.0,
                18.0,
                Color::from_rgba8(40, 40, 40, 255),
            )?;
        }

        self.draw_text(
            pixmap,
            "Data saved. Thank you!",
            self.center_x,
            self.center_y + 100.0,
            16.0,
            Color::from_rgba8(90, 90, 90, 255),
        )?;
        Ok(())
    }

    /// Draw one line of text centered on `x`, baseline at `baseline_y`.
    fn draw_text(
        &mut self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        baseline_y: f32,
        size: f32,
        color: Color,
    ) -> Result<()> {
        let w = pixmap.width();
        let h = pixmap.height();
        let cu8 = color.to_color_u8();
        let (cr, cg, cb, ca) = (cu8.red(), cu8.green(), cu8.blue(), cu8.alpha());

        let scale = PxScale::from(size);

        // Stage 1: layout, centered, collecting cache misses
        let (glyphs_to_draw, misses) = {
            let scaled_font = self.font.as_scaled(scale);

            let mut line_width = 0.0_f32;
            let mut prev = None;
            for ch in text.chars() {
                let gid = self.font.glyph_id(ch);
                if let Some(prev_gid) = prev {
                    line_width += scaled_font.kern(prev_gid, gid);
                }
                line_width += scaled_font.h_advance(gid);
                prev = Some(gid);
            }

            let mut pen_x = x - line_width / 2.0;
            let mut prev = None;
            let mut glyphs = Vec::with_capacity(text.len());
            let mut misses: Vec<(ab_glyph::GlyphId, GlyphCacheKey)> = Vec::new();

            for ch in text.chars() {
                let gid = self.font.glyph_id(ch);
                if let Some(prev_gid) = prev {
                    pen_x += scaled_font.kern(prev_gid, gid);
                }
                let glyph = Glyph {
                    id: gid,
                    scale,
                    position: point(pen_x, baseline_y),
                };

                let key = GlyphCacheKey {
                    glyph_id: gid.0,
                    scale_bits: size.to_bits(),
                };
                if !self.glyph_cache.contains_key(&key) {
                    misses.push((gid, key));
                }
                glyphs.push((glyph, key));
                pen_x += scaled_font.h_advance(gid);
                prev = Some(gid);
            }

            (glyphs, misses)
        };

        // Stage 2: rasterize cache misses
        if !misses.is_empty() {
            let scaled_font = self.font.as_scaled(scale);
            for (gid, key) in misses {
                let glyph = Glyph {
                    id: gid,
                    scale,
                    position: point(0.0, 0.0),
                };
                if let Some(outlined) = scaled_font.outline_glyph(glyph) {
                    let bounds = outlined.px_bounds();
                    let gw = bounds.width().ceil() as u32;
                    let gh = bounds.height().ceil() as u32;
                    if gw == 0 || gh == 0 {
                        continue;
                    }
                    let mut bitmap = vec![0u8; (gw * gh) as usize];
                    outlined.draw(|gx, gy, cov| {
                        bitmap[(gy * gw + gx) as usize] = (cov * 255.0) as u8;
                    });
                    self.glyph_cache.insert(
                        key,
                        CachedGlyph {
                            bitmap,
                            width: gw,
                            height: gh,
                            bearing_x: bounds.min.x.floor() as i32,
                            bearing_y: bounds.min.y.floor() as i32,
                        },
                    );
                }
            }
        }

        // Stage 3: blit cached glyphs
        let pixels = pixmap.pixels_mut();
        for (glyph, key) in glyphs_to_draw {
            if let Some(cached) = self.glyph_cache.get(&key) {
                blit_glyph(pixels, w, h, &glyph, cached, cr, cg, cb, ca);
            }
        }

        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn blit_glyph(
    pixels: &mut [PremultipliedColorU8],
    w: u32,
    h: u32,
    glyph: &Glyph,
    cached: &CachedGlyph,
    cr: u8,
    cg: u8,
    cb: u8,
    ca: u8,
) {
    let glyph_x = glyph.position.x as i32 + cached.bearing_x;
    let glyph_y = glyph.position.y as i32 + cached.bearing_y;

    let wi = w as i32;
    let hi = h as i32;

    let cr_f = cr as f32 / 255.0;
    let cg_f = cg as f32 / 255.0;
    let cb_f = cb as f32 / 255.0;
    let ca_f = ca as f32 / 255.0;

    for gy in 0..cached.height as i32 {
        let py = glyph_y + gy;
        if py < 0 || py >= hi {
            continue;
        }

        let src_row = (gy as u32 * cached.width) as usize;
        let dst_row = (py as u32 * w) as usize;

        for gx in 0..cached.width as i32 {
            let px = glyph_x + gx;
            if px < 0 || px >= wi {
                continue;
            }

            let coverage = cached.bitmap[src_row + gx as usize];
            if coverage == 0 {
                continue;
            }

            let alpha = ca_f * coverage as f32 / 255.0;
            let dst_idx = dst_row + px as usize;

            if alpha >= 0.999 {
                if let Some(c) = PremultipliedColorU8::from_rgba(cr, cg, cb, 255) {
                    pixels[dst_idx] = c;
                }
                continue;
            }

            let dst = &pixels[dst_idx];
            let src_r = (cr_f * alpha * 255.0) as u8;
            let src_g = (cg_f * alpha * 255.0) as u8;
            let src_b = (cb_f * alpha * 255.0) as u8;
            let src_a = (alpha * 255.0) as u8;

            // Porter-Duff over in premultiplied space
            let inv = 1.0 - alpha;
            let out_r = (src_r as f32 + dst.red() as f32 * inv) as u8;
            let out_g = (src_g as f32 + dst.green() as f32 * inv) as u8;
            let out_b = (src_b as f32 + dst.blue() as f32 * inv) as u8;
            let out_a = src_a.max(dst.alpha());

            if let Some(c) = PremultipliedColorU8::from_rgba(
                out_r.min(out_a),
                out_g.min(out_a),
                out_b.min(out_a),
                out_a,
            ) {
                pixels[dst_idx] = c;
            }
        }
    }
}
