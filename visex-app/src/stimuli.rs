//! Decodes stimulus image files into premultiplied pixmaps for the
//! renderer's cache.

use anyhow::{anyhow, Context, Result};
use tiny_skia::{Pixmap, PremultipliedColorU8};
use visex_core::Stimulus;
use visex_experiment::StimulusSet;

/// Decode every catalogue image, scaled to fit a square of `edge_px`.
pub fn decode_stimuli(set: &StimulusSet, edge_px: u32) -> Result<Vec<(usize, Pixmap)>> {
    let mut decoded = Vec::new();
    for asset in set.all() {
        let image = image::open(&asset.path)
            .with_context(|| format!("failed to decode stimulus '{}'", asset.path.display()))?;
        let scaled = image.thumbnail(edge_px, edge_px).into_rgba8();
        let pixmap = pixmap_from_rgba(scaled.width(), scaled.height(), scaled.as_raw())
            .ok_or_else(|| anyhow!("empty stimulus image '{}'", asset.path.display()))?;
        decoded.push((asset.cache_id(), pixmap));
    }
    Ok(decoded)
}

/// Straight-alpha RGBA bytes into a premultiplied tiny-skia pixmap.
fn pixmap_from_rgba(width: u32, height: u32, rgba: &[u8]) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    let pixels = pixmap.pixels_mut();
    for (i, chunk) in rgba.chunks_exact(4).enumerate() {
        let (r, g, b, a) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        let mul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        if let Some(c) = PremultipliedColorU8::from_rgba(mul(r), mul(g), mul(b), a) {
            pixels[i] = c;
        }
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiplication_scales_channels_by_alpha() {
        let rgba = [255, 128, 0, 128, 10, 20, 30, 255];
        let pixmap = pixmap_from_rgba(2, 1, &rgba).unwrap();
        let pixels = pixmap.pixels();

        assert_eq!(pixels[0].alpha(), 128);
        assert_eq!(pixels[0].red(), 128);
        assert_eq!(pixels[1].red(), 10);
        assert_eq!(pixels[1].alpha(), 255);
    }
}
