use anyhow::Result;
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Instant;
use tiny_skia::Pixmap;
use tracing::{error, info, warn};
use visex_core::{Phase, ResponseKey, SessionPhase, TrialState};
use visex_experiment::{
    CsvLogger, ExperimentConfig, ExperimentEvent, ExperimentStateMachine,
};
use visex_render::{DebriefStats, Screen, SearchRenderer};
use visex_timing::{HighPrecisionTimer, Timer};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

type Machine = ExperimentStateMachine<SessionPhase, HighPrecisionTimer, StdRng>;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    canvas: Option<Pixmap>,
    renderer: Option<SearchRenderer>,
    experiment: Machine,
    logger: CsvLogger,
    config: ExperimentConfig,
    font: ab_glyph::FontArc,
    /// Decoded stimulus pixmaps waiting to enter the renderer cache.
    decoded_stimuli: Vec<(usize, Pixmap)>,
    windowed: bool,
    should_exit: bool,
}

impl App {
    pub fn new(
        experiment: Machine,
        logger: CsvLogger,
        config: ExperimentConfig,
        font: ab_glyph::FontArc,
        decoded_stimuli: Vec<(usize, Pixmap)>,
        windowed: bool,
    ) -> Self {
        Self {
            window: None,
            pixels: None,
            canvas: None,
            renderer: None,
            experiment,
            logger,
            config,
            font,
            decoded_stimuli,
            windowed,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(platform = std::env::consts::OS, "starting visual search session");
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut attributes = Window::default_attributes()
            .with_title("Visual Search")
            .with_resizable(false);

        if self.windowed {
            attributes = attributes.with_inner_size(LogicalSize::new(1280.0, 720.0));
        } else {
            let monitor = event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next());
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(monitor)));
        }

        let window = Arc::new(event_loop.create_window(attributes)?);
        let size = window.inner_size();
        info!(width = size.width, height = size.height, "display configured");

        let surface_texture = SurfaceTexture::new(size.width, size.height, window.clone());
        self.pixels = Some(Pixels::new(size.width, size.height, surface_texture)?);
        self.canvas = Pixmap::new(size.width, size.height);

        let mut renderer = SearchRenderer::new(
            size.width,
            size.height,
            self.font.clone(),
            self.config.px_per_unit,
        );
        for (cache_id, pixmap) in self.decoded_stimuli.drain(..) {
            renderer.register_stimulus(cache_id, pixmap);
        }
        self.renderer = Some(renderer);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer), Some(canvas)) =
            (&mut self.pixels, &mut self.renderer, &mut self.canvas)
        else {
            return Ok(());
        };

        let start = Instant::now();

        let progress = self.experiment.progress();
        let screen = screen_for(&self.experiment, &self.config);
        renderer.render_frame(canvas, &screen, progress)?;
        pixels.frame_mut().copy_from_slice(canvas.data());
        pixels.render()?;

        self.experiment.timer.record_frame(start.elapsed());
        Ok(())
    }

    fn update(&mut self) {
        let events = self.experiment.update();
        for event in events {
            self.experiment.handle_event(event);
        }
        self.persist_new_records();
    }

    fn persist_new_records(&mut self) {
        for record in self.experiment.drain_new_records() {
            if let Err(e) = self.logger.append(&record) {
                error!(error = %e, "failed to persist trial row");
            }
        }
    }

    fn handle_input(&mut self, key: winit::keyboard::PhysicalKey, event_loop: &ActiveEventLoop) {
        use winit::keyboard::{KeyCode, PhysicalKey};
        let PhysicalKey::Code(code) = key else {
            return;
        };

        match code {
            KeyCode::Escape => {
                self.cleanup_and_exit(event_loop);
                return;
            }
            KeyCode::Space => {
                if self.experiment.current_phase().is_welcome() {
                    self.experiment.handle_event(ExperimentEvent::SpacePressed);
                } else if self.experiment.is_finished() {
                    self.cleanup_and_exit(event_loop);
                }
                return;
            }
            _ => {}
        }

        if !self.experiment.current_phase().allows_response() {
            return;
        }
        let Some(pressed) = char_for(code) else {
            return;
        };
        if pressed == self.config.target_present_key.to_ascii_lowercase() {
            self.experiment
                .handle_event(ExperimentEvent::ResponseReceived(ResponseKey::TargetPresent));
        } else if pressed == self.config.target_absent_key.to_ascii_lowercase() {
            self.experiment
                .handle_event(ExperimentEvent::ResponseReceived(ResponseKey::TargetAbsent));
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                warn!(error = %e, "failed to resize surface");
                return;
            }
            // keep the canvas at the old size if the buffer stays there
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                warn!(error = %e, "failed to resize buffer");
                return;
            }
        }
        self.canvas = Pixmap::new(new_size.width, new_size.height);
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(new_size.width, new_size.height);
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.persist_new_records();

        let stats = self.experiment.timer.frame_stats();
        if stats.samples > 0 {
            info!(
                frames = stats.samples,
                avg_ms = stats.average_frame_time_ns / 1e6,
                jitter_ms = stats.jitter_ns / 1e6,
                fps = stats.effective_fps,
                "frame timing"
            );
        }
        let summary = self.experiment.summary();
        info!(
            trials = summary.trials,
            correct = summary.correct,
            timeouts = summary.timeouts,
            data_file = %self.logger.path().display(),
            "session ended"
        );

        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %e, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!(error = %e, "render error");
                }
                self.update();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(event.physical_key, event_loop);
            }
            WindowEvent::Resized(size) => self.handle_resize(size),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}

/// Map the experiment state onto the screen the renderer should draw.
fn screen_for<'a>(experiment: &'a Machine, config: &ExperimentConfig) -> Screen<'a> {
    let phase = experiment.current_phase();
    if phase.is_welcome() {
        return Screen::Welcome {
            present_key: config.target_present_key,
            absent_key: config.target_absent_key,
        };
    }
    if phase.is_debrief() {
        let summary = experiment.summary();
        return Screen::Debrief {
            stats: DebriefStats {
                trials: summary.trials,
                accuracy: summary.accuracy(),
                mean_rt_ms: summary.mean_rt_ms(),
            },
        };
    }

    match experiment.current_trial_state() {
        Some(TrialState::Fixation) => Screen::Fixation,
        Some(TrialState::Search) => match experiment.current_array() {
            Some(placements) => Screen::Array { placements },
            None => Screen::Blank,
        },
        Some(TrialState::Feedback) => Screen::Feedback {
            correct: experiment.feedback_correct().unwrap_or(false),
        },
        _ => Screen::Blank,
    }
}

fn char_for(code: winit::keyboard::KeyCode) -> Option<char> {
    use winit::keyboard::KeyCode::*;
    Some(match code {
        KeyA => 'a',
        KeyB => 'b',
        KeyC => 'c',
        KeyD => 'd',
        KeyE => 'e',
        KeyF => 'f',
        KeyG => 'g',
        KeyH => 'h',
        KeyI => 'i',
        KeyJ => 'j',
        KeyK => 'k',
        KeyL => 'l',
        KeyM => 'm',
        KeyN => 'n',
        KeyO => 'o',
        KeyP => 'p',
        KeyQ => 'q',
        KeyR => 'r',
        KeyS => 's',
        KeyT => 't',
        KeyU => 'u',
        KeyV => 'v',
        KeyW => 'w',
        KeyX => 'x',
        KeyY => 'y',
        KeyZ => 'z',
        _ => return None,
    })
}
