//! Viewer state
//!
//! One value owns everything the frame loop touches: the load phase, the
//! models, which one is on stage, the clock and audio, and the orbit rig.
//! Platform input and presentation live at the bottom of the file; the rest
//! runs without a window.

use macroquad::prelude as mq;

use crate::audio::{AudioTrack, SilentTrack};
use crate::camera_rig::OrbitRig;
use crate::config::ViewerConfig;
use crate::loader::LoadReport;
use crate::model::Model;
use crate::playback::Playback;
use crate::presentation::Presentation;
use crate::rasterizer::{Camera, Framebuffer, RenderStats};
use crate::scene::Scene;

/// Where the viewer is in its lifetime
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Loading,
    Ready,
    /// Loading failed; one line per failed source
    Failed(Vec<String>),
}

/// Primary-button pointer input, in window pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Pressed(f32),
    Moved(f32),
    Released,
}

pub struct Viewer {
    config: ViewerConfig,
    phase: Phase,
    models: Vec<Model>,
    presentation: Presentation,
    playback: Playback,
    rig: OrbitRig,
    camera: Camera,
    scene: Scene,
    fb: Framebuffer,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        let projection = &config.projection;
        let mut camera = Camera::new(projection.fov_y_degrees, projection.near, projection.far);
        let rig = OrbitRig::new(&config.orbit);
        rig.apply(&mut camera);

        let height = config.render_height;
        Self {
            phase: Phase::Loading,
            models: Vec::new(),
            presentation: Presentation::new(),
            playback: Playback::new(Box::new(SilentTrack::default()), config.loop_duration),
            rig,
            camera,
            scene: Scene::from_config(&config),
            fb: Framebuffer::new(height * 4 / 3, height),
            config,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[cfg(test)]
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn current(&self) -> Option<usize> {
        self.presentation.current()
    }

    pub fn started(&self) -> bool {
        self.playback.started()
    }

    #[cfg(test)]
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.fb
    }

    /// All fetches are in: take over the soundtrack, apply the load policy,
    /// warm the surviving models up and put the first one on preview.
    pub fn finish_loading(&mut self, report: LoadReport, audio: Box<dyn AudioTrack>) {
        self.playback = Playback::new(audio, self.config.loop_duration);
        log::info!("Fetched {} of {} model(s)", report.loaded_count(), report.results.len());
        match report.resolve(self.config.load_policy) {
            Ok(mut models) => {
                // Warm-up waits for the whole batch so a policy failure never
                // renders a model. Every other model is hidden at this point,
                // so drawing one model alone matches drawing the scene.
                for model in models.iter_mut() {
                    self.scene.warm_up(&mut self.fb, &self.camera, model);
                }
                self.presentation.prepare(&mut models);
                log::info!("{} model(s) ready", models.len());
                self.models = models;
                self.phase = Phase::Ready;
            }
            Err(errors) => {
                let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                for line in &lines {
                    log::error!("Load failed: {}", line);
                }
                self.phase = Phase::Failed(lines);
            }
        }
    }

    /// Feed one pointer event. Ignored unless the viewer is ready.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if self.phase != Phase::Ready {
            return;
        }
        match event {
            PointerEvent::Pressed(x) => self.rig.press(x),
            PointerEvent::Moved(x) => self.rig.pointer_moved(x),
            PointerEvent::Released => {
                if self.rig.release() {
                    self.click();
                }
            }
        }
    }

    /// A qualifying click: the first one starts the session, every one
    /// advances the carousel
    fn click(&mut self) {
        if !self.playback.started() {
            self.playback.start_session();
        }
        self.presentation.show_next(&mut self.models);
    }

    /// Advance time to host timestamp `now` and re-aim the camera
    pub fn update(&mut self, now: f64) {
        if self.phase != Phase::Ready {
            return;
        }
        self.playback.tick(now, &mut self.models);
        self.rig.apply(&mut self.camera);
    }

    /// Draw into the software framebuffer, sized to the window's aspect
    pub fn render(&mut self, window_width: f32, window_height: f32) -> RenderStats {
        let height = self.config.render_height;
        let aspect = if window_height > 0.0 { window_width / window_height } else { 1.0 };
        let width = ((height as f32 * aspect).round() as usize).max(1);
        if self.fb.resize(width, height) {
            log::debug!("Framebuffer resized to {}x{}", width, height);
        }
        self.scene.draw(&mut self.fb, &self.camera, &self.models)
    }
}

// =============================================================================
// macroquad glue
// =============================================================================

/// Translate this frame's mouse state into pointer events
pub fn poll_pointer(last_x: &mut f32) -> Vec<PointerEvent> {
    let mut events = Vec::new();
    let (x, _) = mq::mouse_position();
    if mq::is_mouse_button_pressed(mq::MouseButton::Left) {
        events.push(PointerEvent::Pressed(x));
    } else if x != *last_x {
        events.push(PointerEvent::Moved(x));
    }
    if mq::is_mouse_button_released(mq::MouseButton::Left) {
        events.push(PointerEvent::Released);
    }
    *last_x = x;
    events
}

/// Blit the framebuffer to fill the window, then any status text on top
pub fn present(viewer: &Viewer) {
    let (r, g, b) = viewer.config.clear_color;
    mq::clear_background(mq::Color::from_rgba(r, g, b, 255));

    let fb = &viewer.fb;
    let texture = mq::Texture2D::from_rgba8(fb.width as u16, fb.height as u16, &fb.pixels);
    texture.set_filter(mq::FilterMode::Nearest);
    mq::draw_texture_ex(
        &texture,
        0.0,
        0.0,
        mq::WHITE,
        mq::DrawTextureParams {
            dest_size: Some(mq::vec2(mq::screen_width(), mq::screen_height())),
            ..Default::default()
        },
    );

    match &viewer.phase {
        Phase::Loading => draw_centered("Loading...", mq::screen_height() * 0.5, mq::DARKGRAY),
        Phase::Ready if !viewer.started() => {
            draw_centered("Click to start", mq::screen_height() - 32.0, mq::GRAY)
        }
        Phase::Ready => {}
        Phase::Failed(lines) => {
            let mut y = mq::screen_height() * 0.5 - lines.len() as f32 * 12.0;
            draw_centered("Could not load models", y, mq::RED);
            for line in lines {
                y += 24.0;
                draw_centered(line, y, mq::DARKGRAY);
            }
        }
    }
}

fn draw_centered(text: &str, y: f32, color: mq::Color) {
    let size = 20.0;
    let dims = mq::measure_text(text, None, size as u16, 1.0);
    mq::draw_text(text, (mq::screen_width() - dims.width) * 0.5, y, size, color);
}
