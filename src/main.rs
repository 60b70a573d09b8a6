//! toon-carousel: a toon-shaded character carousel
//!
//! Loads a fixed set of glTF characters, shows one at a time and cycles on
//! click. Dragging orbits the camera. Every animation restarts in lockstep
//! with a looping soundtrack.

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod app;
mod audio;
mod camera_rig;
mod config;
mod loader;
mod logging;
mod model;
mod playback;
mod presentation;
mod rasterizer;
mod scene;

use futures_util::future::join;
use macroquad::prelude::*;

use app::Viewer;
use config::ViewerConfig;

fn window_conf() -> Conf {
    Conf {
        window_title: format!("toon-carousel v{}", VERSION),
        window_width: 1280,
        window_height: 720,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    // Initialize crash logging FIRST (before any other code)
    #[cfg(not(target_arch = "wasm32"))]
    crashlog::setup!(crashlog::cargo_metadata!().capitalized(), false);

    logging::init();
    log::info!("toon-carousel v{}", VERSION);

    let config = match ViewerConfig::embedded() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid embedded configuration: {}", e);
            return;
        }
    };

    let paths = config.models.clone();
    let soundtrack = config.soundtrack.clone();

    // Show something while the fetches are in flight
    let mut viewer = Viewer::new(config);
    app::present(&viewer);
    next_frame().await;

    let fetch = |path: String| async move { load_file(&path).await };
    let (report, track) = join(loader::load_all(&paths, fetch), audio::open_soundtrack(&soundtrack)).await;
    viewer.finish_loading(report, track);

    let mut last_x = mouse_position().0;
    loop {
        for event in app::poll_pointer(&mut last_x) {
            viewer.handle_pointer(event);
        }
        viewer.update(get_time());
        viewer.render(screen_width(), screen_height());
        app::present(&viewer);
        next_frame().await;
    }
}
