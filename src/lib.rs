//! Brings up a WebGPU rendering context and clears the window every frame.
//!
//! Setup creates the instance and the window's surface, then requests an
//! adapter compatible with that surface and a device (which brings its queue),
//! and finally configures the surface. The frame loop
//! acquires a surface texture, records a single clear pass, submits and
//! presents it. Teardown runs in reverse acquisition order.

pub mod app;
pub mod config;
pub mod gpu;
pub mod logging;
pub mod observer;
pub mod platform;
pub mod request;
pub mod window;

pub use app::{Application, FrameOutcome, FrameStats, LoopState};
pub use config::{AppConfig, GpuConfig, HostMode, WindowConfig};
pub use logging::{init_logging, LoggingConfig};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Runs until the window is closed.
///
/// Returns a failure exit code when the window or the GPU cannot be set up.
#[cfg(not(target_arch = "wasm32"))]
pub fn run() -> std::process::ExitCode {
    use std::process::ExitCode;

    /*
    *   Enable logging before anything touches the GPU. When wgpu hits an error it
    *   panics with a generic message while logging the real error via the log
    *   crate.
    */
    init_logging(LoggingConfig::default());

    let mut platform = platform::NativePlatform;
    let mut app = Application::new(AppConfig::from_env());

    if let Err(err) = app.initialize(&mut platform) {
        log::error!("Initialization failed: {err:#}");
        return ExitCode::FAILURE;
    }

    while app.is_running() {
        app.main_loop();
    }

    app.terminate();
    ExitCode::SUCCESS
}

/// Browser entry point. The page's event loop re-enters the frame loop once
/// per redraw.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn run_web() {
    init_logging(LoggingConfig::default());

    if let Err(err) = start_web().await {
        log::error!("Initialization failed: {err:#}");
    }
}

#[cfg(target_arch = "wasm32")]
async fn start_web() -> anyhow::Result<()> {
    use anyhow::Context;
    use winit::event::{Event, WindowEvent};
    use winit::event_loop::EventLoop;
    use winit::platform::web::EventLoopExtWebSys;

    let config = AppConfig::default();
    let size = winit::dpi::PhysicalSize::new(config.window.width, config.window.height);

    let event_loop = EventLoop::new().context("could not initialize the windowing system")?;
    let window = window::WebWindow::open(&event_loop, &config.window)?;
    let handle = window.handle();

    let mut app = Application::new(config);
    let gpu = gpu::WgpuBackend::connect_cooperative(
        window.handle(),
        size,
        &app.config().gpu,
        app.observer(),
    )
    .await?;
    app.attach(window, gpu)?;

    event_loop.spawn(move |event, _| match event {
        Event::AboutToWait => handle.request_redraw(),
        Event::WindowEvent {
            event: WindowEvent::RedrawRequested,
            ..
        } => {
            app.main_loop();
        }
        _ => {}
    });

    Ok(())
}
