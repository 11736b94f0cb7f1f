use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::platform::web::WindowExtWebSys;
use winit::window::{Window, WindowBuilder};

use super::WindowHost;
use crate::config::WindowConfig;

/// A canvas inside the page. The browser owns the event loop.
pub struct WebWindow {
    window: Arc<Window>,
}

impl WebWindow {
    pub fn open(event_loop: &EventLoop<()>, config: &WindowConfig) -> Result<Self> {
        let window = WindowBuilder::new()
            .with_title(&config.title)
            .build(event_loop)
            .context("could not open window")?;

        // Winit prevents sizing with css, so we have to set the size manually
        // when on the web
        let _ = window.request_inner_size(PhysicalSize::new(config.width, config.height));

        web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let dst = doc.get_element_by_id("wasm_example")?;
                let canvas = web_sys::Element::from(window.canvas()?);
                dst.append_child(&canvas).ok()?;
                Some(())
            })
            .context("couldn't append canvas to document body")?;

        Ok(Self {
            window: Arc::new(window),
        })
    }

    pub fn handle(&self) -> Arc<Window> {
        Arc::clone(&self.window)
    }
}

impl WindowHost for WebWindow {
    // Events reach us through the host's own loop.
    fn poll_events(&mut self) {}

    fn should_close(&self) -> bool {
        false
    }

    fn destroy(self) {
        drop(self.window);
        log::debug!("Destroyed window");
    }
}
