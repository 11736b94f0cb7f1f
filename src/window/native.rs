use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowBuilder};

use super::WindowHost;
use crate::config::WindowConfig;

/// A desktop window whose events are pumped by the frame loop itself.
pub struct NativeWindow {
    window: Arc<Window>,
    event_loop: EventLoop<()>,
    close_requested: bool,
}

impl NativeWindow {
    /// Starts the windowing system and opens a window with the configured size.
    pub fn open(config: &WindowConfig) -> Result<Self> {
        let event_loop = EventLoop::new().context("could not initialize the windowing system")?;

        let window = WindowBuilder::new()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(config.resizable)
            .build(&event_loop)
            .context("could not open window")?;

        log::info!(
            "Opened window \"{}\" ({}x{})",
            config.title,
            config.width,
            config.height
        );

        Ok(Self {
            window: Arc::new(window),
            event_loop,
            close_requested: false,
        })
    }

    /// Shared handle for binding a surface to the window.
    pub fn handle(&self) -> Arc<Window> {
        Arc::clone(&self.window)
    }
}

impl WindowHost for NativeWindow {
    fn poll_events(&mut self) {
        let window_id = self.window.id();
        let close_requested = &mut self.close_requested;

        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _| match event {
                Event::WindowEvent {
                    window_id: id,
                    event:
                        WindowEvent::CloseRequested
                        | WindowEvent::KeyboardInput {
                            event:
                                KeyEvent {
                                    logical_key: Key::Named(NamedKey::Escape),
                                    state: ElementState::Pressed,
                                    ..
                                },
                            ..
                        },
                } if id == window_id => *close_requested = true,
                _ => {}
            });

        if let PumpStatus::Exit(code) = status {
            log::info!("Event loop exited with code {code}");
            self.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn destroy(self) {
        let Self {
            window, event_loop, ..
        } = self;

        drop(window);
        log::debug!("Destroyed window");

        drop(event_loop);
        log::debug!("Shut down windowing system");
    }
}
