use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::gpu::{GpuBackend, GpuHandles};
use crate::observer::DeviceObserver;
use crate::window::WindowHost;

/// Creates the window and the GPU resources bound to it.
pub trait Platform {
    type Window: WindowHost;
    type Backend: GpuBackend;

    fn create_window(&mut self, config: &AppConfig) -> Result<Self::Window>;

    fn create_gpu(
        &mut self,
        window: &Self::Window,
        config: &AppConfig,
        observer: Arc<dyn DeviceObserver>,
    ) -> Result<GpuHandles<Self::Backend>>;
}

/// winit window + wgpu, blocking on adapter and device requests.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct NativePlatform;

#[cfg(not(target_arch = "wasm32"))]
impl Platform for NativePlatform {
    type Window = crate::window::NativeWindow;
    type Backend = crate::gpu::WgpuBackend;

    fn create_window(&mut self, config: &AppConfig) -> Result<Self::Window> {
        crate::window::NativeWindow::open(&config.window)
    }

    fn create_gpu(
        &mut self,
        window: &Self::Window,
        config: &AppConfig,
        observer: Arc<dyn DeviceObserver>,
    ) -> Result<GpuHandles<Self::Backend>> {
        let size = winit::dpi::PhysicalSize::new(config.window.width, config.window.height);
        crate::gpu::WgpuBackend::connect(window.handle(), size, &config.gpu, observer)
    }
}
