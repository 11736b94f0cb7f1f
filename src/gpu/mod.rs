//! GPU device + surface management.
//!
//! This module is responsible for:
//! - the [`GpuBackend`] operations the frame loop sequences
//! - creating the wgpu Instance/Adapter/Device/Queue and configuring the Surface
//! - driving adapter/device requests to completion on native hosts

mod backend;
mod inspect;
#[cfg(not(target_arch = "wasm32"))]
mod pump;

use std::fmt;

pub use backend::WgpuBackend;
#[cfg(not(target_arch = "wasm32"))]
pub use pump::BlockingPump;

/// Why no surface texture was handed out this frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceStatus {
    Timeout,
    /// The surface changed and needs reconfiguring.
    Outdated,
    Lost,
    OutOfMemory,
    Other,
}

impl fmt::Display for SurfaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SurfaceStatus::Timeout => "timeout",
            SurfaceStatus::Outdated => "outdated",
            SurfaceStatus::Lost => "lost",
            SurfaceStatus::OutOfMemory => "out of memory",
            SurfaceStatus::Other => "other",
        };
        f.write_str(name)
    }
}

/// The GPU operations the frame loop is built from.
///
/// Handles are owned by the caller; releasing one means passing it back by
/// value. Transient per-frame objects are released by dropping them.
pub trait GpuBackend {
    type Device;
    type Queue;
    type Surface;
    type SurfaceTexture;
    type TextureView;
    type CommandEncoder;
    type CommandBuffer;

    /// Acquires the next presentable image.
    fn current_texture(surface: &Self::Surface) -> Result<Self::SurfaceTexture, SurfaceStatus>;

    /// 2D view over the full mip and array range of the texture.
    fn create_view(texture: &Self::SurfaceTexture) -> Self::TextureView;

    fn create_encoder(device: &Self::Device, label: &str) -> Self::CommandEncoder;

    /// Records one render pass: a single color attachment targeting `view`,
    /// cleared to `color` and stored, no depth-stencil and no draws.
    fn record_clear_pass(
        encoder: &mut Self::CommandEncoder,
        view: &Self::TextureView,
        color: wgpu::Color,
    );

    fn finish(encoder: Self::CommandEncoder) -> Self::CommandBuffer;

    fn submit(queue: &Self::Queue, commands: Self::CommandBuffer);

    fn present(texture: Self::SurfaceTexture);

    /// Lets the device make progress on callbacks and cleanup without blocking.
    fn poll(device: &Self::Device);

    fn release_queue(queue: Self::Queue);

    /// Unconfigures and releases the surface.
    fn release_surface(surface: Self::Surface);

    fn release_device(device: Self::Device);
}

/// Persistent GPU handles.
///
/// Fields are declared in release order, so dropping the struct outright
/// still releases the queue first and the device last.
pub struct GpuHandles<B: GpuBackend> {
    pub queue: B::Queue,
    pub surface: B::Surface,
    pub device: B::Device,
    /// The surface reaches the screen without `present()` as long as the host
    /// yields back to its own loop. Only browser WebGPU works this way; WebGL
    /// needs `present()` to blit into the canvas.
    pub implicit_present: bool,
}

impl<B: GpuBackend> GpuHandles<B> {
    /// Releases everything in reverse acquisition order.
    pub fn release(self) {
        let GpuHandles {
            queue,
            surface,
            device,
            ..
        } = self;

        B::release_queue(queue);
        B::release_surface(surface);
        B::release_device(device);
    }
}
