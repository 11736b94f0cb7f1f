use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::{inspect, GpuBackend, GpuHandles, SurfaceStatus};
use crate::config::GpuConfig;
use crate::observer::{DeviceObserver, ErrorKind, LossReason};
use crate::request;

/// [`GpuBackend`] over wgpu.
#[derive(Debug, Copy, Clone)]
pub struct WgpuBackend;

impl WgpuBackend {
    /// Acquires instance, adapter, device and queue and configures the surface,
    /// blocking on the adapter and device requests.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn connect(
        window: Arc<Window>,
        size: PhysicalSize<u32>,
        config: &GpuConfig,
        observer: Arc<dyn DeviceObserver>,
    ) -> Result<GpuHandles<Self>> {
        use super::BlockingPump;

        let (instance, surface) = create_instance_and_surface(window, size, config)?;

        let options = adapter_options(config, &surface);
        let adapter = {
            let mut pump = BlockingPump::with_instance(&instance);
            request::request_sync(&mut pump, "adapter", |pump, done| {
                let pending = instance.request_adapter(&options);
                pump.spawn(async move {
                    done.resolve(pending.await.ok_or_else(no_adapter_message));
                });
            })
        }
        .context("could not get WebGPU adapter")?;

        inspect::log_adapter(&adapter);

        // The adapter stays valid on its own.
        drop(instance);
        log::debug!("Released instance");

        let descriptor = device_descriptor(config);
        let (device, queue) = {
            let mut pump = BlockingPump::new();
            request::request_sync(&mut pump, "device", |pump, done| {
                let pending = adapter.request_device(&descriptor, None);
                pump.spawn(async move {
                    done.resolve(pending.await.map_err(|err| err.to_string()));
                });
            })
        }
        .context("could not get WebGPU device")?;

        finish_setup(adapter, device, queue, surface, size, config, observer)
    }

    /// Same as `connect`, yielding to the browser while the requests are pending.
    #[cfg(target_arch = "wasm32")]
    pub async fn connect_cooperative(
        window: Arc<Window>,
        size: PhysicalSize<u32>,
        config: &GpuConfig,
        observer: Arc<dyn DeviceObserver>,
    ) -> Result<GpuHandles<Self>> {
        let (instance, surface) = create_instance_and_surface(window, size, config)?;

        let options = adapter_options(config, &surface);
        let pending = instance.request_adapter(&options);
        let adapter = request::request_cooperative("adapter", |done| {
            wasm_bindgen_futures::spawn_local(async move {
                done.resolve(pending.await.ok_or_else(no_adapter_message));
            });
        })
        .await
        .context("could not get WebGPU adapter")?;

        inspect::log_adapter(&adapter);
        drop(instance);
        log::debug!("Released instance");

        let pending = adapter.request_device(&device_descriptor(config), None);
        let (device, queue) = request::request_cooperative("device", |done| {
            wasm_bindgen_futures::spawn_local(async move {
                done.resolve(pending.await.map_err(|err| err.to_string()));
            });
        })
        .await
        .context("could not get WebGPU device")?;

        finish_setup(adapter, device, queue, surface, size, config, observer)
    }
}

fn no_adapter_message() -> String {
    "no adapter matches the requested options".to_string()
}

fn create_instance_and_surface(
    window: Arc<Window>,
    size: PhysicalSize<u32>,
    config: &GpuConfig,
) -> Result<(wgpu::Instance, wgpu::Surface<'static>)> {
    anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

    // The instance is a handle to our GPU.
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: config.backends,
        ..Default::default()
    });
    log::info!("Created WebGPU instance");

    // The surface is the part of the window we draw to. It keeps the window alive.
    let surface = instance
        .create_surface(window)
        .context("could not initialize WebGPU: surface creation failed")?;

    Ok((instance, surface))
}

fn adapter_options<'a>(
    config: &GpuConfig,
    surface: &'a wgpu::Surface<'static>,
) -> wgpu::RequestAdapterOptions<'a, 'static> {
    wgpu::RequestAdapterOptions {
        power_preference: config.power_preference,
        // Only accept adapters that can present to our surface.
        compatible_surface: Some(surface),
        force_fallback_adapter: config.force_fallback_adapter,
    }
}

fn device_descriptor(config: &GpuConfig) -> wgpu::DeviceDescriptor<'_> {
    wgpu::DeviceDescriptor {
        label: Some(config.device_label.as_str()),
        required_features: wgpu::Features::empty(),
        // WebGL doesn't support all of wgpu's features.
        required_limits: if cfg!(target_arch = "wasm32") {
            wgpu::Limits::downlevel_webgl2_defaults()
        } else {
            wgpu::Limits::default()
        },
        memory_hints: wgpu::MemoryHints::default(),
    }
}

fn finish_setup(
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    size: PhysicalSize<u32>,
    config: &GpuConfig,
    observer: Arc<dyn DeviceObserver>,
) -> Result<GpuHandles<WgpuBackend>> {
    install_observer(&device, &queue, observer);
    inspect::log_device(&device);

    // The first reported format is the surface's preferred one.
    let capabilities = surface.get_capabilities(&adapter);
    let format = capabilities
        .formats
        .first()
        .copied()
        .context("surface reports no supported formats")?;

    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width,
        height: size.height,
        present_mode: config.present_mode,
        alpha_mode: config.alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);
    log::info!(
        "Configured surface: {}x{} {format:?} {:?}",
        size.width,
        size.height,
        config.present_mode
    );

    // Browser WebGPU shows the frame once control returns to the page. Every
    // other backend, WebGL included, needs an explicit present.
    let implicit_present = adapter.get_info().backend == wgpu::Backend::BrowserWebGpu;
    log::debug!("Implicit presentation: {implicit_present}");

    drop(adapter);
    log::debug!("Released adapter");

    Ok(GpuHandles {
        queue,
        surface,
        device,
        implicit_present,
    })
}

fn install_observer(device: &wgpu::Device, queue: &wgpu::Queue, observer: Arc<dyn DeviceObserver>) {
    let lost = Arc::clone(&observer);
    device.set_device_lost_callback(move |reason, message| {
        lost.device_lost(loss_reason(reason), &message);
    });

    let errors = Arc::clone(&observer);
    device.on_uncaptured_error(Box::new(move |error: wgpu::Error| {
        let kind = match &error {
            wgpu::Error::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            wgpu::Error::Validation { .. } => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        };
        errors.uncaptured_error(kind, &error.to_string());
    }));

    queue.on_submitted_work_done(move || observer.submitted_work_done());
}

fn loss_reason(reason: wgpu::DeviceLostReason) -> LossReason {
    match reason {
        wgpu::DeviceLostReason::Destroyed => LossReason::Destroyed,
        // Fired by our own teardown when the last device handle goes away.
        wgpu::DeviceLostReason::Dropped => LossReason::Dropped,
        _ => LossReason::Unknown,
    }
}

impl GpuBackend for WgpuBackend {
    type Device = wgpu::Device;
    type Queue = wgpu::Queue;
    type Surface = wgpu::Surface<'static>;
    type SurfaceTexture = wgpu::SurfaceTexture;
    type TextureView = wgpu::TextureView;
    type CommandEncoder = wgpu::CommandEncoder;
    type CommandBuffer = wgpu::CommandBuffer;

    fn current_texture(surface: &Self::Surface) -> Result<Self::SurfaceTexture, SurfaceStatus> {
        surface.get_current_texture().map_err(|err| match err {
            wgpu::SurfaceError::Timeout => SurfaceStatus::Timeout,
            wgpu::SurfaceError::Outdated => SurfaceStatus::Outdated,
            wgpu::SurfaceError::Lost => SurfaceStatus::Lost,
            wgpu::SurfaceError::OutOfMemory => SurfaceStatus::OutOfMemory,
            #[allow(unreachable_patterns)]
            _ => SurfaceStatus::Other,
        })
    }

    fn create_view(texture: &Self::SurfaceTexture) -> Self::TextureView {
        texture.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Surface texture view"),
            format: Some(texture.texture.format()),
            dimension: Some(wgpu::TextureViewDimension::D2),
            aspect: wgpu::TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: None,
        })
    }

    fn create_encoder(device: &Self::Device, label: &str) -> Self::CommandEncoder {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn record_clear_pass(
        encoder: &mut Self::CommandEncoder,
        view: &Self::TextureView,
        color: wgpu::Color,
    ) {
        // Beginning and dropping the pass right away records the clear and nothing else.
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        drop(pass);
    }

    fn finish(encoder: Self::CommandEncoder) -> Self::CommandBuffer {
        encoder.finish()
    }

    fn submit(queue: &Self::Queue, commands: Self::CommandBuffer) {
        queue.submit(std::iter::once(commands));
    }

    fn present(texture: Self::SurfaceTexture) {
        texture.present();
    }

    fn poll(device: &Self::Device) {
        device.poll(wgpu::Maintain::Poll);
    }

    fn release_queue(queue: Self::Queue) {
        drop(queue);
        log::debug!("Released queue");
    }

    fn release_surface(surface: Self::Surface) {
        // wgpu unconfigures the surface when it is dropped.
        drop(surface);
        log::debug!("Unconfigured and released surface");
    }

    fn release_device(device: Self::Device) {
        drop(device);
        log::debug!("Released device");
    }
}
