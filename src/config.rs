//! Application configuration.
//!
//! Defaults reproduce the tutorial setup: a fixed 640x480 window, FIFO
//! presentation and a red clear color.

/// Who drives the frame loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HostMode {
    /// We own the loop, present frames and poll the device ourselves.
    Native,
    /// The host (the browser) re-enters the loop once per tick and polls the
    /// device. It also presents, but only for surfaces that present implicitly.
    Cooperative,
}

impl HostMode {
    /// The mode matching the compilation target.
    pub fn current() -> Self {
        if cfg!(target_arch = "wasm32") {
            HostMode::Cooperative
        } else {
            HostMode::Native
        }
    }

    /// Whether the frame loop calls `present()` itself.
    ///
    /// A cooperative host only takes over presentation for surfaces that
    /// present implicitly.
    pub fn presents(self, implicit_present: bool) -> bool {
        match self {
            HostMode::Native => true,
            HostMode::Cooperative => !implicit_present,
        }
    }

    pub fn polls_device(self) -> bool {
        self == HostMode::Native
    }
}

impl Default for HostMode {
    fn default() -> Self {
        Self::current()
    }
}

#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    /// Width in physical pixels. The surface is configured with the same value.
    pub width: u32,
    /// Height in physical pixels.
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Learn WebGPU".to_string(),
            width: 640,
            height: 480,
            resizable: false,
        }
    }
}

/// Parameters for instance, adapter, device and surface setup.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    /// Backends the instance may use.
    ///
    /// `Backends::all()` lets wgpu pick Vulkan, Metal, DX12 or browser WebGPU.
    pub backends: wgpu::Backends,

    pub power_preference: wgpu::PowerPreference,

    /// Forces a software adapter.
    pub force_fallback_adapter: bool,

    /// FIFO caps presentation at the display rate and is supported everywhere.
    pub present_mode: wgpu::PresentMode,

    pub alpha_mode: wgpu::CompositeAlphaMode,

    /// Color every frame is cleared to.
    pub clear_color: wgpu::Color,

    pub device_label: String,
    pub encoder_label: String,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            clear_color: wgpu::Color {
                r: 0.9,
                g: 0.1,
                b: 0.2,
                a: 1.0,
            },
            device_label: "Learn WebGPU device".to_string(),
            encoder_label: "Frame encoder".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub gpu: GpuConfig,
    pub host: HostMode,
}

impl AppConfig {
    /// Defaults, overridden by `WGPU_BACKEND` and `WGPU_POWER_PREF` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(backends) = wgpu::util::backend_bits_from_env() {
            log::info!("Using backends from WGPU_BACKEND: {backends:?}");
            config.gpu.backends = backends;
        }
        if let Some(power_preference) = wgpu::util::power_preference_from_env() {
            log::info!("Using power preference from WGPU_POWER_PREF: {power_preference:?}");
            config.gpu.power_preference = power_preference;
        }
        config
    }
}
