//! Logger setup.

use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "learn_webgpu=debug,wgpu_core=warn"). Ignored on the web, where everything
/// at `warn` and above goes to the browser console.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    /*
    *   wgpu panics with a generic message and logs the real error through the
    *   log crate, so the logger has to be up before anything touches the GPU.
    *   Without it a failed request just looks like a crash.
    *
    *   On the web the logs go to the browser console instead, and the panic
    *   hook makes panics show up there too.
    */
    INIT.call_once(|| {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                let _ = config;
                std::panic::set_hook(Box::new(console_error_panic_hook::hook));
                if console_log::init_with_level(log::Level::Warn).is_err() {
                    return;
                }
            } else {
                let filter = filter_spec(config.env_filter, std::env::var("RUST_LOG").ok());
                let installed = env_logger::Builder::new()
                    .parse_filters(&filter)
                    .write_style(config.write_style)
                    .try_init();
                // Someone else (a test harness, an embedding app) got there first.
                if installed.is_err() {
                    return;
                }
            }
        }

        log::debug!("Logger ready");
    });
}

/// Explicit filter first, then `RUST_LOG`, then plain `info`.
#[cfg(not(target_arch = "wasm32"))]
fn filter_spec(explicit: Option<String>, from_env: Option<String>) -> String {
    explicit
        .or(from_env)
        .unwrap_or_else(|| "info".to_string())
}
