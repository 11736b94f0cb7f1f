//! Window hosts.
//!
//! A host owns the native window together with the windowing subsystem that
//! created it.

#[cfg(not(target_arch = "wasm32"))]
mod native;
#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeWindow;
#[cfg(target_arch = "wasm32")]
pub use web::WebWindow;

pub trait WindowHost {
    /// Processes pending window-system events without blocking.
    fn poll_events(&mut self);

    /// True once the user asked for the window to close.
    fn should_close(&self) -> bool;

    /// Destroys the window, then shuts the windowing subsystem down.
    fn destroy(self);
}
