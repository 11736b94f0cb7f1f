//! Asynchronous device notifications.
//!
//! wgpu reports device loss and uncaptured errors through callbacks that may run
//! on internal threads. They are advisory: nothing here stops the frame loop.

use std::fmt;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LossReason {
    /// The device was destroyed on purpose.
    Destroyed,
    /// The last handle to the device was dropped, as happens on shutdown.
    Dropped,
    Unknown,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    OutOfMemory,
    Internal,
}

impl fmt::Display for LossReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossReason::Destroyed => write!(f, "destroyed"),
            LossReason::Dropped => write!(f, "dropped"),
            LossReason::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::OutOfMemory => write!(f, "out of memory"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Receives device notifications.
pub trait DeviceObserver: Send + Sync {
    fn device_lost(&self, reason: LossReason, message: &str);

    fn uncaptured_error(&self, kind: ErrorKind, message: &str);

    /// Called once the work submitted before registration has finished.
    fn submitted_work_done(&self) {}
}

/// Writes every notification to the log.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogObserver;

impl DeviceObserver for LogObserver {
    fn device_lost(&self, reason: LossReason, message: &str) {
        if reason == LossReason::Dropped {
            log::debug!("Device released ({message})");
            return;
        }
        if message.is_empty() {
            log::warn!("Device lost: reason {reason}");
        } else {
            log::warn!("Device lost: reason {reason} ({message})");
        }
    }

    fn uncaptured_error(&self, kind: ErrorKind, message: &str) {
        if message.is_empty() {
            log::error!("Uncaptured device error: type {kind}");
        } else {
            log::error!("Uncaptured device error: type {kind} ({message})");
        }
    }

    fn submitted_work_done(&self) {
        log::info!("Queued work finished");
    }
}
