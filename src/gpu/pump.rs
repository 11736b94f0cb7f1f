use std::future::Future;
use std::pin::Pin;

use crate::request::PendingWork;

/// Drives adapter/device requests on hosts without an implicit event loop.
///
/// Requests are handed over with [`BlockingPump::spawn`]. Each pump runs them
/// to completion with `pollster`, then lets the instance (when there still is
/// one) process whatever events they left behind.
#[derive(Default)]
pub struct BlockingPump<'a> {
    instance: Option<&'a wgpu::Instance>,
    pending: Vec<Pin<Box<dyn Future<Output = ()> + 'a>>>,
}

impl<'a> BlockingPump<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(instance: &'a wgpu::Instance) -> Self {
        Self {
            instance: Some(instance),
            pending: Vec::new(),
        }
    }

    pub fn spawn(&mut self, task: impl Future<Output = ()> + 'a) {
        self.pending.push(Box::pin(task));
    }
}

impl PendingWork for BlockingPump<'_> {
    fn pump(&mut self) {
        for task in self.pending.drain(..) {
            pollster::block_on(task);
        }
        if let Some(instance) = self.instance {
            instance.poll_all(false);
        }
    }
}
