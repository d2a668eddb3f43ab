//! Cooperative stop signal.
//!
//! A [`ShutdownCoordinator`] is shared by the Ctrl+C handler, the result
//! collector and the worker pool. Once a stop is requested the dispatcher
//! starts no new batches and retry backoffs end early; requests already on
//! the wire are allowed to finish. The first reason given is kept for the
//! final report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

/// Shared handle to a shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Coordinates a one-way stop across async tasks.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    is_shutdown: AtomicBool,
    reason: Mutex<Option<String>>,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Only the first call records its reason and wakes waiters.
    pub fn request_shutdown(&self, reason: impl Into<String>) {
        // The flag is set under the reason lock, so a reader that sees it set
        // also sees the reason
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_shutdown.load(Ordering::SeqCst) {
            return;
        }
        *slot = Some(reason.into());
        self.is_shutdown.store(true, Ordering::SeqCst);
        drop(slot);
        self.notify.notify_waiters();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Reason passed to the first [`Self::request_shutdown`] call.
    pub fn reason(&self) -> Option<String> {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request is not missed
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }
}
