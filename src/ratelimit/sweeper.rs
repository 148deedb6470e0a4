//! Background sweeper that evicts stale request logs.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::registry::LimiterRegistry;

/// Periodic cleanup pass bounding memory under unbounded key cardinality.
///
/// The sweeper owns an explicit lifecycle: nothing runs until `start`,
/// and the task stops on `stop` or when the sweeper is dropped. The
/// cadence is fixed wall-clock time, independent of request volume.
pub struct CleanupSweeper {
    registry: Arc<LimiterRegistry>,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupSweeper {
    /// Create a sweeper over the given registry. Does not start it.
    pub fn new(registry: Arc<LimiterRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the periodic sweep task.
    ///
    /// Calling `start` again replaces any previous task.
    pub fn start(&self) {
        let registry = Arc::clone(&self.registry);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval fires immediately;
            // skip it so a fresh start does not sweep before traffic.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.sweep();
                debug!("Swept rate limit stores");
            }
        });

        info!(interval_secs = self.interval.as_secs(), "Cleanup sweeper started");
        if let Some(previous) = self.handle.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stop the sweep task if one is running.
    pub fn stop(&self) {
        if let Some(task) = self.handle.lock().take() {
            task.abort();
            info!("Cleanup sweeper stopped");
        }
    }

    /// Whether the background task is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Run a single sweep pass immediately, on the caller's task.
    pub fn sweep_now(&self) {
        self.registry.sweep();
    }
}

impl Drop for CleanupSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
