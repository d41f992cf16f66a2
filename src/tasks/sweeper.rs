//! Expiry Sweep Task
//!
//! Background task that periodically deletes keys whose expiry deadline has
//! passed, going through the cache's own delete path.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::Memcache;

// == Expiry Task ==
/// Handle to a running expiry sweep.
///
/// Dropping the handle signals the task to stop.
#[derive(Debug)]
pub struct ExpiryTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExpiryTask {
    /// Signals the task to stop after its current tick.
    pub fn cancel(&self) {
        let _ = self.stop.send(true);
    }

    /// Signals the task to stop and waits for it to finish.
    pub async fn stop(mut self) {
        self.cancel();
        let _ = (&mut self.handle).await;
    }

    /// Aborts the task immediately.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ExpiryTask {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

/// Spawns a task that calls [`Memcache::sweep_expired`] every `interval`.
///
/// The task only holds a weak reference and exits on its own once the cache
/// is dropped. Must be called from within a Tokio runtime.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Memcache::<String>::new(1000, true));
/// let task = spawn_expiry_task(Arc::downgrade(&cache), Duration::from_millis(100));
/// // Later, during shutdown:
/// task.stop().await;
/// ```
pub fn spawn_expiry_task<V: Send + 'static>(
    cache: Weak<Memcache<V>>,
    interval: Duration,
) -> ExpiryTask {
    let interval = interval.max(Duration::from_millis(1));
    let (stop, mut stopped) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "expiry sweep started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let Some(cache) = cache.upgrade() else {
                debug!("cache dropped, expiry sweep exiting");
                break;
            };
            let removed = cache.sweep_expired();
            drop(cache);

            if removed > 0 {
                info!(removed, "expiry sweep removed expired entries");
            } else {
                debug!("expiry sweep found nothing due");
            }
        }

        info!("expiry sweep stopped");
    });

    ExpiryTask { stop, handle }
}
