//! Lifecycle handle for the background scheduling task.

use std::sync::{Arc, Mutex, MutexGuard, atomic::{AtomicBool, Ordering}};
use tokio::{task::JoinHandle, sync::Notify};
use tracing::warn;

/// A handle owning the spawned scheduler loop.
///
/// The loop is handed a running flag and a notifier when it is spawned. It
/// keeps cycling while the flag is set, and uses the notifier to cut its
/// poll pause short when asked to stop.
///
/// # Example
///
/// ```ignore
/// let worker = WorkerHandle::spawn(|running, notifier| {
///     tokio::spawn(async move {
///         while running.load(Ordering::SeqCst) {
///             tokio::select! {
///                 _ = notifier.notified() => {},
///                 _ = tokio::time::sleep(Duration::from_millis(50)) => {},
///             }
///         }
///     })
/// });
///
/// worker.stop().await;
/// ```
pub struct WorkerHandle {
    /// Cleared once shutdown has been requested
    running: Arc<AtomicBool>,

    /// Join handle of the loop, `None` once shutdown has taken it
    handle: Mutex<Option<JoinHandle<()>>>,

    /// Wakes the loop out of its poll pause
    notifier: Arc<Notify>,
}

impl WorkerHandle {
    /// Spawns the loop through `task` and keeps its join handle.
    ///
    /// # Parameters
    ///
    /// * `task` - Receives the running flag and notifier, and returns the
    ///   join handle of the task it spawned
    pub fn spawn<F>(task: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>, Arc<Notify>) -> JoinHandle<()>,
    {
        let running = Arc::new(AtomicBool::new(true));
        let notifier = Arc::new(Notify::new());
        let handle = task(running.clone(), notifier.clone());

        Self {
            running,
            handle: Mutex::new(Some(handle)),
            notifier,
        }
    }

    /// Whether shutdown has not been requested yet.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the spawned loop has returned.
    #[allow(dead_code)]
    pub fn is_finished(&self) -> bool {
        self.lock().as_ref().is_none_or(|handle| handle.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn signal_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // notify_one stores a permit, so a loop not yet parked still sees it
        self.notifier.notify_one();
    }

    /// Requests shutdown and waits for the loop to return.
    ///
    /// Only the first caller joins the loop; later calls return right away.
    pub async fn stop(&self) {
        self.signal_stop();
        let handle = self.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "scheduler loop ended abnormally");
            }
        }
    }

    /// Requests shutdown without waiting.
    ///
    /// The loop is reaped by a detached task when a runtime is available.
    pub fn shutdown(&self) {
        self.signal_stop();

        let handle = self.lock().take();
        if let Some(handle) = handle {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    let _ = handle.await;
                });
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time;

    fn parked_worker(stopped: Arc<AtomicBool>) -> WorkerHandle {
        WorkerHandle::spawn(move |running, notifier| {
            tokio::spawn(async move {
                while running.load(Ordering::SeqCst) {
                    tokio::select! {
                        _ = notifier.notified() => {},
                        _ = time::sleep(Duration::from_secs(3600)) => {},
                    }
                }
                stopped.store(true, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn test_worker_starts_running() {
        let worker = parked_worker(Arc::new(AtomicBool::new(false)));
        assert!(worker.is_running());
        assert!(!worker.is_finished());
    }

    #[tokio::test]
    async fn test_stop_wakes_parked_loop_and_joins() {
        let stopped = Arc::new(AtomicBool::new(false));
        let worker = parked_worker(stopped.clone());

        // give the loop a chance to park in its long sleep
        time::sleep(Duration::from_millis(10)).await;
        worker.stop().await;

        assert!(!worker.is_running());
        assert!(worker.is_finished());
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stop_before_loop_parks() {
        let stopped = Arc::new(AtomicBool::new(false));
        let worker = parked_worker(stopped.clone());
        worker.stop().await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_drop_triggers_shutdown() {
        let stopped = Arc::new(AtomicBool::new(false));
        {
            let _worker = parked_worker(stopped.clone());
            time::sleep(Duration::from_millis(10)).await;
        }
        time::sleep(Duration::from_millis(50)).await;
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_multiple_shutdowns() {
        let worker = parked_worker(Arc::new(AtomicBool::new(false)));
        worker.shutdown();
        worker.shutdown();
        worker.stop().await;
        assert!(!worker.is_running());
        assert!(worker.lock().is_none());
    }

    #[tokio::test]
    async fn test_stop_notifies_loop() {
        let woken = Arc::new(AtomicBool::new(false));
        let woken_clone = woken.clone();
        let worker = WorkerHandle::spawn(move |_running, notifier| {
            tokio::spawn(async move {
                notifier.notified().await;
                woken_clone.store(true, Ordering::SeqCst);
            })
        });

        worker.stop().await;
        assert!(woken.load(Ordering::SeqCst));
    }
}
