use async_trait::async_trait;
use crate::communication::Completion;
use crate::config::SchedulerConfig;
use crate::core::admission::{admission_queue, AdmissionSender};
use crate::core::batch::scheduling_loop;
use crate::core::executor::BatchExecutor;
use crate::core::worker::WorkerHandle;
use crate::error::Result;
use crate::key::BatchKey;
use crate::routine::SharedRoutine;

/// # Batcher
///
/// The caller-facing side of a batching scheduler.
///
/// The HTTP layer calls [`submit`](Self::submit) once per inbound request
/// and awaits the returned [`Completion`], or uses [`predict`](Self::predict)
/// to get the output or error directly.
#[async_trait]
pub trait Batcher<P, O>: Sync
where P: Send + 'static, O: Send + 'static
{
    /// Queues `payload` for the batch identified by `key`.
    ///
    /// Returns immediately; the completion resolves once the payload's batch
    /// has run.
    fn submit(&self, payload: P, key: BatchKey) -> Completion<O>;

    /// Submits and waits, folding an item failure into
    /// [`GriddleError::Item`](crate::GriddleError::Item).
    async fn predict(&self, payload: P, key: BatchKey) -> Result<O> {
        let completion = self.submit(payload, key);
        Ok(completion.await??)
    }
}

/// # Scheduler
///
/// Coalesces concurrent submissions into per-key batches for one inference
/// routine.
///
/// A `Scheduler` owns its admission queue and the spawned loop; there is no
/// global state. Build one per routine with [`start`](Self::start), share it
/// (e.g. behind an `Arc`) with request handlers, and call
/// [`stop`](Self::stop) to wind it down.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// use griddle::{Batcher, BatchKey, Scheduler, SchedulerConfig, SyncRoutine};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> griddle::Result<()> {
/// let routine = SyncRoutine::new(|batch: &[u32], _| Ok(batch.iter().map(|v| v + 1).collect::<Vec<u32>>()));
/// let scheduler = Scheduler::start(Arc::new(routine), SchedulerConfig::default())?;
///
/// let output = scheduler.predict(41, BatchKey::new("predict", false)).await?;
/// assert_eq!(output, 42);
///
/// scheduler.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Scheduler<P, O> {
    admission: AdmissionSender<P, O>,
    worker: WorkerHandle,
    config: SchedulerConfig,
}

impl<P, O> Scheduler<P, O>
where P: Send + Sync + 'static, O: Send + 'static
{
    /// Spawns the scheduling loop on the current tokio runtime.
    pub fn start(routine: SharedRoutine<P, O>, config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let (admission, receiver) = admission_queue();

        let worker = WorkerHandle::spawn({
            let config = config.clone();
            move |running, notifier| {
                tokio::spawn(scheduling_loop(
                    BatchExecutor::new(routine),
                    receiver,
                    config,
                    running,
                    notifier,
                ))
            }
        });

        Ok(Self {
            admission,
            worker,
            config,
        })
    }
}

impl<P, O> Scheduler<P, O> {
    /// The validated configuration the loop was started with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Submissions admitted but not yet picked up by a drain cycle.
    pub fn pending(&self) -> usize {
        self.admission.depth()
    }

    /// Whether new submissions are still accepted.
    ///
    /// Turns `false` as soon as [`stop`](Self::stop) is called or the loop
    /// has closed its queue.
    pub fn is_running(&self) -> bool {
        self.worker.is_running() && !self.admission.is_closed()
    }

    /// Stops admitting, runs what was already admitted, and waits for the
    /// loop to finish.
    ///
    /// Takes `&self` so a scheduler shared behind an `Arc` can be stopped
    /// by any holder. Concurrent or repeated calls are harmless; only the
    /// first one joins the loop.
    pub async fn stop(&self) {
        self.worker.stop().await;
    }
}

#[async_trait]
impl<P, O> Batcher<P, O> for Scheduler<P, O>
where P: Send + 'static, O: Send + 'static
{
    fn submit(&self, payload: P, key: BatchKey) -> Completion<O> {
        if !self.worker.is_running() {
            let (_, completion) = Completion::channel();
            return completion;
        }
        self.admission.submit(payload, key)
    }
}
