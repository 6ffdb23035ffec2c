use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};
use crate::config::SchedulerConfig;
use super::admission::{Admitted, AdmissionReceiver};
use super::executor::BatchExecutor;
use super::group::RequestGroup;

/// How a drain of the admission queue ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drained {
    /// Queue observed empty.
    Empty,
    /// The configured batch size cap was reached.
    CapReached,
    /// No submission can ever arrive again.
    Closed,
}

/// The scheduler loop.
///
/// Each drain cycle:
/// 1. moves everything in the admission queue into `group`, per key, in order;
/// 2. once the queue is observed empty, pauses for the poll interval, unless
///    the batch size cap was reached, which skips the pause;
/// 3. executes every key's batch, one key after another;
/// 4. starts over with an empty group.
///
/// While nothing at all is pending the loop parks on the admission queue,
/// so the first arrival after an idle period opens a full poll interval.
///
/// On shutdown the queue is closed to new submissions and whatever was
/// already admitted still runs before the loop returns.
pub async fn scheduling_loop<P, O>(
    executor: BatchExecutor<P, O>,
    mut admission: AdmissionReceiver<P, O>,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    notifier: Arc<Notify>,
)
where P: Send + Sync, O: Send
{
    let poll_interval = config.poll_interval();
    let cap = config.max_batch_size;
    let mut group = RequestGroup::new();
    info!(poll_interval_ms = config.poll_interval_ms, max_batch_size = ?cap, "scheduler started");

    loop {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        if group.is_empty() {
            tokio::select! {
                admitted = admission.recv() => match admitted {
                    Some((key, request)) => group.insert(key, request),
                    None => break,
                },
                _ = notifier.notified() => continue,
            }
        }

        match drain_admissions(&mut admission, &mut group, cap) {
            Drained::Empty => pause(poll_interval, &notifier).await,
            Drained::CapReached | Drained::Closed => {}
        }

        execute_groups(&executor, &mut group).await;
    }

    admission.close();
    loop {
        let drained = drain_admissions(&mut admission, &mut group, cap);
        execute_groups(&executor, &mut group).await;
        if drained != Drained::CapReached {
            break;
        }
    }
    info!("scheduler stopped");
}

#[inline]
fn cap_reached<P, O>(group: &RequestGroup<P, O>, cap: Option<usize>) -> bool {
    cap.is_some_and(|cap| group.len() >= cap)
}

fn drain_admissions<P, O>(
    admission: &mut AdmissionReceiver<P, O>,
    group: &mut RequestGroup<P, O>,
    cap: Option<usize>,
) -> Drained {
    loop {
        if cap_reached(group, cap) {
            return Drained::CapReached;
        }
        match admission.try_next() {
            Admitted::Request(key, request) => group.insert(key, request),
            Admitted::Empty => return Drained::Empty,
            Admitted::Closed => return Drained::Closed,
        }
    }
}

/// The only scheduling delay; cut short when shutdown is requested.
#[inline]
async fn pause(poll_interval: Duration, notifier: &Notify) {
    tokio::select! {
        _ = tokio::time::sleep(poll_interval) => {},
        _ = notifier.notified() => {},
    }
}

async fn execute_groups<P, O>(executor: &BatchExecutor<P, O>, group: &mut RequestGroup<P, O>)
where P: Send + Sync, O: Send
{
    if group.is_empty() {
        return;
    }
    debug!(keys = group.key_count(), requests = group.len(), "drain cycle");
    let batches = group.drain();

    for (key, requests) in batches {
        executor.run(&key, requests).await;
    }
}
