//! Multi-producer, single-consumer intake between callers and the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::{self, error::TryRecvError};
use crate::communication::{Completion, PendingRequest};
use crate::key::BatchKey;

/// Result of a non-blocking read from the admission queue.
pub enum Admitted<P, O> {
    Request(BatchKey, PendingRequest<P, O>),
    Empty,
    /// Every sender is gone or the queue was closed, and nothing is left.
    Closed,
}

/// Producer side; cheap to clone and safe to use from any task.
pub struct AdmissionSender<P, O> {
    sender: mpsc::UnboundedSender<(BatchKey, PendingRequest<P, O>)>,
    depth: Arc<AtomicUsize>,
}

impl<P, O> Clone for AdmissionSender<P, O> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            depth: self.depth.clone(),
        }
    }
}

/// Consumer side, owned by the scheduler loop.
pub struct AdmissionReceiver<P, O> {
    receiver: mpsc::UnboundedReceiver<(BatchKey, PendingRequest<P, O>)>,
    depth: Arc<AtomicUsize>,
}

/// Creates an unbounded admission queue.
pub fn admission_queue<P, O>() -> (AdmissionSender<P, O>, AdmissionReceiver<P, O>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        AdmissionSender { sender, depth: depth.clone() },
        AdmissionReceiver { receiver, depth },
    )
}

impl<P, O> AdmissionSender<P, O> {
    /// Enqueues `payload` under `key` and returns the caller's completion.
    ///
    /// Never blocks. When the consumer is gone the request is dropped on the
    /// spot, which resolves the completion to `SchedulerStopped`.
    pub fn submit(&self, payload: P, key: BatchKey) -> Completion<O> {
        let (tx, completion) = Completion::channel();
        let request = PendingRequest::new(payload, tx);
        // count before sending so the consumer never decrements below zero
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.sender.send((key, request)).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        completion
    }

    /// Submissions admitted but not yet taken by the loop.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Whether the loop has stopped accepting submissions.
    ///
    /// Once this returns `true`, every later [`submit`](Self::submit)
    /// resolves to `SchedulerStopped`.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<P, O> AdmissionReceiver<P, O> {
    /// Takes the next submission without waiting.
    ///
    /// # Returns
    ///
    /// * [`Admitted::Request`] with the key and request, oldest first
    /// * [`Admitted::Empty`] when nothing is queued right now
    /// * [`Admitted::Closed`] when nothing is queued and nothing can arrive
    pub fn try_next(&mut self) -> Admitted<P, O> {
        match self.receiver.try_recv() {
            Ok((key, request)) => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                Admitted::Request(key, request)
            }
            Err(TryRecvError::Empty) => Admitted::Empty,
            Err(TryRecvError::Disconnected) => Admitted::Closed,
        }
    }

    /// Waits for the next submission; `None` once closed and empty.
    pub async fn recv(&mut self) -> Option<(BatchKey, PendingRequest<P, O>)> {
        let admitted = self.receiver.recv().await;
        if admitted.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        admitted
    }

    /// Refuses new submissions; already queued ones stay readable.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GriddleError;

    fn take(receiver: &mut AdmissionReceiver<i32, i32>) -> (BatchKey, PendingRequest<i32, i32>) {
        match receiver.try_next() {
            Admitted::Request(key, request) => (key, request),
            _ => panic!("expected a queued request"),
        }
    }

    #[tokio::test]
    async fn test_submit_then_take_in_order() {
        let (sender, mut receiver) = admission_queue::<i32, i32>();
        let _c1 = sender.submit(1, BatchKey::new("predict", false));
        let _c2 = sender.submit(2, BatchKey::new("rotate", true));
        assert_eq!(sender.depth(), 2);

        let (key, request) = take(&mut receiver);
        assert_eq!(key, BatchKey::new("predict", false));
        assert_eq!(*request.payload(), 1);

        let (key, request) = take(&mut receiver);
        assert_eq!(key, BatchKey::new("rotate", true));
        assert_eq!(*request.payload(), 2);

        assert!(matches!(receiver.try_next(), Admitted::Empty));
        assert_eq!(sender.depth(), 0);
    }

    #[tokio::test]
    async fn test_completion_linked_to_request() {
        let (sender, mut receiver) = admission_queue::<i32, i32>();
        let completion = sender.submit(5, BatchKey::new("predict", false));
        let (_, request) = take(&mut receiver);
        request.complete(Ok(50)).unwrap();
        assert_eq!(completion.await.unwrap(), Ok(50));
    }

    #[tokio::test]
    async fn test_concurrent_producers() {
        let (sender, mut receiver) = admission_queue::<i32, i32>();
        let producers = (0..8)
            .map(|i| {
                let sender = sender.clone();
                tokio::spawn(async move {
                    for j in 0..25 {
                        drop(sender.submit(i * 100 + j, BatchKey::new("predict", false)));
                    }
                })
            })
            .collect::<Vec<_>>();
        for producer in futures::future::join_all(producers).await {
            producer.unwrap();
        }

        let mut seen = 0;
        while let Admitted::Request(_, _) = receiver.try_next() {
            seen += 1;
        }
        assert_eq!(seen, 200);
    }

    #[tokio::test]
    async fn test_submit_after_close_resolves_stopped() {
        let (sender, mut receiver) = admission_queue::<i32, i32>();
        let queued = sender.submit(1, BatchKey::new("predict", false));
        receiver.close();

        let refused = sender.submit(2, BatchKey::new("predict", false));
        assert!(matches!(refused.await, Err(GriddleError::SchedulerStopped)));
        assert!(sender.is_closed());

        // what was admitted before closing can still be drained
        let (_, request) = take(&mut receiver);
        request.complete(Ok(10)).unwrap();
        assert_eq!(queued.await.unwrap(), Ok(10));
        assert!(matches!(receiver.try_next(), Admitted::Empty | Admitted::Closed));
    }

    #[tokio::test]
    async fn test_recv_waits_for_submission() {
        let (sender, mut receiver) = admission_queue::<i32, i32>();
        let waiter = tokio::spawn(async move {
            let (key, request) = receiver.recv().await.unwrap();
            (key, *request.payload())
        });
        tokio::task::yield_now().await;

        let _completion = sender.submit(9, BatchKey::new("predict", true));
        assert_eq!(waiter.await.unwrap(), (BatchKey::new("predict", true), 9));
        assert_eq!(sender.depth(), 0);
    }

    #[tokio::test]
    async fn test_recv_after_last_sender_dropped() {
        let (sender, mut receiver) = admission_queue::<i32, i32>();
        drop(sender);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (sender, receiver) = admission_queue::<i32, i32>();
        drop(receiver);
        let completion = sender.submit(1, BatchKey::new("predict", false));
        assert!(matches!(completion.await, Err(GriddleError::SchedulerStopped)));
        assert_eq!(sender.depth(), 0);
    }
}
