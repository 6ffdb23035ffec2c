use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use crate::error::{BatchResult, GriddleError};

/// # Completion
///
/// The caller's half of a single-use result handoff.
///
/// Awaiting a `Completion` suspends only the awaiting task. It resolves
/// exactly once, to:
///
/// * `Ok(Ok(output))` when the routine produced a value for the payload,
/// * `Ok(Err(item_error))` when the payload failed even on its own,
/// * `Err(GriddleError::SchedulerStopped)` when the scheduler went away
///   before producing anything.
pub struct Completion<O> {
    receiver: oneshot::Receiver<BatchResult<O>>,
}

impl<O> Completion<O> {
    pub fn new(receiver: oneshot::Receiver<BatchResult<O>>) -> Self {
        Self {
            receiver,
        }
    }

    /// Creates a linked sender/completion pair.
    pub fn channel() -> (oneshot::Sender<BatchResult<O>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self::new(rx))
    }

    /// Non-blocking check for a delivered result.
    ///
    /// `None` means the result is not there yet; the completion can still
    /// be awaited afterwards.
    pub fn try_take(&mut self) -> Option<Result<BatchResult<O>, GriddleError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(Ok(result)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(GriddleError::SchedulerStopped)),
        }
    }
}

impl<O> Future for Completion<O> {
    type Output = Result<BatchResult<O>, GriddleError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| received.map_err(|_| GriddleError::SchedulerStopped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ItemError;

    #[tokio::test]
    async fn test_resolves_to_delivered_value() {
        let (tx, completion) = Completion::channel();
        tx.send(Ok(7u32)).unwrap();
        assert_eq!(completion.await.unwrap(), Ok(7));
    }

    #[tokio::test]
    async fn test_resolves_to_item_error() {
        let (tx, completion) = Completion::<u32>::channel();
        tx.send(Err(ItemError::new("KeyError", "missing field"))).unwrap();
        let result = completion.await.unwrap();
        assert_eq!(result.unwrap_err().kind, "KeyError");
    }

    #[tokio::test]
    async fn test_dropped_sender_means_stopped() {
        let (tx, completion) = Completion::<u32>::channel();
        drop(tx);
        assert!(matches!(completion.await, Err(GriddleError::SchedulerStopped)));
    }

    #[tokio::test]
    async fn test_try_take() {
        let (tx, mut completion) = Completion::channel();
        assert!(completion.try_take().is_none());

        tx.send(Ok("done")).unwrap();
        match completion.try_take() {
            Some(Ok(Ok(value))) => assert_eq!(value, "done"),
            _ => panic!("expected a delivered value"),
        }
    }

    #[tokio::test]
    async fn test_wakes_awaiting_task() {
        let (tx, completion) = Completion::channel();
        let waiter = tokio::spawn(completion);
        tokio::task::yield_now().await;
        tx.send(Ok(1u8)).unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), Ok(1));
    }
}
