use std::time::Duration;
use tokio::sync::oneshot::Sender;
use tokio::time::Instant;
use crate::error::BatchResult;

/// Sending half of a caller's completion channel.
///
/// Consumed by [`complete`](Self::complete), so a result can be handed
/// over at most once.
pub struct Responder<O> {
    sender: Sender<BatchResult<O>>,
}

impl<O> Responder<O> {
    pub fn new(sender: Sender<BatchResult<O>>) -> Self {
        Self {
            sender,
        }
    }

    /// Whether the caller has dropped its [`Completion`](super::Completion).
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }

    /// Delivers the result.
    ///
    /// Returns the result back when the caller is no longer listening.
    pub fn complete(self, result: BatchResult<O>) -> Result<(), BatchResult<O>> {
        self.sender.send(result)
    }
}

/// # PendingRequest
///
/// One admitted submission waiting for its drain cycle.
///
/// A `PendingRequest` pairs the caller's payload with the [`Responder`] for
/// its completion channel. It is created at submission and owned by the
/// scheduler loop from then on. At execution time it is split with
/// [`into_parts`](Self::into_parts) so payloads can be batched while the
/// responders wait for their results.
///
/// ## Type Parameters
///
/// * `P` - The payload submitted by the caller
/// * `O` - The routine output the caller is waiting for
pub struct PendingRequest<P, O> {
    /// The value to run through the routine
    payload: P,

    /// When the caller handed the request over
    submitted_at: Instant,

    /// Single-use channel back to the caller
    responder: Responder<O>,
}

impl<P, O> PendingRequest<P, O> {
    pub fn new(payload: P, sender: Sender<BatchResult<O>>) -> Self {
        Self {
            payload,
            submitted_at: Instant::now(),
            responder: Responder::new(sender),
        }
    }

    /// The value that will be run through the routine.
    #[allow(dead_code)]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// When the caller handed the request over.
    #[allow(dead_code)]
    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Time spent since submission.
    pub fn waited(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    pub fn is_abandoned(&self) -> bool {
        self.responder.is_abandoned()
    }

    /// Delivers the result, consuming the request.
    #[allow(dead_code)]
    pub fn complete(self, result: BatchResult<O>) -> Result<(), BatchResult<O>> {
        self.responder.complete(result)
    }

    /// Splits the request so the payload can join a batch while the
    /// responder waits for its result.
    pub fn into_parts(self) -> (P, Responder<O>) {
        (self.payload, self.responder)
    }
}
