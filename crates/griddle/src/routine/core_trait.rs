use async_trait::async_trait;
use crate::error::RoutineError;

/// Per-call options handed to an inference routine.
///
/// Routines that never opted into response formatting always receive the
/// default, `as_json == false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictOptions {
    /// The caller asked for a JSON rendering of the results.
    pub as_json: bool,
}

/// # InferenceRoutine
///
/// The prediction logic the scheduler fronts.
///
/// A routine receives a whole batch of payloads and must return exactly one
/// output per payload, in the same order. Returning fewer or more results
/// is treated like a failure of the whole call.
///
/// ## Entry points
///
/// Every routine has a default entry point, [`predict`](Self::predict).
/// It may also expose named alternates. A request for `/rotate_180` is
/// routed to the entry point `rotate_180` when
/// [`has_entry_point`](Self::has_entry_point) says it exists, and to `predict`
/// otherwise.
///
/// ## Response format
///
/// A routine that renders results differently for JSON callers returns
/// `true` from [`accepts_response_format`](Self::accepts_response_format).
/// Only then is the caller's preference forwarded through [`PredictOptions`].
///
/// ## Type Parameters
///
/// * `P` - The payload type of a single request
/// * `O` - The output type for a single request
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use griddle::{InferenceRoutine, PredictOptions, RoutineError};
///
/// struct Doubler;
///
/// #[async_trait]
/// impl InferenceRoutine<i64, i64> for Doubler {
///     async fn predict(&self, batch: &[i64], _options: PredictOptions) -> Result<Vec<i64>, RoutineError> {
///         Ok(batch.iter().map(|v| v * 2).collect())
///     }
/// }
/// ```
#[async_trait]
pub trait InferenceRoutine<P, O>: Send + Sync
where P: Send + Sync, O: Send
{
    /// Default entry point.
    async fn predict(&self, batch: &[P], options: PredictOptions) -> Result<Vec<O>, RoutineError>;

    /// Whether a named alternate entry point exists.
    fn has_entry_point(&self, _name: &str) -> bool {
        false
    }

    /// Runs a named alternate entry point.
    ///
    /// Only called when [`has_entry_point`](Self::has_entry_point) returned
    /// `true` for `name`.
    async fn predict_named(&self, name: &str, _batch: &[P], _options: PredictOptions) -> Result<Vec<O>, RoutineError> {
        Err(RoutineError::UnknownEntryPoint(name.to_string()))
    }

    /// Whether the routine wants to know about the caller's response format.
    fn accepts_response_format(&self) -> bool {
        false
    }
}
