use std::any::Any;
use std::panic::AssertUnwindSafe;
use futures::FutureExt;
use tracing::{debug, warn};
use crate::communication::PendingRequest;
use crate::error::{BatchResult, ItemError, RoutineError};
use crate::key::BatchKey;
use crate::routine::{PredictOptions, SharedRoutine};

/// # BatchExecutor
///
/// Runs one key's accumulated payloads through the inference routine.
///
/// The whole batch is attempted first. If that call fails, panics, or
/// returns the wrong number of results, every payload is retried on its own
/// so a single bad input only fails its own caller. Whatever still fails in
/// isolation becomes an [`ItemError`] for that position.
pub struct BatchExecutor<P, O>
where P: Send + Sync, O: Send
{
    routine: SharedRoutine<P, O>,
}

impl<P, O> BatchExecutor<P, O>
where P: Send + Sync, O: Send
{
    pub fn new(routine: SharedRoutine<P, O>) -> Self {
        Self {
            routine,
        }
    }

    /// Options for a call on behalf of `key`.
    ///
    /// The response format is only forwarded to routines that asked for it.
    pub fn options_for(&self, key: &BatchKey) -> PredictOptions {
        PredictOptions {
            as_json: self.routine.accepts_response_format() && key.wants_json,
        }
    }

    /// One routine invocation, with panics and short or long result
    /// vectors folded into [`RoutineError`].
    async fn invoke(&self, key: &BatchKey, batch: &[P]) -> Result<Vec<O>, RoutineError> {
        let options = self.options_for(key);
        let name = key.endpoint_name.as_str();
        let call = async {
            if self.routine.has_entry_point(name) {
                self.routine.predict_named(name, batch, options).await
            } else {
                self.routine.predict(batch, options).await
            }
        };

        let outputs = AssertUnwindSafe(call)
            .catch_unwind()
            .await
            .map_err(|panic| RoutineError::Panicked(panic_message(panic.as_ref())))??;

        if outputs.len() != batch.len() {
            return Err(RoutineError::LengthMismatch {
                expected: batch.len(),
                got: outputs.len(),
            });
        }
        Ok(outputs)
    }

    /// Produces one result per payload, index for index.
    pub async fn execute(&self, key: &BatchKey, payloads: &[P]) -> Vec<BatchResult<O>> {
        if payloads.is_empty() {
            return vec![];
        }

        match self.invoke(key, payloads).await {
            Ok(outputs) => outputs.into_iter().map(Ok).collect(),
            Err(e) => {
                warn!(
                    endpoint = %key.endpoint_name,
                    wants_json = key.wants_json,
                    batch = payloads.len(),
                    error = %e,
                    "batch call failed, retrying items one by one"
                );
                let mut results = Vec::with_capacity(payloads.len());
                for payload in payloads {
                    results.push(self.execute_single(key, payload).await);
                }
                results
            }
        }
    }

    async fn execute_single(&self, key: &BatchKey, payload: &P) -> BatchResult<O> {
        let mut outputs = self.invoke(key, std::slice::from_ref(payload)).await?;
        outputs
            .pop()
            .ok_or_else(|| RoutineError::LengthMismatch { expected: 1, got: 0 }.into())
    }

    /// Executes `requests` as one batch and hands every caller its result.
    pub async fn run(&self, key: &BatchKey, requests: Vec<PendingRequest<P, O>>) {
        let oldest = requests.first().map(PendingRequest::waited).unwrap_or_default();
        let abandoned = requests.iter().filter(|r| r.is_abandoned()).count();
        let (payloads, responders): (Vec<P>, Vec<_>) = requests
            .into_iter()
            .map(PendingRequest::into_parts)
            .unzip();

        debug!(
            endpoint = %key.endpoint_name,
            wants_json = key.wants_json,
            batch = payloads.len(),
            oldest_wait_ms = oldest.as_millis() as u64,
            abandoned,
            "executing batch"
        );
        let mut results = self.execute(key, &payloads).await.into_iter();

        for (position, responder) in responders.into_iter().enumerate() {
            let result = results.next().unwrap_or_else(|| {
                Err(ItemError::new("LengthMismatch", format!("no result produced for item {}", position)))
            });
            if responder.complete(result).is_err() {
                warn!(endpoint = %key.endpoint_name, position, "caller went away before its result was ready");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use async_trait::async_trait;
    use tokio::sync::oneshot;
    use crate::routine::InferenceRoutine;

    const POISON: i32 = -1;

    /// Squares its inputs, records every call, and fails any batch that
    /// contains the poison value.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Option<String>, Vec<i32>, bool)>>,
        named: bool,
        json_aware: bool,
    }

    impl Recorder {
        fn calls(&self) -> Vec<(Option<String>, Vec<i32>, bool)> {
            self.calls.lock().unwrap().clone()
        }

        fn compute(&self, name: Option<&str>, batch: &[i32], options: PredictOptions) -> Result<Vec<i32>, RoutineError> {
            self.calls.lock().unwrap().push((name.map(str::to_string), batch.to_vec(), options.as_json));
            if batch.contains(&POISON) {
                return Err(RoutineError::failed("ValueError", "poisoned input"));
            }
            Ok(batch.iter().map(|v| v * v).collect())
        }
    }

    #[async_trait]
    impl InferenceRoutine<i32, i32> for Recorder {
        async fn predict(&self, batch: &[i32], options: PredictOptions) -> Result<Vec<i32>, RoutineError> {
            self.compute(None, batch, options)
        }

        fn has_entry_point(&self, name: &str) -> bool {
            self.named && name == "rotate_180"
        }

        async fn predict_named(&self, name: &str, batch: &[i32], options: PredictOptions) -> Result<Vec<i32>, RoutineError> {
            self.compute(Some(name), batch, options)
        }

        fn accepts_response_format(&self) -> bool {
            self.json_aware
        }
    }

    fn executor(recorder: Recorder) -> (Arc<Recorder>, BatchExecutor<i32, i32>) {
        let recorder = Arc::new(recorder);
        (recorder.clone(), BatchExecutor::new(recorder))
    }

    #[tokio::test]
    async fn test_whole_batch_success_is_one_call() {
        let (recorder, executor) = executor(Recorder::default());
        let key = BatchKey::new("predict", false);

        let results = executor.execute(&key, &[1, 2, 3]).await;

        assert_eq!(results, vec![Ok(1), Ok(4), Ok(9)]);
        assert_eq!(recorder.calls(), vec![(None, vec![1, 2, 3], false)]);
    }

    #[tokio::test]
    async fn test_failure_isolated_to_poisoned_item() {
        let (recorder, executor) = executor(Recorder::default());
        let key = BatchKey::new("predict", false);

        let results = executor.execute(&key, &[2, POISON, 3]).await;

        assert_eq!(results[0], Ok(4));
        assert_eq!(results[1].as_ref().unwrap_err().kind, "ValueError");
        assert_eq!(results[2], Ok(9));

        let batches = recorder.calls().into_iter().map(|(_, b, _)| b).collect::<Vec<_>>();
        assert_eq!(batches, vec![vec![2, POISON, 3], vec![2], vec![POISON], vec![3]]);
    }

    #[tokio::test]
    async fn test_isolation_for_every_position() {
        for k in 0..4 {
            let (_, executor) = executor(Recorder::default());
            let mut payloads = vec![1, 2, 3, 4];
            payloads[k] = POISON;

            let results = executor.execute(&BatchKey::new("predict", false), &payloads).await;

            assert_eq!(results.len(), 4);
            for (i, result) in results.iter().enumerate() {
                if i == k {
                    assert!(result.is_err());
                } else {
                    assert_eq!(*result, Ok(payloads[i] * payloads[i]));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_named_entry_point_is_preferred() {
        let (recorder, executor) = executor(Recorder { named: true, ..Default::default() });

        executor.execute(&BatchKey::new("rotate_180", false), &[1]).await;
        executor.execute(&BatchKey::new("predict", false), &[2]).await;

        let names = recorder.calls().into_iter().map(|(n, _, _)| n).collect::<Vec<_>>();
        assert_eq!(names, vec![Some("rotate_180".to_string()), None]);
    }

    #[tokio::test]
    async fn test_response_format_only_for_aware_routines() {
        let (unaware, executor_unaware) = executor(Recorder::default());
        executor_unaware.execute(&BatchKey::new("predict", true), &[1]).await;
        assert!(!unaware.calls()[0].2);

        let (aware, executor_aware) = executor(Recorder { json_aware: true, ..Default::default() });
        executor_aware.execute(&BatchKey::new("predict", true), &[1]).await;
        executor_aware.execute(&BatchKey::new("predict", false), &[1]).await;
        assert!(aware.calls()[0].2);
        assert!(!aware.calls()[1].2);
    }

    struct Panicky;

    #[async_trait]
    impl InferenceRoutine<i32, i32> for Panicky {
        async fn predict(&self, batch: &[i32], _options: PredictOptions) -> Result<Vec<i32>, RoutineError> {
            if batch.contains(&0) {
                panic!("division by zero");
            }
            Ok(batch.iter().map(|v| 100 / v).collect())
        }
    }

    #[tokio::test]
    async fn test_panic_counts_as_failure() {
        let executor = BatchExecutor::new(Arc::new(Panicky));

        let results = executor.execute(&BatchKey::new("predict", false), &[5, 0, 10]).await;

        assert_eq!(results[0], Ok(20));
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.kind, "Panicked");
        assert!(err.trace.contains("division by zero"));
        assert_eq!(results[2], Ok(10));
    }

    struct DropsLast;

    #[async_trait]
    impl InferenceRoutine<i32, i32> for DropsLast {
        async fn predict(&self, batch: &[i32], _options: PredictOptions) -> Result<Vec<i32>, RoutineError> {
            Ok(batch.iter().take(batch.len().saturating_sub(1).max(1)).copied().collect())
        }
    }

    #[tokio::test]
    async fn test_short_result_vector_triggers_fallback() {
        let executor = BatchExecutor::new(Arc::new(DropsLast));
        let results = executor.execute(&BatchKey::new("predict", false), &[7, 8, 9]).await;
        assert_eq!(results, vec![Ok(7), Ok(8), Ok(9)]);
    }

    #[tokio::test]
    async fn test_empty_batch_never_calls_routine() {
        let (recorder, executor) = executor(Recorder::default());
        assert!(executor.execute(&BatchKey::new("predict", false), &[]).await.is_empty());
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_delivers_to_each_caller() {
        let (_, executor) = executor(Recorder::default());
        let mut receivers = vec![];
        let mut requests = vec![];
        for payload in [3, POISON, 4] {
            let (tx, rx) = oneshot::channel();
            requests.push(PendingRequest::new(payload, tx));
            receivers.push(rx);
        }

        executor.run(&BatchKey::new("predict", false), requests).await;

        let mut delivered = vec![];
        for rx in receivers {
            delivered.push(rx.await.unwrap());
        }
        assert_eq!(delivered[0], Ok(9));
        assert!(delivered[1].is_err());
        assert_eq!(delivered[2], Ok(16));
    }

    #[tokio::test]
    async fn test_run_survives_abandoned_caller() {
        let (_, executor) = executor(Recorder::default());
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        drop(rx1);

        executor
            .run(&BatchKey::new("predict", false), vec![PendingRequest::new(1, tx1), PendingRequest::new(2, tx2)])
            .await;

        assert_eq!(rx2.await.unwrap(), Ok(4));
    }
}
