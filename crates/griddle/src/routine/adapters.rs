//! Closure-backed routines covering both calling conventions.
//!
//! [`SyncRoutine`] wraps plain functions and [`AsyncRoutine`] wraps functions
//! returning a future. Each holds a default entry point plus any number of
//! named alternates.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use futures::future::BoxFuture;
use crate::error::RoutineError;
use super::core_trait::{InferenceRoutine, PredictOptions};

type SyncFn<P, O> = Arc<dyn Fn(&[P], PredictOptions) -> Result<Vec<O>, RoutineError> + Send + Sync>;

type AsyncFn<P, O> = Arc<dyn Fn(Vec<P>, PredictOptions) -> BoxFuture<'static, Result<Vec<O>, RoutineError>> + Send + Sync>;

/// A routine made of synchronous functions.
///
/// The functions run on the scheduler task itself, so a slow one delays
/// every other key until it returns.
pub struct SyncRoutine<P, O> {
    default: SyncFn<P, O>,
    entry_points: HashMap<String, SyncFn<P, O>>,
    response_format: bool,
}

impl<P, O> SyncRoutine<P, O> {
    /// Wraps `predict` as the default entry point.
    ///
    /// # Parameters
    ///
    /// * `predict` - Maps a batch of payloads to one output per payload, in
    ///   order
    pub fn new<F>(predict: F) -> Self
    where F: Fn(&[P], PredictOptions) -> Result<Vec<O>, RoutineError> + Send + Sync + 'static
    {
        Self {
            default: Arc::new(predict),
            entry_points: HashMap::new(),
            response_format: false,
        }
    }

    /// Adds a named entry point, selected when a request's endpoint name
    /// equals `name`.
    pub fn with_entry_point<F>(mut self, name: impl Into<String>, predict: F) -> Self
    where F: Fn(&[P], PredictOptions) -> Result<Vec<O>, RoutineError> + Send + Sync + 'static
    {
        self.entry_points.insert(name.into(), Arc::new(predict));
        self
    }

    /// Opts into receiving the caller's response format.
    pub fn with_response_format(mut self) -> Self {
        self.response_format = true;
        self
    }
}

#[async_trait]
impl<P, O> InferenceRoutine<P, O> for SyncRoutine<P, O>
where P: Send + Sync, O: Send
{
    async fn predict(&self, batch: &[P], options: PredictOptions) -> Result<Vec<O>, RoutineError> {
        (self.default)(batch, options)
    }

    fn has_entry_point(&self, name: &str) -> bool {
        self.entry_points.contains_key(name)
    }

    async fn predict_named(&self, name: &str, batch: &[P], options: PredictOptions) -> Result<Vec<O>, RoutineError> {
        match self.entry_points.get(name) {
            Some(entry) => entry(batch, options),
            None => Err(RoutineError::UnknownEntryPoint(name.to_string())),
        }
    }

    fn accepts_response_format(&self) -> bool {
        self.response_format
    }
}

/// A routine made of functions returning futures.
///
/// The batch is handed over by value so the returned future can be
/// `'static`; this is why payloads must be `Clone`.
pub struct AsyncRoutine<P, O> {
    default: AsyncFn<P, O>,
    entry_points: HashMap<String, AsyncFn<P, O>>,
    response_format: bool,
}

impl<P, O> AsyncRoutine<P, O> {
    /// Wraps `predict` as the default entry point.
    ///
    /// # Parameters
    ///
    /// * `predict` - Receives an owned copy of the batch and returns a boxed
    ///   future resolving to one output per payload
    pub fn new<F>(predict: F) -> Self
    where F: Fn(Vec<P>, PredictOptions) -> BoxFuture<'static, Result<Vec<O>, RoutineError>> + Send + Sync + 'static
    {
        Self {
            default: Arc::new(predict),
            entry_points: HashMap::new(),
            response_format: false,
        }
    }

    /// Adds a named entry point; see [`SyncRoutine::with_entry_point`].
    pub fn with_entry_point<F>(mut self, name: impl Into<String>, predict: F) -> Self
    where F: Fn(Vec<P>, PredictOptions) -> BoxFuture<'static, Result<Vec<O>, RoutineError>> + Send + Sync + 'static
    {
        self.entry_points.insert(name.into(), Arc::new(predict));
        self
    }

    /// Opts into receiving the caller's response format.
    pub fn with_response_format(mut self) -> Self {
        self.response_format = true;
        self
    }
}

#[async_trait]
impl<P, O> InferenceRoutine<P, O> for AsyncRoutine<P, O>
where P: Clone + Send + Sync, O: Send
{
    async fn predict(&self, batch: &[P], options: PredictOptions) -> Result<Vec<O>, RoutineError> {
        (self.default)(batch.to_vec(), options).await
    }

    fn has_entry_point(&self, name: &str) -> bool {
        self.entry_points.contains_key(name)
    }

    async fn predict_named(&self, name: &str, batch: &[P], options: PredictOptions) -> Result<Vec<O>, RoutineError> {
        match self.entry_points.get(name) {
            Some(entry) => entry(batch.to_vec(), options).await,
            None => Err(RoutineError::UnknownEntryPoint(name.to_string())),
        }
    }

    fn accepts_response_format(&self) -> bool {
        self.response_format
    }
}
