//! # Griddle
//!
//! A request-coalescing batch scheduler for model-serving services.
//!
//! ## Overview
//!
//! Inference routines are usually far cheaper per item when handed many
//! inputs at once. Griddle sits between a request handler and such a routine:
//! concurrent callers each submit one payload and await one result, while a
//! single background loop gathers whatever arrived during a short window and
//! runs it through the routine as one batch.
//!
//! Key components include:
//!
//! - [`Scheduler`], the caller-facing handle that owns the background loop
//! - [`InferenceRoutine`], the trait a model implements to be batched
//! - [`BatchKey`], which decides which requests may share a call
//! - [`TaskRegistry`], for fire-and-poll style requests
//!
//! ## Architecture
//!
//! ### Batch keys
//!
//! Two requests only ever share a routine call when they target the same
//! entry point and want the same output format. The key is derived from the
//! request path and `Accept` header with [`BatchKey::from_request`].
//!
//! ### Drain cycle
//!
//! The loop parks while idle. Once a request shows up it drains the admission
//! queue, waits one poll interval so more requests can join, then executes
//! each key's batch in turn. A configured batch size cap cuts the wait short.
//!
//! ### Failure isolation
//!
//! When a batch call fails, panics, or returns the wrong number of outputs,
//! every payload in it is retried alone. A payload that still fails resolves
//! its own caller with an [`ItemError`]; the others get their outputs.
//!
//! ### Shutdown
//!
//! [`Scheduler::stop`] closes admission and runs what was already admitted
//! before returning. Submissions that arrive afterwards resolve to
//! [`GriddleError::SchedulerStopped`]; no caller is left waiting forever.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use griddle::{Batcher, BatchKey, RoutineError, Scheduler, SchedulerConfig, SyncRoutine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> griddle::Result<()> {
//! let routine = SyncRoutine::new(|batch: &[String], _| {
//!     Ok::<_, RoutineError>(batch.iter().map(|s| s.chars().rev().collect::<String>()).collect::<Vec<_>>())
//! });
//! let scheduler = Scheduler::start(Arc::new(routine), SchedulerConfig::default())?;
//!
//! let key = BatchKey::from_request("/predict", None, false)?;
//! assert_eq!(scheduler.predict("abc".to_string(), key).await?, "cba");
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```

mod communication;
mod core;
mod scheduler;

pub mod config;
pub mod error;
pub mod key;
pub mod routine;
pub mod tasks;

pub use communication::Completion;
pub use config::{SchedulerConfig, ServiceConfig};
pub use error::{BatchResult, GriddleError, ItemError, Result, RoutineError};
pub use key::{endpoint_name_from_path, BatchKey, ResponseFormat};
pub use routine::{AsyncRoutine, InferenceRoutine, PredictOptions, RoutineRegistry, SharedRoutine, SyncRoutine};
pub use scheduler::{Batcher, Scheduler};
pub use tasks::{TaskRegistry, TaskStatus};
