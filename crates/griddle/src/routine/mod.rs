//! # Inference Routines
//!
//! The pluggable prediction logic behind the scheduler.
//!
//! * [`InferenceRoutine`] - the trait every routine implements
//! * [`SyncRoutine`] / [`AsyncRoutine`] - closure adapters for both calling conventions
//! * [`RoutineRegistry`] - named factories resolved from configuration at startup

mod adapters;
mod core_trait;
mod registry;

pub use adapters::{AsyncRoutine, SyncRoutine};
pub use core_trait::{InferenceRoutine, PredictOptions};
pub use registry::{RoutineRegistry, SharedRoutine};
