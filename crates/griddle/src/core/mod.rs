//! # Scheduler Core
//!
//! The moving parts behind [`Scheduler`](crate::Scheduler).
//!
//! * [`admission`] - unbounded multi-producer queue callers submit into
//! * [`group`] - per-key drain buffer owned by the loop
//! * [`executor`] - runs one key's batch and isolates item failures
//! * [`batch`] - the drain, pause, execute cycle
//! * [`worker`] - start/stop handle for the spawned loop
//!
//! Only the loop ever touches the request group, so none of it is locked.

pub mod admission;
pub mod batch;
pub mod executor;
pub mod group;
pub mod worker;
