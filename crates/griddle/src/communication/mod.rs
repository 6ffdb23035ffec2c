//! Handoff types between callers and the scheduler loop.

mod completion;
mod pending;

pub use completion::Completion;
pub use pending::PendingRequest;
