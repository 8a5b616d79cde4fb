//! Synchronization engine and its status reporter.
//!
//! # Responsibility
//! - Own the authoritative in-memory task list for one session.
//! - Apply mutations optimistically, then mirror them to the remote source.
//! - Surface one loading flag and one advisory error message.
//!
//! # Invariants
//! - Local state and the durable store change before any remote call starts.
//! - Remote failures never roll back local state and never escape as errors.

pub mod status;
pub mod sync_engine;

pub use status::{EngineSnapshot, StatusReporter};
pub use sync_engine::{EngineError, SyncEngine, SyncHandle, SyncOutcome, SyncPolicy};
