//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical `Task` record shared by store, remote and engine.
//! - Represent partial updates as an explicit field-level patch.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - `created_at` never changes after creation.
//! - `completed_at` is set by callers on completion transitions; the model
//!   carries it but does not enforce the pairing.

pub mod patch;
pub mod task;
