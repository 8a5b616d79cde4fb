//! Read-only projections over a task list: filtering and dashboard stats.
//!
//! # Invariants
//! - Queries never reorder tasks unless documented (upcoming deadlines).
//! - Queries take `now` explicitly; nothing reads the wall clock.

pub mod filter;
pub mod stats;

pub use filter::{StatusFilter, TaskFilter};
pub use stats::{time_remaining, CategoryCount, TaskStats, TimeRemaining};
