//! Remote task source.
//!
//! # Responsibility
//! - Define the asynchronous list/create/update/delete contract the engine
//!   mirrors local mutations to.
//! - Provide an in-memory implementation and a REST implementation.
//!
//! # Invariants
//! - Each operation is independently fallible; no call assumes a previous
//!   call succeeded.
//! - Implementations fail with `RemoteError::Timeout` instead of hanging.

pub mod http;
pub mod memory;
pub mod source;

pub use http::HttpTaskSource;
pub use memory::InMemoryTaskSource;
pub use source::{DeleteAck, RemoteError, RemoteOperation, RemoteResult, RemoteTaskSource};
