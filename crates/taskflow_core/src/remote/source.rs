//! Remote task source contract.

use crate::model::task::{Task, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote operation kind, used for failure reporting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    List,
    Create,
    Update,
    Delete,
}

impl RemoteOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl Display for RemoteOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement returned by a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
    pub success: bool,
}

impl DeleteAck {
    /// Turns `success: false` into `RemoteError::Rejected`.
    pub fn into_result(self) -> RemoteResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(RemoteError::Rejected(RemoteOperation::Delete))
        }
    }
}

/// Remote call failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection-level failure (DNS, refused, reset).
    Transport(String),
    /// Non-success response status.
    Status {
        operation: RemoteOperation,
        status: u16,
    },
    /// Target task does not exist remotely.
    NotFound(TaskId),
    /// Response body could not be decoded.
    Decode(String),
    /// The call did not complete within the configured timeout.
    Timeout(RemoteOperation),
    /// The backend answered but declined the operation.
    Rejected(RemoteOperation),
    /// Injected or otherwise unavailable backend.
    Unavailable(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "remote transport error: {message}"),
            Self::Status { operation, status } => {
                write!(f, "remote {operation} failed with status {status}")
            }
            Self::NotFound(id) => write!(f, "task not found remotely: {id}"),
            Self::Decode(message) => write!(f, "invalid remote response: {message}"),
            Self::Timeout(operation) => write!(f, "remote {operation} timed out"),
            Self::Rejected(operation) => write!(f, "remote {operation} was refused"),
            Self::Unavailable(message) => write!(f, "remote unavailable: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Network collaborator holding the remote copy of the task collection.
#[async_trait]
pub trait RemoteTaskSource: Send + Sync {
    /// Fetches the full remote task list.
    async fn list(&self) -> RemoteResult<Vec<Task>>;
    /// Creates a task; returns the remote representation.
    async fn create(&self, task: &Task) -> RemoteResult<Task>;
    /// Replaces the task stored under `id` with `task`.
    async fn update(&self, id: TaskId, task: &Task) -> RemoteResult<Task>;
    /// Deletes the task stored under `id`.
    async fn delete(&self, id: TaskId) -> RemoteResult<DeleteAck>;
}
