//! REST implementation of the remote task source.
//!
//! # Responsibility
//! - Map list/create/update/delete onto a task collection endpoint:
//!   `GET /tasks`, `POST /tasks`, `PUT /tasks/{id}`, `DELETE /tasks/{id}`.
//! - Convert transport, status and decode failures into `RemoteError`.
//!
//! # Invariants
//! - Every request is bounded by the client timeout.
//! - `404` on update/delete maps to `RemoteError::NotFound`.

use crate::model::task::{Task, TaskId};
use crate::remote::source::{
    DeleteAck, RemoteError, RemoteOperation, RemoteResult, RemoteTaskSource,
};
use async_trait::async_trait;
use log::warn;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

const TASKS_PATH: &str = "tasks";

/// HTTP client for a REST task collection.
#[derive(Clone)]
pub struct HttpTaskSource {
    client: Client,
    base_url: String,
}

impl HttpTaskSource {
    /// Builds a client for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    /// Returns `RemoteError::Transport` when the client cannot be constructed
    /// or `base_url` is blank.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RemoteError::Transport("base url cannot be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::Transport(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/{TASKS_PATH}", self.base_url)
    }

    fn item_url(&self, id: TaskId) -> String {
        format!("{}/{TASKS_PATH}/{id}", self.base_url)
    }
}

#[async_trait]
impl RemoteTaskSource for HttpTaskSource {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        let operation = RemoteOperation::List;
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(|err| transport_error(operation, err))?;
        let response = check_status(operation, None, response)?;
        response
            .json::<Vec<Task>>()
            .await
            .map_err(|err| transport_error(operation, err))
    }

    async fn create(&self, task: &Task) -> RemoteResult<Task> {
        let operation = RemoteOperation::Create;
        let response = self
            .client
            .post(self.collection_url())
            .json(task)
            .send()
            .await
            .map_err(|err| transport_error(operation, err))?;
        let response = check_status(operation, None, response)?;
        response
            .json::<Task>()
            .await
            .map_err(|err| transport_error(operation, err))
    }

    async fn update(&self, id: TaskId, task: &Task) -> RemoteResult<Task> {
        let operation = RemoteOperation::Update;
        let response = self
            .client
            .put(self.item_url(id))
            .json(task)
            .send()
            .await
            .map_err(|err| transport_error(operation, err))?;
        let response = check_status(operation, Some(id), response)?;
        response
            .json::<Task>()
            .await
            .map_err(|err| transport_error(operation, err))
    }

    async fn delete(&self, id: TaskId) -> RemoteResult<DeleteAck> {
        let operation = RemoteOperation::Delete;
        let response = self
            .client
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(|err| transport_error(operation, err))?;
        check_status(operation, Some(id), response)?;
        Ok(DeleteAck { success: true })
    }
}

fn check_status(
    operation: RemoteOperation,
    id: Option<TaskId>,
    response: Response,
) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    warn!(
        "event=remote_call module=remote status=error operation={} http_status={}",
        operation,
        status.as_u16()
    );
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(RemoteError::NotFound(id)),
        _ => Err(RemoteError::Status {
            operation,
            status: status.as_u16(),
        }),
    }
}

fn transport_error(operation: RemoteOperation, err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(operation)
    } else if err.is_decode() {
        RemoteError::Decode(err.to_string())
    } else {
        RemoteError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::HttpTaskSource;
    use crate::model::task::TaskId;
    use crate::remote::source::RemoteError;
    use std::time::Duration;

    #[test]
    fn new_normalizes_trailing_slash() {
        let source = HttpTaskSource::new("https://tasks.example.com/api/", Duration::from_secs(5))
            .expect("client should build");
        assert_eq!(source.base_url(), "https://tasks.example.com/api");
        assert_eq!(
            source.item_url(TaskId(12)),
            "https://tasks.example.com/api/tasks/12"
        );
    }

    #[test]
    fn new_rejects_blank_base_url() {
        let err = HttpTaskSource::new("   ", Duration::from_secs(5))
            .err()
            .expect("blank url must be rejected");
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
