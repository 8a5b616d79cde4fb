//! In-memory remote task source.
//!
//! # Responsibility
//! - Stand in for the REST backend in demos and tests.
//! - Support simulated latency, a call timeout and per-operation failure
//!   injection.
//!
//! # Invariants
//! - `update`/`delete` on an unknown id fail with `RemoteError::NotFound`.
//! - `create` keeps the caller's id.

use crate::model::task::{Task, TaskCategory, TaskId};
use crate::remote::source::{
    DeleteAck, RemoteError, RemoteOperation, RemoteResult, RemoteTaskSource,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct SourceState {
    tasks: Vec<Task>,
    failing: HashSet<RemoteOperation>,
    calls: HashMap<RemoteOperation, usize>,
}

/// Remote source backed by a process-local task list.
#[derive(Default)]
pub struct InMemoryTaskSource {
    state: Mutex<SourceState>,
    latency: Option<Duration>,
    timeout: Option<Duration>,
}

impl InMemoryTaskSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            state: Mutex::new(SourceState {
                tasks,
                ..SourceState::default()
            }),
            latency: None,
            timeout: None,
        }
    }

    /// Seeds the eight example tasks, deadlines relative to `now`.
    pub fn with_example_tasks(now: DateTime<Utc>) -> Self {
        Self::with_tasks(example_tasks(now))
    }

    /// Delays every call by `latency` before touching state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fails calls whose latency exceeds `timeout` with `RemoteError::Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Makes every subsequent call of `operation` fail.
    pub fn fail_on(&self, operation: RemoteOperation) {
        self.state().failing.insert(operation);
    }

    /// Restores normal behavior for `operation`.
    pub fn recover(&self, operation: RemoteOperation) {
        self.state().failing.remove(&operation);
    }

    /// Snapshot of the remote collection.
    pub fn tasks(&self) -> Vec<Task> {
        self.state().tasks.clone()
    }

    /// Number of calls received for `operation`, failed ones included.
    pub fn call_count(&self, operation: RemoteOperation) -> usize {
        self.state().calls.get(&operation).copied().unwrap_or(0)
    }

    fn state(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn begin(&self, operation: RemoteOperation) -> RemoteResult<()> {
        *self.state().calls.entry(operation).or_insert(0) += 1;
        if let Some(latency) = self.latency {
            let delay = tokio::time::sleep(latency);
            match self.timeout {
                Some(timeout) => tokio::time::timeout(timeout, delay)
                    .await
                    .map_err(|_| RemoteError::Timeout(operation))?,
                None => delay.await,
            }
        }
        if self.state().failing.contains(&operation) {
            return Err(RemoteError::Unavailable(format!(
                "{operation} rejected by fault injection"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTaskSource for InMemoryTaskSource {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        self.begin(RemoteOperation::List).await?;
        Ok(self.tasks())
    }

    async fn create(&self, task: &Task) -> RemoteResult<Task> {
        self.begin(RemoteOperation::Create).await?;
        self.state().tasks.push(task.clone());
        Ok(task.clone())
    }

    async fn update(&self, id: TaskId, task: &Task) -> RemoteResult<Task> {
        self.begin(RemoteOperation::Update).await?;
        let mut state = self.state();
        let slot = state
            .tasks
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or(RemoteError::NotFound(id))?;
        *slot = Task {
            id,
            ..task.clone()
        };
        Ok(slot.clone())
    }

    async fn delete(&self, id: TaskId) -> RemoteResult<DeleteAck> {
        self.begin(RemoteOperation::Delete).await?;
        let mut state = self.state();
        let index = state
            .tasks
            .iter()
            .position(|existing| existing.id == id)
            .ok_or(RemoteError::NotFound(id))?;
        state.tasks.remove(index);
        Ok(DeleteAck { success: true })
    }
}

fn example_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let seeds: [(i64, &str, &str, TaskCategory, Option<i64>, bool); 8] = [
        (
            1,
            "Review Q4 project proposals",
            "Evaluate all submitted project proposals for Q4 and provide feedback to the team leads",
            TaskCategory::Work,
            Some(3),
            false,
        ),
        (
            2,
            "Schedule doctor appointment",
            "Book annual checkup with Dr. Smith for next month",
            TaskCategory::Personal,
            Some(7),
            false,
        ),
        (
            3,
            "Fix critical production bug",
            "User authentication is failing for Safari browsers - needs immediate attention",
            TaskCategory::Urgent,
            Some(1),
            false,
        ),
        (
            4,
            "Buy groceries for dinner party",
            "Get ingredients for Saturday's dinner party: salmon, vegetables, wine, dessert",
            TaskCategory::Personal,
            None,
            true,
        ),
        (
            5,
            "Prepare client presentation",
            "Create slides and demo for the ABC Corp product showcase meeting",
            TaskCategory::Work,
            Some(5),
            false,
        ),
        (
            6,
            "Update project documentation",
            "Add API documentation and update README files for the new features released",
            TaskCategory::Work,
            None,
            true,
        ),
        (
            7,
            "Plan weekend hiking trip",
            "Research trails, check weather, pack equipment for the mountain hiking trip",
            TaskCategory::Personal,
            Some(2),
            false,
        ),
        (
            8,
            "Code review for security update",
            "Review and approve the security patches submitted by the development team",
            TaskCategory::Urgent,
            Some(1),
            false,
        ),
    ];

    seeds
        .into_iter()
        .map(|(id, title, description, category, deadline_days, completed)| Task {
            id: TaskId(id),
            title: title.to_string(),
            description: description.to_string(),
            category,
            completed,
            deadline: deadline_days.map(|days| now + ChronoDuration::days(days)),
            created_at: now,
            completed_at: completed.then_some(now),
        })
        .collect()
}
