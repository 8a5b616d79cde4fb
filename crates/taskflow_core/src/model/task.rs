//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record persisted locally and mirrored remotely.
//! - Provide creation helpers (`TaskDraft`, `TaskIdGenerator`).
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - JSON field names are camelCase (`createdAt`, `completedAt`).
//! - Absent `deadline` is encoded as `null`, never as a past timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

/// Stable identifier for a task.
///
/// Numeric to stay wire-compatible with existing task collections, which use
/// epoch-millisecond ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Task category shown as a colored badge by views.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    #[default]
    Work,
    Personal,
    Urgent,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 3] = [Self::Work, Self::Personal, Self::Urgent];

    /// Stable string id used in JSON and filters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Personal => "personal",
            Self::Urgent => "urgent",
        }
    }

    /// Parses a category id, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "work" => Some(Self::Work),
            "personal" => Some(Self::Personal),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl Display for TaskCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    /// Empty string means "no description".
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: TaskCategory,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Set when `completed` flips false -> true, cleared on the reverse.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates an incomplete task with no description and no deadline.
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        category: TaskCategory,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            category,
            completed: false,
            deadline: None,
            created_at,
            completed_at: None,
        }
    }

    /// Materializes a creation request into a task.
    ///
    /// # Invariants
    /// - `completed` starts as `false` and `completed_at` as `None`.
    /// - `created_at` is `now`.
    /// - The draft is not re-validated here; call `TaskDraft::validate` first.
    pub fn from_draft(draft: TaskDraft, id: TaskId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description,
            category: draft.category,
            completed: false,
            deadline: draft.deadline,
            created_at: now,
            completed_at: None,
        }
    }

    /// Validates record-level invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Returns whether this task is still actionable and past its deadline.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.deadline.is_some_and(|deadline| deadline < now)
    }
}

/// Task-creation request, before an id and timestamps are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: TaskCategory,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, category: TaskCategory) -> Self {
        Self {
            title: title.into(),
            category,
            ..Self::default()
        }
    }

    /// Validates creation input against `now`.
    ///
    /// # Errors
    /// - `EmptyTitle` when the title is blank after trimming.
    /// - `DeadlineNotInFuture` when a deadline is set at or before `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if let Some(deadline) = self.deadline {
            if deadline <= now {
                return Err(TaskValidationError::DeadlineNotInFuture { deadline });
            }
        }
        Ok(())
    }
}

/// Validation failure for task input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    DeadlineNotInFuture { deadline: DateTime<Utc> },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "Title is required"),
            Self::DeadlineNotInFuture { deadline } => {
                write!(f, "Deadline must be in the future (got {})", deadline.to_rfc3339())
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Allocates task ids from wall-clock milliseconds.
///
/// Ids are strictly increasing per generator, so two tasks created in the
/// same millisecond still receive distinct ids.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    last: AtomicI64,
}

impl TaskIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id for a task created at `now`.
    pub fn next_id(&self, now: DateTime<Utc>) -> TaskId {
        let candidate = now.timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        TaskId(candidate.max(previous + 1))
    }
}
