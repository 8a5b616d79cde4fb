//! Field-level partial updates for tasks.
//!
//! # Responsibility
//! - Describe which mutable task fields an update replaces.
//! - Apply replacements without touching identity or creation time.
//!
//! # Invariants
//! - `id` and `created_at` are never patchable.
//! - Nullable fields distinguish "clear" (`Some(None)`) from "keep" (`None`).

use crate::model::task::{Task, TaskCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Sparse replacement set for a task's mutable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TaskCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: TaskCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Sets (`Some`) or clears (`None`) the deadline.
    pub fn deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn completed_at(mut self, completed_at: Option<DateTime<Utc>>) -> Self {
        self.completed_at = Some(completed_at);
        self
    }

    /// Builds a completion toggle for `current`, stamping `completed_at`.
    ///
    /// # Contract
    /// - `false -> true` sets `completed_at = now`.
    /// - `-> false` clears `completed_at`.
    /// - Re-completing an already completed task keeps its original stamp.
    pub fn with_completion(current: &Task, completed: bool, now: DateTime<Utc>) -> Self {
        let patch = Self::new().completed(completed);
        if completed && !current.completed {
            patch.completed_at(Some(now))
        } else if !completed {
            patch.completed_at(None)
        } else {
            patch
        }
    }

    /// Number of fields this patch replaces.
    pub fn field_count(&self) -> usize {
        [
            self.title.is_some(),
            self.description.is_some(),
            self.category.is_some(),
            self.completed.is_some(),
            self.deadline.is_some(),
            self.completed_at.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    /// Replaces each present field on `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
    }

    /// Returns a patched copy of `task`.
    pub fn applied(&self, task: &Task) -> Task {
        let mut next = task.clone();
        self.apply_to(&mut next);
        next
    }
}

// A present JSON key (even `null`) becomes `Some(..)`; a missing key stays
// `None` through `#[serde(default)]`.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
