//! Search, status and category filtering.

use crate::model::task::{Task, TaskCategory};
use serde::{Deserialize, Serialize};

/// Completion-state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Pending,
}

impl StatusFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "completed" => Some(Self::Completed),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }

    fn matches(self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Completed => task.completed,
            Self::Pending => !task.completed,
        }
    }
}

/// Combined list filter; all criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: StatusFilter,
    /// `None` means every category.
    pub category: Option<TaskCategory>,
    /// Case-insensitive substring over title and description.
    pub search: String,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn category(mut self, category: TaskCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status.matches(task)
            && self.category.map_or(true, |category| task.category == category)
            && self.matches_search(task)
    }

    /// Returns matching tasks in their original order.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks
            .iter()
            .filter(|task| self.matches(task))
            .cloned()
            .collect()
    }

    fn matches_search(&self, task: &Task) -> bool {
        let needle = self.search.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        task.title.to_lowercase().contains(&needle)
            || task.description.to_lowercase().contains(&needle)
    }
}

#[cfg(test)]
mod tests {
    use super::{StatusFilter, TaskFilter};
    use crate::model::task::{Task, TaskCategory, TaskId};
    use chrono::{TimeZone, Utc};

    fn tasks() -> Vec<Task> {
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut report = Task::new(TaskId(1), "Quarterly report", TaskCategory::Work, created);
        report.description = "Numbers for the board".to_string();
        let mut gym = Task::new(TaskId(2), "Gym", TaskCategory::Personal, created);
        gym.completed = true;
        let outage = Task::new(TaskId(3), "Outage postmortem", TaskCategory::Urgent, created);
        vec![report, gym, outage]
    }

    #[test]
    fn default_filter_keeps_everything_in_order() {
        let all = TaskFilter::new().apply(&tasks());
        let ids: Vec<i64> = all.iter().map(|task| task.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn search_matches_title_or_description_case_insensitively() {
        let hits = TaskFilter::new().search("BOARD").apply(&tasks());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, TaskId(1));
    }

    #[test]
    fn status_and_category_combine() {
        let pending_work = TaskFilter::new()
            .status(StatusFilter::Pending)
            .category(TaskCategory::Work)
            .apply(&tasks());
        assert_eq!(pending_work.len(), 1);

        let completed = TaskFilter::new()
            .status(StatusFilter::Completed)
            .apply(&tasks());
        assert_eq!(completed[0].id, TaskId(2));
    }
}
