//! Dashboard statistics and deadline helpers.

use crate::model::task::{Task, TaskCategory};
use chrono::{DateTime, Utc};

const UPCOMING_DEADLINES_LIMIT: usize = 5;

/// Task count for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: TaskCategory,
    pub count: usize,
    /// Share of all tasks, rounded to the nearest whole percent.
    pub percentage: u32,
}

/// Aggregate view over a task list at a given instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// `0.0..=100.0`; `0.0` for an empty list.
    pub completion_rate: f64,
    /// Only categories with at least one task, in `TaskCategory::ALL` order.
    pub by_category: Vec<CategoryCount>,
    /// Pending tasks due after `now`, soonest first, at most five.
    pub upcoming_deadlines: Vec<Task>,
    /// Pending tasks whose deadline is before `now`, in list order.
    pub overdue: Vec<Task>,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], now: DateTime<Utc>) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let completion_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };

        let by_category = TaskCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let count = tasks.iter().filter(|task| task.category == category).count();
                (count > 0).then(|| CategoryCount {
                    category,
                    count,
                    percentage: (count as f64 / total as f64 * 100.0).round() as u32,
                })
            })
            .collect();

        let mut upcoming_deadlines: Vec<Task> = tasks
            .iter()
            .filter(|task| !task.completed && task.deadline.is_some_and(|deadline| deadline > now))
            .cloned()
            .collect();
        upcoming_deadlines.sort_by_key(|task| task.deadline);
        upcoming_deadlines.truncate(UPCOMING_DEADLINES_LIMIT);

        let overdue = tasks
            .iter()
            .filter(|task| task.is_overdue(now))
            .cloned()
            .collect();

        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate,
            by_category,
            upcoming_deadlines,
            overdue,
        }
    }
}

/// Coarse time left until a task's deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRemaining {
    Overdue,
    Days(i64),
    Hours(i64),
    /// Less than one hour left.
    DueSoon,
}

/// Returns `None` when the task has no deadline.
pub fn time_remaining(task: &Task, now: DateTime<Utc>) -> Option<TimeRemaining> {
    let left = task.deadline? - now;
    if left <= chrono::Duration::zero() {
        return Some(TimeRemaining::Overdue);
    }
    let days = left.num_days();
    let hours = left.num_hours() % 24;
    Some(if days > 0 {
        TimeRemaining::Days(days)
    } else if hours > 0 {
        TimeRemaining::Hours(hours)
    } else {
        TimeRemaining::DueSoon
    })
}
