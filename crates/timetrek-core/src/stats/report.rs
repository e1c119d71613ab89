//! The reports page: one user's tasks, optionally narrowed to a project.

use serde::{Deserialize, Serialize};

use super::{
    completion_stats, project_time_distribution, rounded_percent, time_stats, user_tasks,
    CompletionStats, ProjectTime, TimeStats,
};
use crate::project::Project;
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub user_id: String,
    /// `None` means all projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl ReportFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: None,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        user_tasks(tasks, &self.user_id)
            .into_iter()
            .filter(|t| {
                self.project_id
                    .as_deref()
                    .map_or(true, |pid| t.project_id == pid)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSlice {
    pub status: TaskStatus,
    pub count: usize,
    pub percent: u32,
    pub color: String,
}

fn status_color(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "#94a3b8",
        TaskStatus::InProgress => "#3b82f6",
        TaskStatus::Completed => "#10b981",
    }
}

/// One slice per status, in `TaskStatus::ALL` order, empty slices included.
pub fn status_distribution<'a, I>(tasks: I) -> Vec<StatusSlice>
where
    I: IntoIterator<Item = &'a Task>,
{
    let stats = completion_stats(tasks);
    TaskStatus::ALL
        .iter()
        .map(|&status| {
            let count = match status {
                TaskStatus::Todo => stats.todo,
                TaskStatus::InProgress => stats.in_progress,
                TaskStatus::Completed => stats.completed,
            };
            StatusSlice {
                status,
                count,
                percent: rounded_percent(count, stats.total),
                color: status_color(status).to_string(),
            }
        })
        .collect()
}

/// Mean minutes spent per task, rounded. An empty set averages to 0.
pub fn average_minutes_per_task(tasks: &[&Task]) -> u64 {
    let total: u64 = tasks.iter().map(|t| u64::from(t.time_spent)).sum();
    let count = tasks.len().max(1) as u64;
    (total as f64 / count as f64).round() as u64
}

/// `"2h 5m"`, `"1h"`, `"0h"`.
pub fn format_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if mins == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {mins}m")
    }
}

/// Everything the reports page shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub filter: ReportFilter,
    pub completion: CompletionStats,
    pub time: TimeStats,
    pub time_display: String,
    pub average_minutes_per_task: u64,
    pub status_distribution: Vec<StatusSlice>,
    /// Built from all of the user's tasks, ignoring the project filter.
    pub projects: Vec<ProjectTime>,
}

impl Report {
    pub fn build(tasks: &[Task], projects: &[Project], filter: &ReportFilter) -> Self {
        let filtered = filter.apply(tasks);
        let time = time_stats(filtered.iter().copied());
        Self {
            filter: filter.clone(),
            completion: completion_stats(filtered.iter().copied()),
            time,
            time_display: format_minutes(time.time_spent),
            average_minutes_per_task: average_minutes_per_task(&filtered),
            status_distribution: status_distribution(filtered.iter().copied()),
            projects: project_time_distribution(user_tasks(tasks, &filter.user_id), projects),
        }
    }
}
