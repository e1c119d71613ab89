//! Task types and the helpers that read them.
//!
//! A task always belongs to exactly one project. `time_spent` only moves
//! through the timer commit or an explicit edit; nothing in this module
//! mutates it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Task status.
///
/// The list view cycles a task through the states in order:
///
/// ```text
/// todo -> in-progress -> completed -> todo
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed];

    /// The status a one-click status toggle moves to.
    pub fn next(self) -> TaskStatus {
        match self {
            TaskStatus::Todo => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::Todo,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("unknown priority '{other}'"),
            }),
        }
    }
}

/// A unit of work tracked against a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque unique identifier
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Owning project (required)
    pub project_id: String,
    /// Creator
    pub user_id: String,
    /// Assignees, kept in display order
    #[serde(default)]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
    pub due_date: NaiveDate,
    /// Estimated minutes
    #[serde(default)]
    pub time_estimate: u32,
    /// Accumulated minutes
    #[serde(default)]
    pub time_spent: u32,
    /// Immutable after creation
    pub created_at: NaiveDate,
}

impl Task {
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assigned_to.iter().any(|id| id == user_id)
    }

    /// Spent time as a percentage of the estimate, capped at 100.
    ///
    /// Returns 0 when there is no estimate.
    pub fn progress_percent(&self) -> u32 {
        if self.time_estimate == 0 {
            return 0;
        }
        let pct = (100.0 * self.time_spent as f64 / self.time_estimate as f64).round() as u32;
        pct.min(100)
    }

    /// Whether the timer picker should offer this task: not completed and
    /// still under its estimate.
    pub fn is_timer_candidate(&self) -> bool {
        self.status != TaskStatus::Completed && self.time_spent < self.time_estimate
    }
}

/// Fields supplied when creating a task. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub project_id: String,
    pub user_id: String,
    #[serde(default)]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub time_estimate: u32,
    #[serde(default)]
    pub time_spent: u32,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.project_id.trim().is_empty() {
            return Err(ValidationError::MissingField("project_id"));
        }
        Ok(())
    }

    pub fn into_task(self, id: String, created_at: NaiveDate) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            project_id: self.project_id,
            user_id: self.user_id,
            assigned_to: self.assigned_to,
            priority: self.priority,
            status: self.status,
            due_date: self.due_date,
            time_estimate: self.time_estimate,
            time_spent: self.time_spent,
            created_at,
        }
    }
}

/// Partial task update. `None` fields are left untouched; `id` and
/// `created_at` cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_estimate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u32>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(t) = &self.title {
            task.title = t.clone();
        }
        if let Some(d) = &self.description {
            task.description = d.clone();
        }
        if let Some(p) = &self.project_id {
            task.project_id = p.clone();
        }
        if let Some(a) = &self.assigned_to {
            task.assigned_to = a.clone();
        }
        if let Some(p) = self.priority {
            task.priority = p;
        }
        if let Some(s) = self.status {
            task.status = s;
        }
        if let Some(d) = self.due_date {
            task.due_date = d;
        }
        if let Some(e) = self.time_estimate {
            task.time_estimate = e;
        }
        if let Some(s) = self.time_spent {
            task.time_spent = s;
        }
    }
}

/// List filter. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub project_id: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(ref pid) = self.project_id {
            if &task.project_id != pid {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }
}

/// Tasks due on `date`, for the calendar view.
pub fn tasks_due_on(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    tasks.iter().filter(|t| t.due_date == date).collect()
}

/// Tasks that can be picked for the timer.
pub fn timer_candidates(tasks: &[Task]) -> Vec<&Task> {
    tasks.iter().filter(|t| t.is_timer_candidate()).collect()
}

#[cfg(test)]
pub(crate) fn sample_task(id: &str, project_id: &str) -> Task {
    Task {
        id: id.to_string(),
        title: format!("Task {id}"),
        description: String::new(),
        project_id: project_id.to_string(),
        user_id: "u1".to_string(),
        assigned_to: vec!["u1".to_string()],
        priority: TaskPriority::Medium,
        status: TaskStatus::Todo,
        due_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        time_estimate: 60,
        time_spent: 0,
        created_at: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
    }
}
