//! Aggregates over task, project and member snapshots.
//!
//! Every function here is pure and recomputed on demand. Any ratio with a
//! zero denominator is 0.

mod report;

pub use report::{
    average_minutes_per_task, format_minutes, status_distribution, Report, ReportFilter,
    StatusSlice,
};

use serde::{Deserialize, Serialize};

use crate::member::WorkspaceMember;
use crate::project::Project;
use crate::task::{Task, TaskStatus};

/// Task counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    /// `round(100 * completed / total)`, 0 for no tasks
    pub completion_percent: u32,
}

/// Summed minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStats {
    pub time_spent: u64,
    pub time_estimate: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTime {
    pub project_id: String,
    pub name: String,
    pub color: String,
    /// Minutes
    pub time_spent: u64,
    /// Hours, one decimal
    pub hours: f64,
    /// Share of all project time, 0..=100
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberTime {
    pub member_id: String,
    /// Falls back to the id for assignees outside the member list
    pub name: String,
    pub color: String,
    pub time_spent: u64,
}

/// `round(100 * part / whole)`, 0 when `whole` is 0.
pub(crate) fn rounded_percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * part as f64 / whole as f64).round() as u32
}

/// Minutes to hours, rounded to one decimal.
pub fn minutes_to_hours(minutes: u64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

/// Tasks whose `assigned_to` contains `user_id`.
pub fn user_tasks<'a>(tasks: &'a [Task], user_id: &str) -> Vec<&'a Task> {
    tasks.iter().filter(|t| t.is_assigned_to(user_id)).collect()
}

pub fn completion_stats<'a, I>(tasks: I) -> CompletionStats
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut stats = CompletionStats::default();
    for task in tasks {
        stats.total += 1;
        match task.status {
            TaskStatus::Todo => stats.todo += 1,
            TaskStatus::InProgress => stats.in_progress += 1,
            TaskStatus::Completed => stats.completed += 1,
        }
    }
    stats.completion_percent = rounded_percent(stats.completed, stats.total);
    stats
}

pub fn time_stats<'a, I>(tasks: I) -> TimeStats
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks.into_iter().fold(TimeStats::default(), |mut acc, t| {
        acc.time_spent += u64::from(t.time_spent);
        acc.time_estimate += u64::from(t.time_estimate);
        acc
    })
}

/// Minutes per project, largest first. Every project appears, including
/// those with no time; tasks of unknown projects are ignored.
pub fn project_time_distribution<'a, I>(tasks: I, projects: &[Project]) -> Vec<ProjectTime>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut totals = vec![0u64; projects.len()];
    for task in tasks {
        if let Some(idx) = projects.iter().position(|p| p.id == task.project_id) {
            totals[idx] += u64::from(task.time_spent);
        }
    }
    let grand_total: u64 = totals.iter().sum();

    let mut rows: Vec<ProjectTime> = projects
        .iter()
        .zip(totals)
        .map(|(project, time_spent)| ProjectTime {
            project_id: project.id.clone(),
            name: project.name.clone(),
            color: project.color.clone(),
            time_spent,
            hours: minutes_to_hours(time_spent),
            percent: if grand_total == 0 {
                0.0
            } else {
                100.0 * time_spent as f64 / grand_total as f64
            },
        })
        .collect();
    rows.sort_by(|a, b| b.time_spent.cmp(&a.time_spent));
    rows
}

/// Minutes per assignee, largest first, members with no time dropped.
///
/// A task's full `time_spent` counts toward every one of its assignees.
pub fn member_time_distribution<'a, I>(tasks: I, members: &[WorkspaceMember]) -> Vec<MemberTime>
where
    I: IntoIterator<Item = &'a Task>,
{
    // First-appearance order keeps ties stable.
    let mut totals: Vec<(&str, u64)> = Vec::new();
    for task in tasks {
        for (pos, id) in task.assigned_to.iter().enumerate() {
            // assigned_to is a set for this purpose
            if task.assigned_to[..pos].contains(id) {
                continue;
            }
            match totals.iter_mut().find(|(seen, _)| *seen == id.as_str()) {
                Some((_, total)) => *total += u64::from(task.time_spent),
                None => totals.push((id.as_str(), u64::from(task.time_spent))),
            }
        }
    }

    let mut rows: Vec<MemberTime> = totals
        .into_iter()
        .filter(|(_, total)| *total > 0)
        .map(|(id, time_spent)| MemberTime {
            member_id: id.to_string(),
            name: members
                .iter()
                .find(|m| m.id == id)
                .map_or_else(|| id.to_string(), |m| m.name.clone()),
            color: member_color(id),
            time_spent,
        })
        .collect();
    rows.sort_by(|a, b| b.time_spent.cmp(&a.time_spent));
    rows
}

/// Stable display colour for a member id.
///
/// djb2 over the id bytes picks the hue; saturation and lightness are fixed.
pub fn member_color(id: &str) -> String {
    let hash = id
        .bytes()
        .fold(5381u32, |h, b| h.wrapping_mul(33).wrapping_add(u32::from(b)));
    format!("hsl({}, 65%, 55%)", hash % 360)
}
