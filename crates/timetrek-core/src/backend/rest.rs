//! RestBackend: async client for the hosted PostgREST-style backend.
//!
//! Tables live under `/rest/v1/<table>`. Every request carries the `apikey`
//! header and a bearer token; filters use the `column=eq.value` form and
//! writes ask for `Prefer: return=representation` so the saved row comes back.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::{BackendError, CoreError, Result};
use crate::member::{MemberRole, NewMember, WorkspaceMember};
use crate::project::{NewProject, Project, ProjectPatch};
use crate::storage::BackendConfig;
use crate::task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};

/// Task row as the hosted schema names its columns.
#[derive(Debug, Clone, Deserialize)]
struct TaskRow {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    projectid: Option<String>,
    userid: String,
    #[serde(default)]
    assignedto: Vec<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    duedate: Option<String>,
    #[serde(default)]
    timeestimate: u32,
    #[serde(default)]
    timespent: u32,
    createdat: String,
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_row_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

impl TaskRow {
    fn into_task(self) -> Result<Task> {
        let created_at = parse_row_date(&self.createdat).ok_or_else(|| {
            BackendError::MissingRow(format!("task {} has unreadable createdat", self.id))
        })?;
        // Rows without a due date fall on their creation day.
        let due_date = self
            .duedate
            .as_deref()
            .and_then(parse_row_date)
            .unwrap_or(created_at);
        let priority = match self.priority.as_deref() {
            Some("low") => TaskPriority::Low,
            Some("high") => TaskPriority::High,
            _ => TaskPriority::Medium,
        };
        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            project_id: self.projectid.unwrap_or_default(),
            user_id: self.userid,
            assigned_to: self.assignedto,
            priority,
            status: self
                .status
                .as_deref()
                .and_then(|s| s.parse::<TaskStatus>().ok())
                .unwrap_or_default(),
            due_date,
            time_estimate: self.timeestimate,
            time_spent: self.timespent,
            created_at,
        })
    }
}

/// Writable task columns. `None` columns are left out of the body.
#[derive(Debug, Default, Serialize)]
struct TaskColumns<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projectid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    userid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignedto: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duedate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeestimate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timespent: Option<u32>,
}

impl<'a> From<&'a NewTask> for TaskColumns<'a> {
    fn from(new: &'a NewTask) -> Self {
        Self {
            title: Some(&new.title),
            description: Some(&new.description),
            projectid: Some(&new.project_id),
            userid: Some(&new.user_id),
            assignedto: Some(&new.assigned_to),
            priority: Some(new.priority.as_str()),
            status: Some(new.status.as_str()),
            duedate: Some(new.due_date.to_string()),
            timeestimate: Some(new.time_estimate),
            timespent: Some(new.time_spent),
        }
    }
}

impl<'a> From<&'a TaskPatch> for TaskColumns<'a> {
    fn from(patch: &'a TaskPatch) -> Self {
        Self {
            title: patch.title.as_deref(),
            description: patch.description.as_deref(),
            projectid: patch.project_id.as_deref(),
            userid: None,
            assignedto: patch.assigned_to.as_deref(),
            priority: patch.priority.map(TaskPriority::as_str),
            status: patch.status.map(TaskStatus::as_str),
            duedate: patch.due_date.map(|d| d.to_string()),
            timeestimate: patch.time_estimate,
            timespent: patch.time_spent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectRow {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    color: String,
    startdate: String,
    enddate: String,
    createdby: String,
    #[serde(default)]
    members: Vec<String>,
}

impl ProjectRow {
    fn into_project(self) -> Result<Project> {
        let unreadable =
            |col: &str| BackendError::MissingRow(format!("project {} has unreadable {col}", self.id));
        let start_date = parse_row_date(&self.startdate).ok_or_else(|| unreadable("startdate"))?;
        let end_date = parse_row_date(&self.enddate).ok_or_else(|| unreadable("enddate"))?;
        Ok(Project {
            id: self.id,
            name: self.name,
            description: self.description.unwrap_or_default(),
            color: self.color,
            start_date,
            end_date,
            created_by: self.createdby,
            members: self.members,
        })
    }
}

#[derive(Debug, Default, Serialize)]
struct ProjectColumns<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    startdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enddate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    createdby: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<&'a [String]>,
}

impl<'a> From<&'a NewProject> for ProjectColumns<'a> {
    fn from(new: &'a NewProject) -> Self {
        Self {
            name: Some(&new.name),
            description: Some(&new.description),
            color: Some(&new.color),
            startdate: Some(new.start_date.to_string()),
            enddate: Some(new.end_date.to_string()),
            createdby: Some(&new.created_by),
            members: Some(&new.members),
        }
    }
}

impl<'a> From<&'a ProjectPatch> for ProjectColumns<'a> {
    fn from(patch: &'a ProjectPatch) -> Self {
        Self {
            name: patch.name.as_deref(),
            description: patch.description.as_deref(),
            color: patch.color.as_deref(),
            startdate: patch.start_date.map(|d| d.to_string()),
            enddate: patch.end_date.map(|d| d.to_string()),
            createdby: None,
            members: patch.members.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MemberRow {
    user_id: String,
    name: String,
    email: String,
    #[serde(default)]
    role: Option<String>,
    joined_at: DateTime<Utc>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<MemberRow> for WorkspaceMember {
    fn from(row: MemberRow) -> Self {
        WorkspaceMember {
            id: row.user_id,
            name: row.name,
            email: row.email,
            role: row
                .role
                .as_deref()
                .and_then(|r| r.parse().ok())
                .unwrap_or_default(),
            joined_at: row.joined_at,
            avatar_url: row.avatar_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// Client for the hosted backend.
pub struct RestBackend {
    base: Url,
    api_key: String,
    http_client: Client,
}

impl RestBackend {
    /// Create a client for `base_url` (the project root, without `/rest/v1`).
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let mut root = base_url.trim_end_matches('/').to_string();
        root.push('/');
        let base = Url::parse(&root).map_err(BackendError::from)?;
        Ok(Self {
            base,
            api_key: api_key.into(),
            http_client: Client::new(),
        })
    }

    /// Build from the `[backend]` config section.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|_| config.is_configured())
            .ok_or(BackendError::NotConfigured)?;
        Self::new(url, config.api_key.clone().unwrap_or_default())
    }

    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder> {
        let url = self
            .base
            .join(&format!("rest/v1/{table}"))
            .map_err(BackendError::from)?;
        Ok(self
            .http_client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key))
    }

    /// Send and decode, turning non-success statuses into errors.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, table: &str) -> Result<T> {
        let resp = request.send().await.map_err(BackendError::from)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                path: table.to_string(),
                body,
            }
            .into());
        }
        let value = resp.json::<T>().await.map_err(BackendError::from)?;
        Ok(value)
    }

    async fn send_empty(&self, request: RequestBuilder, table: &str) -> Result<()> {
        let resp = request.send().await.map_err(BackendError::from)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                path: table.to_string(),
                body,
            }
            .into());
        }
        Ok(())
    }

    /// Write and expect exactly the saved row back.
    async fn write_one<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        table: &str,
        filter: &[(&str, String)],
        body: &B,
    ) -> Result<Option<T>> {
        let request = self
            .request(method, table)?
            .header("Prefer", "return=representation")
            .query(filter)
            .json(body);
        let rows: Vec<T> = self.send(request, table).await?;
        Ok(rows.into_iter().next())
    }

    // === Tasks ===

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let request = self.request(Method::GET, "tasks")?.query(&[("select", "*")]);
        let rows: Vec<TaskRow> = self.send(request, "tasks").await?;
        debug!(count = rows.len(), "fetched tasks");
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let request = self
            .request(Method::GET, "tasks")?
            .query(&[("select", "*".to_string()), ("id", eq(id))]);
        let rows: Vec<TaskRow> = self.send(request, "tasks").await?;
        rows.into_iter().next().map(TaskRow::into_task).transpose()
    }

    pub async fn create_task(&self, new: &NewTask) -> Result<Task> {
        new.validate()?;
        let row: Option<TaskRow> = self
            .write_one(Method::POST, "tasks", &[], &TaskColumns::from(new))
            .await?;
        row.ok_or_else(|| BackendError::MissingRow("tasks".into()))?
            .into_task()
    }

    pub async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let row: Option<TaskRow> = self
            .write_one(
                Method::PATCH,
                "tasks",
                &[("id", eq(id))],
                &TaskColumns::from(patch),
            )
            .await?;
        row.ok_or_else(|| CoreError::not_found("Task", id))?
            .into_task()
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, "tasks")?
            .query(&[("id", eq(id))]);
        self.send_empty(request, "tasks").await
    }

    /// Read the current total, add `minutes`, write it back. Not atomic: a
    /// concurrent writer between the two calls is overwritten.
    pub async fn add_time_to_task(&self, id: &str, minutes: u32) -> Result<Task> {
        let task = self
            .get_task(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Task", id))?;
        let patch = TaskPatch {
            time_spent: Some(task.time_spent.saturating_add(minutes)),
            ..TaskPatch::default()
        };
        self.update_task(id, &patch).await
    }

    // === Projects ===

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let request = self
            .request(Method::GET, "projects")?
            .query(&[("select", "*")]);
        let rows: Vec<ProjectRow> = self.send(request, "projects").await?;
        rows.into_iter().map(ProjectRow::into_project).collect()
    }

    pub async fn create_project(&self, new: &NewProject) -> Result<Project> {
        new.validate()?;
        let row: Option<ProjectRow> = self
            .write_one(Method::POST, "projects", &[], &ProjectColumns::from(new))
            .await?;
        row.ok_or_else(|| BackendError::MissingRow("projects".into()))?
            .into_project()
    }

    pub async fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project> {
        let row: Option<ProjectRow> = self
            .write_one(
                Method::PATCH,
                "projects",
                &[("id", eq(id))],
                &ProjectColumns::from(patch),
            )
            .await?;
        row.ok_or_else(|| CoreError::not_found("Project", id))?
            .into_project()
    }

    /// Delete the project's tasks, then the project. Two requests; a failure
    /// between them leaves the project without its tasks.
    ///
    /// Returns the ids of the deleted tasks.
    pub async fn delete_project(&self, id: &str) -> Result<Vec<String>> {
        let tasks = self
            .request(Method::DELETE, "tasks")?
            .header("Prefer", "return=representation")
            .query(&[("projectid", eq(id)), ("select", "id".to_string())]);
        let removed: Vec<IdRow> = self.send(tasks, "tasks").await?;
        let project = self
            .request(Method::DELETE, "projects")?
            .query(&[("id", eq(id))]);
        self.send_empty(project, "projects").await?;
        Ok(removed.into_iter().map(|row| row.id).collect())
    }

    // === Members ===

    pub async fn list_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
        let request = self
            .request(Method::GET, "workspace_members")?
            .query(&[("select", "*".to_string()), ("workspace_id", eq(workspace_id))]);
        let rows: Vec<MemberRow> = self.send(request, "workspace_members").await?;
        Ok(rows.into_iter().map(WorkspaceMember::from).collect())
    }

    pub async fn add_member(&self, workspace_id: &str, new: &NewMember) -> Result<WorkspaceMember> {
        new.validate()?;
        let body = json!({
            "workspace_id": workspace_id,
            "user_id": new.user_id,
            "name": new.name,
            "email": new.email,
            "role": new.role.as_str(),
            "avatar_url": new.avatar_url,
        });
        let row: Option<MemberRow> = self
            .write_one(Method::POST, "workspace_members", &[], &body)
            .await?;
        Ok(row
            .ok_or_else(|| BackendError::MissingRow("workspace_members".into()))?
            .into())
    }

    pub async fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> Result<WorkspaceMember> {
        let row: Option<MemberRow> = self
            .write_one(
                Method::PATCH,
                "workspace_members",
                &[("workspace_id", eq(workspace_id)), ("user_id", eq(user_id))],
                &json!({ "role": role.as_str() }),
            )
            .await?;
        Ok(row
            .ok_or_else(|| CoreError::not_found("Member", user_id))?
            .into())
    }

    pub async fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, "workspace_members")?
            .query(&[("workspace_id", eq(workspace_id)), ("user_id", eq(user_id))]);
        self.send_empty(request, "workspace_members").await
    }
}
