//! SQLite-based storage for tasks, projects, workspace members and accounts.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{data_dir, migrations, DB_FILE};
use crate::error::{CoreError, DatabaseError, Result};
use crate::member::{MemberRole, NewMember, WorkspaceMember};
use crate::project::{NewProject, Project, ProjectPatch};
use crate::store::WorkspaceBackend;
use crate::task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};

const DATE_FORMAT: &str = "%Y-%m-%d";

// === Helper Functions ===

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

/// Parse a `YYYY-MM-DD` column.
fn parse_date(column: usize, value: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| conversion_error(column, e))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse an RFC 3339 column, falling back to now for legacy rows.
fn parse_datetime_fallback(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Unknown status strings read as `todo`.
fn parse_task_status(value: &str) -> TaskStatus {
    value.parse().unwrap_or_default()
}

fn parse_task_priority(value: &str) -> TaskPriority {
    match value {
        "low" => TaskPriority::Low,
        "high" => TaskPriority::High,
        _ => TaskPriority::Medium,
    }
}

fn parse_member_role(value: &str) -> MemberRole {
    value.parse().unwrap_or_default()
}

fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let due_date: String = row.get(7)?;
    let created_at: String = row.get(10)?;
    let priority: String = row.get(5)?;
    let status: String = row.get(6)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        project_id: row.get(3)?,
        user_id: row.get(4)?,
        assigned_to: Vec::new(),
        priority: parse_task_priority(&priority),
        status: parse_task_status(&status),
        due_date: parse_date(7, &due_date)?,
        time_estimate: row.get(8)?,
        time_spent: row.get(9)?,
        created_at: parse_date(10, &created_at)?,
    })
}

const TASK_COLUMNS: &str = "id, title, description, project_id, user_id, priority, status,
     due_date, time_estimate, time_spent, created_at";

fn row_to_project(row: &rusqlite::Row) -> Result<Project, rusqlite::Error> {
    let start_date: String = row.get(4)?;
    let end_date: String = row.get(5)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        start_date: parse_date(4, &start_date)?,
        end_date: parse_date(5, &end_date)?,
        created_by: row.get(6)?,
        members: Vec::new(),
    })
}

const PROJECT_COLUMNS: &str = "id, name, description, color, start_date, end_date, created_by";

fn row_to_member(row: &rusqlite::Row) -> Result<WorkspaceMember, rusqlite::Error> {
    let role: String = row.get(3)?;
    let joined_at: String = row.get(4)?;
    Ok(WorkspaceMember {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_member_role(&role),
        joined_at: parse_datetime_fallback(&joined_at),
        avatar_url: row.get(5)?,
    })
}

const MEMBER_COLUMNS: &str = "user_id, name, email, role, joined_at, avatar_url";

/// A local account row. `password_hash` is a PHC string, opaque to the
/// database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub workspace_id: String,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

fn row_to_user(row: &rusqlite::Row) -> Result<UserRecord, rusqlite::Error> {
    let role: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(UserRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        workspace_id: row.get(4)?,
        role: parse_member_role(&role),
        created_at: parse_datetime_fallback(&created_at),
    })
}

const USER_COLUMNS: &str = "id, name, email, password_hash, workspace_id, role, created_at";

/// SQLite store for workspace data.
pub struct WorkspaceDb {
    conn: Connection,
}

impl WorkspaceDb {
    /// Open the workspace database at `<data_dir>/timetrek.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_path(&data_dir()?.join(DB_FILE))
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    fn set_task_assignees(&self, task_id: &str, user_ids: &[String]) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM task_assignees WHERE task_id = ?1", params![task_id])?;
        for (index, user_id) in user_ids.iter().enumerate() {
            self.conn.execute(
                "INSERT OR IGNORE INTO task_assignees (task_id, user_id, order_index)
                 VALUES (?1, ?2, ?3)",
                params![task_id, user_id, index as i64],
            )?;
        }
        Ok(())
    }

    fn load_task_assignees(&self, task_id: &str) -> Result<Vec<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM task_assignees WHERE task_id = ?1 ORDER BY order_index ASC",
        )?;
        let mut rows = stmt.query(params![task_id])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(row.get(0)?);
        }
        Ok(values)
    }

    fn set_project_members(
        &self,
        project_id: &str,
        user_ids: &[String],
    ) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "DELETE FROM project_members WHERE project_id = ?1",
            params![project_id],
        )?;
        for (index, user_id) in user_ids.iter().enumerate() {
            self.conn.execute(
                "INSERT OR IGNORE INTO project_members (project_id, user_id, order_index)
                 VALUES (?1, ?2, ?3)",
                params![project_id, user_id, index as i64],
            )?;
        }
        Ok(())
    }

    fn load_project_members(&self, project_id: &str) -> Result<Vec<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM project_members WHERE project_id = ?1 ORDER BY order_index ASC",
        )?;
        let mut rows = stmt.query(params![project_id])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(row.get(0)?);
        }
        Ok(values)
    }

    // === Task rows ===

    fn insert_task_row(&self, task: &Task) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO tasks (id, title, description, project_id, user_id, priority, status,
                                due_date, time_estimate, time_spent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.id,
                task.title,
                task.description,
                task.project_id,
                task.user_id,
                task.priority.as_str(),
                task.status.as_str(),
                format_date(task.due_date),
                task.time_estimate,
                task.time_spent,
                format_date(task.created_at),
            ],
        )?;
        self.set_task_assignees(&task.id, &task.assigned_to)
    }

    /// `created_at` is never rewritten.
    fn write_task_row(&self, task: &Task) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE tasks SET title = ?2, description = ?3, project_id = ?4, user_id = ?5,
                    priority = ?6, status = ?7, due_date = ?8, time_estimate = ?9,
                    time_spent = ?10
             WHERE id = ?1",
            params![
                task.id,
                task.title,
                task.description,
                task.project_id,
                task.user_id,
                task.priority.as_str(),
                task.status.as_str(),
                format_date(task.due_date),
                task.time_estimate,
                task.time_spent,
            ],
        )?;
        self.set_task_assignees(&task.id, &task.assigned_to)
    }

    /// Get a task by ID.
    pub fn get_task(&self, id: &str) -> Result<Option<Task>, rusqlite::Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let task = self
            .conn
            .query_row(&sql, params![id], row_to_task)
            .optional()?;
        match task {
            Some(mut task) => {
                task.assigned_to = self.load_task_assignees(&task.id)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    fn select_tasks(&self) -> Result<Vec<Task>, rusqlite::Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at ASC, rowid ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut tasks = stmt
            .query_map([], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        for task in &mut tasks {
            task.assigned_to = self.load_task_assignees(&task.id)?;
        }
        Ok(tasks)
    }

    fn delete_task_rows(&self, id: &str) -> Result<usize, rusqlite::Error> {
        self.conn
            .execute("DELETE FROM task_assignees WHERE task_id = ?1", params![id])?;
        self.conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])
    }

    // === Project rows ===

    fn insert_project_row(&self, project: &Project) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO projects (id, name, description, color, start_date, end_date, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                project.id,
                project.name,
                project.description,
                project.color,
                format_date(project.start_date),
                format_date(project.end_date),
                project.created_by,
            ],
        )?;
        self.set_project_members(&project.id, &project.members)
    }

    fn write_project_row(&self, project: &Project) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "UPDATE projects SET name = ?2, description = ?3, color = ?4, start_date = ?5,
                    end_date = ?6
             WHERE id = ?1",
            params![
                project.id,
                project.name,
                project.description,
                project.color,
                format_date(project.start_date),
                format_date(project.end_date),
            ],
        )?;
        self.set_project_members(&project.id, &project.members)
    }

    /// Get a project by ID.
    pub fn get_project(&self, id: &str) -> Result<Option<Project>, rusqlite::Error> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
        let project = self
            .conn
            .query_row(&sql, params![id], row_to_project)
            .optional()?;
        match project {
            Some(mut project) => {
                project.members = self.load_project_members(&project.id)?;
                Ok(Some(project))
            }
            None => Ok(None),
        }
    }

    fn select_projects(&self) -> Result<Vec<Project>, rusqlite::Error> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY rowid ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut projects = stmt
            .query_map([], row_to_project)?
            .collect::<Result<Vec<_>, _>>()?;
        for project in &mut projects {
            project.members = self.load_project_members(&project.id)?;
        }
        Ok(projects)
    }

    /// Delete a project and its tasks in a single transaction.
    ///
    /// Returns the ids of the deleted tasks; `None` if the project does not exist.
    pub fn delete_project_with_tasks_transactional(
        &self,
        project_id: &str,
    ) -> Result<Option<Vec<String>>, rusqlite::Error> {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let result: Result<Option<Vec<String>>, rusqlite::Error> = (|| {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM tasks WHERE project_id = ?1")?;
            let task_ids = stmt
                .query_map(params![project_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            for task_id in &task_ids {
                self.delete_task_rows(task_id)?;
            }
            self.conn.execute(
                "DELETE FROM project_members WHERE project_id = ?1",
                params![project_id],
            )?;
            let deleted = self
                .conn
                .execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
            Ok((deleted > 0).then_some(task_ids))
        })();
        match result {
            Ok(Some(task_ids)) => {
                self.conn.execute_batch("COMMIT;")?;
                Ok(Some(task_ids))
            }
            Ok(None) => {
                self.conn.execute_batch("ROLLBACK;")?;
                Ok(None)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    // === Member rows ===

    fn get_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMember>, rusqlite::Error> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM workspace_members WHERE workspace_id = ?1 AND user_id = ?2"
        );
        self.conn
            .query_row(&sql, params![workspace_id, user_id], row_to_member)
            .optional()
    }

    // === Users ===

    /// Insert a local account and its workspace membership in one transaction.
    pub fn insert_user(&self, user: &UserRecord) -> Result<(), rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                user.id,
                user.name,
                user.email,
                user.password_hash,
                user.workspace_id,
                user.role.as_str(),
                user.created_at.to_rfc3339(),
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO workspace_members
                 (workspace_id, user_id, name, email, role, joined_at, avatar_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
            params![
                user.workspace_id,
                user.id,
                user.name,
                user.email,
                user.role.as_str(),
                user.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>, rusqlite::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        self.conn.query_row(&sql, params![id], row_to_user).optional()
    }

    /// Emails compare case-insensitively.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, rusqlite::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?1)");
        self.conn
            .query_row(&sql, params![email.trim()], row_to_user)
            .optional()
    }

    pub fn count_workspace_users(&self, workspace_id: &str) -> Result<u64, rusqlite::Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

impl WorkspaceBackend for WorkspaceDb {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.select_tasks()?)
    }

    fn create_task(&self, new: &NewTask) -> Result<Task> {
        new.validate()?;
        let task = new
            .clone()
            .into_task(Uuid::new_v4().to_string(), Utc::now().date_naive());
        self.insert_task_row(&task)?;
        debug!(task_id = %task.id, project_id = %task.project_id, "task created");
        Ok(task)
    }

    fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let mut task = self
            .get_task(id)?
            .ok_or_else(|| CoreError::not_found("Task", id))?;
        patch.apply(&mut task);
        self.write_task_row(&task)?;
        Ok(task)
    }

    fn delete_task(&self, id: &str) -> Result<()> {
        if self.delete_task_rows(id)? == 0 {
            return Err(CoreError::not_found("Task", id));
        }
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.select_projects()?)
    }

    fn create_project(&self, new: &NewProject) -> Result<Project> {
        new.validate()?;
        let project = new.clone().into_project(Uuid::new_v4().to_string());
        self.insert_project_row(&project)?;
        debug!(project_id = %project.id, "project created");
        Ok(project)
    }

    fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project> {
        let mut project = self
            .get_project(id)?
            .ok_or_else(|| CoreError::not_found("Project", id))?;
        patch.apply(&mut project);
        project.validate()?;
        self.write_project_row(&project)?;
        Ok(project)
    }

    fn delete_project(&self, id: &str) -> Result<Vec<String>> {
        let task_ids = self
            .delete_project_with_tasks_transactional(id)?
            .ok_or_else(|| CoreError::not_found("Project", id))?;
        info!(project_id = id, tasks = task_ids.len(), "project deleted");
        Ok(task_ids)
    }

    fn list_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM workspace_members
             WHERE workspace_id = ?1 ORDER BY joined_at ASC, rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let members = stmt
            .query_map(params![workspace_id], row_to_member)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Adding an existing member replaces the row.
    fn add_member(&self, workspace_id: &str, new: &NewMember) -> Result<WorkspaceMember> {
        new.validate()?;
        let member = WorkspaceMember {
            id: new.user_id.clone(),
            name: new.name.clone(),
            email: new.email.clone(),
            role: new.role,
            joined_at: Utc::now(),
            avatar_url: new.avatar_url.clone(),
        };
        self.conn.execute(
            "INSERT OR REPLACE INTO workspace_members
                 (workspace_id, user_id, name, email, role, joined_at, avatar_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                workspace_id,
                member.id,
                member.name,
                member.email,
                member.role.as_str(),
                member.joined_at.to_rfc3339(),
                member.avatar_url,
            ],
        )?;
        Ok(member)
    }

    fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> Result<WorkspaceMember> {
        let updated = self.conn.execute(
            "UPDATE workspace_members SET role = ?3 WHERE workspace_id = ?1 AND user_id = ?2",
            params![workspace_id, user_id, role.as_str()],
        )?;
        if updated == 0 {
            return Err(CoreError::not_found("Member", user_id));
        }
        self.conn.execute(
            "UPDATE users SET role = ?3 WHERE workspace_id = ?1 AND id = ?2",
            params![workspace_id, user_id, role.as_str()],
        )?;
        self.get_member(workspace_id, user_id)?
            .ok_or_else(|| CoreError::not_found("Member", user_id))
    }

    fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM workspace_members WHERE workspace_id = ?1 AND user_id = ?2",
            params![workspace_id, user_id],
        )?;
        if deleted == 0 {
            return Err(CoreError::not_found("Member", user_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_project(db: &WorkspaceDb, name: &str) -> Project {
        db.create_project(&NewProject {
            name: name.into(),
            description: "desc".into(),
            color: "#10b981".into(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 3, 31),
            created_by: "u1".into(),
            members: vec!["u1".into(), "u2".into()],
        })
        .unwrap()
    }

    fn make_task(db: &WorkspaceDb, title: &str, project_id: &str) -> Task {
        db.create_task(&NewTask {
            title: title.into(),
            description: String::new(),
            project_id: project_id.into(),
            user_id: "u1".into(),
            assigned_to: vec!["u2".into(), "u1".into()],
            priority: TaskPriority::High,
            status: TaskStatus::InProgress,
            due_date: date(2024, 2, 14),
            time_estimate: 90,
            time_spent: 15,
        })
        .unwrap()
    }

    #[test]
    fn create_and_get_task() {
        let db = WorkspaceDb::open_memory().unwrap();
        let project = make_project(&db, "P");
        let task = make_task(&db, "Write report", &project.id);

        let retrieved = db.get_task(&task.id).unwrap().unwrap();
        assert_eq!(retrieved, task);
        assert_eq!(retrieved.assigned_to, vec!["u2", "u1"]);
        assert_eq!(retrieved.priority, TaskPriority::High);
        assert_eq!(retrieved.due_date, date(2024, 2, 14));
    }

    #[test]
    fn create_rejects_invalid_task() {
        let db = WorkspaceDb::open_memory().unwrap();
        let err = db
            .create_task(&NewTask {
                title: "x".into(),
                description: String::new(),
                project_id: String::new(),
                user_id: "u1".into(),
                assigned_to: vec![],
                priority: TaskPriority::Low,
                status: TaskStatus::Todo,
                due_date: date(2024, 1, 1),
                time_estimate: 0,
                time_spent: 0,
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(db.list_tasks().unwrap().is_empty());
    }

    #[test]
    fn update_task_applies_patch_only() {
        let db = WorkspaceDb::open_memory().unwrap();
        let project = make_project(&db, "P");
        let task = make_task(&db, "Write report", &project.id);

        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            assigned_to: Some(vec!["u3".into()]),
            ..TaskPatch::default()
        };
        let updated = db.update_task(&task.id, &patch).unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.title, "Write report");
        assert_eq!(updated.created_at, task.created_at);
        assert_eq!(db.get_task(&task.id).unwrap().unwrap(), updated);
    }

    #[test]
    fn update_and_delete_missing_task_are_not_found() {
        let db = WorkspaceDb::open_memory().unwrap();
        assert!(matches!(
            db.update_task("missing", &TaskPatch::default()),
            Err(CoreError::NotFound { entity: "Task", .. })
        ));
        assert!(matches!(
            db.delete_task("missing"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_task_removes_assignees() {
        let db = WorkspaceDb::open_memory().unwrap();
        let project = make_project(&db, "P");
        let task = make_task(&db, "a", &project.id);
        db.delete_task(&task.id).unwrap();
        assert!(db.get_task(&task.id).unwrap().is_none());
        let orphans: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM task_assignees", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn project_round_trip_keeps_member_order() {
        let db = WorkspaceDb::open_memory().unwrap();
        let project = make_project(&db, "P");
        assert_eq!(db.get_project(&project.id).unwrap().unwrap(), project);

        let patch = ProjectPatch {
            members: Some(vec!["u9".into(), "u1".into()]),
            name: Some("Renamed".into()),
            ..ProjectPatch::default()
        };
        let updated = db.update_project(&project.id, &patch).unwrap();
        assert_eq!(updated.members, vec!["u9", "u1"]);
        assert_eq!(db.list_projects().unwrap(), vec![updated]);
    }

    #[test]
    fn update_project_rejects_inverted_dates() {
        let db = WorkspaceDb::open_memory().unwrap();
        let project = make_project(&db, "P");
        let err = db
            .update_project(
                &project.id,
                &ProjectPatch {
                    start_date: Some(date(2024, 6, 1)),
                    ..ProjectPatch::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(db.get_project(&project.id).unwrap().unwrap(), project);
    }

    #[test]
    fn delete_project_removes_exactly_its_tasks() {
        let db = WorkspaceDb::open_memory().unwrap();
        let keep = make_project(&db, "Keep");
        let drop = make_project(&db, "Drop");
        let kept = make_task(&db, "k", &keep.id);
        let gone = make_task(&db, "g", &drop.id);

        let deleted = db.delete_project(&drop.id).unwrap();
        assert_eq!(deleted, vec![gone.id.clone()]);
        assert_eq!(db.list_tasks().unwrap(), vec![kept]);
        assert_eq!(db.list_projects().unwrap(), vec![keep]);
        assert!(db.get_task(&gone.id).unwrap().is_none());
    }

    #[test]
    fn delete_missing_project_leaves_tasks_alone() {
        let db = WorkspaceDb::open_memory().unwrap();
        let project = make_project(&db, "P");
        make_task(&db, "a", &project.id);
        assert!(matches!(
            db.delete_project("missing"),
            Err(CoreError::NotFound { entity: "Project", .. })
        ));
        assert_eq!(db.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn member_crud_is_scoped_by_workspace() {
        let db = WorkspaceDb::open_memory().unwrap();
        let new = NewMember {
            user_id: "u2".into(),
            name: "Bo".into(),
            email: "bo@example.com".into(),
            role: MemberRole::Member,
            avatar_url: Some("https://img.example/bo.png".into()),
        };
        db.add_member("ws1", &new).unwrap();
        assert!(db.list_members("ws2").unwrap().is_empty());

        let updated = db
            .update_member_role("ws1", "u2", MemberRole::Manager)
            .unwrap();
        assert_eq!(updated.role, MemberRole::Manager);
        assert_eq!(updated.avatar_url.as_deref(), Some("https://img.example/bo.png"));

        assert!(db.update_member_role("ws2", "u2", MemberRole::Member).is_err());
        db.remove_member("ws1", "u2").unwrap();
        assert!(db.list_members("ws1").unwrap().is_empty());
        assert!(db.remove_member("ws1", "u2").is_err());
    }

    #[test]
    fn insert_user_adds_membership() {
        let db = WorkspaceDb::open_memory().unwrap();
        let user = UserRecord {
            id: "u1".into(),
            name: "Ada".into(),
            email: "Ada@Example.com".into(),
            password_hash: "h".into(),
            workspace_id: "ws".into(),
            role: MemberRole::Manager,
            created_at: Utc::now(),
        };
        db.insert_user(&user).unwrap();

        assert_eq!(
            db.find_user_by_email("ada@example.com").unwrap().unwrap().id,
            "u1"
        );
        assert_eq!(db.count_workspace_users("ws").unwrap(), 1);
        let members = db.list_members("ws").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, MemberRole::Manager);

        let mut duplicate = user.clone();
        duplicate.id = "u2".into();
        assert!(db.insert_user(&duplicate).is_err());
    }
}
