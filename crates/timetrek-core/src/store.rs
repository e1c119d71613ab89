//! Collection store: the in-memory workspace snapshot and its backend.
//!
//! [`WorkspaceStore`] holds the tasks, projects and members of one workspace
//! and writes every mutation through a [`WorkspaceBackend`]. Updates and
//! deletes are optimistic: the local snapshot changes first, and if the
//! backend call fails the change is kept and the id is recorded in
//! [`WorkspaceStore::unsynced`]. Creates wait for the backend, which assigns
//! ids and timestamps.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::member::{MemberRole, NewMember, Profile, WorkspaceMember};
use crate::project::{NewProject, Project, ProjectPatch};
use crate::task::{NewTask, Task, TaskPatch};
use crate::timer::TimeLedger;

/// Persisted store for one or more workspaces.
///
/// Creates return the persisted row with its assigned id and timestamps.
/// Updates take a partial field set and return the full row.
pub trait WorkspaceBackend {
    fn list_tasks(&self) -> Result<Vec<Task>>;
    fn create_task(&self, new: &NewTask) -> Result<Task>;
    fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task>;
    fn delete_task(&self, id: &str) -> Result<()>;

    fn list_projects(&self) -> Result<Vec<Project>>;
    fn create_project(&self, new: &NewProject) -> Result<Project>;
    fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project>;
    /// Delete the project and every task whose `project_id` equals it.
    /// Returns the ids of the deleted tasks.
    fn delete_project(&self, id: &str) -> Result<Vec<String>>;

    fn list_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>>;
    fn add_member(&self, workspace_id: &str, new: &NewMember) -> Result<WorkspaceMember>;
    fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> Result<WorkspaceMember>;
    fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<()>;
}

impl<B: WorkspaceBackend + ?Sized> WorkspaceBackend for &B {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        (**self).list_tasks()
    }
    fn create_task(&self, new: &NewTask) -> Result<Task> {
        (**self).create_task(new)
    }
    fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        (**self).update_task(id, patch)
    }
    fn delete_task(&self, id: &str) -> Result<()> {
        (**self).delete_task(id)
    }
    fn list_projects(&self) -> Result<Vec<Project>> {
        (**self).list_projects()
    }
    fn create_project(&self, new: &NewProject) -> Result<Project> {
        (**self).create_project(new)
    }
    fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project> {
        (**self).update_project(id, patch)
    }
    fn delete_project(&self, id: &str) -> Result<Vec<String>> {
        (**self).delete_project(id)
    }
    fn list_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
        (**self).list_members(workspace_id)
    }
    fn add_member(&self, workspace_id: &str, new: &NewMember) -> Result<WorkspaceMember> {
        (**self).add_member(workspace_id, new)
    }
    fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> Result<WorkspaceMember> {
        (**self).update_member_role(workspace_id, user_id, role)
    }
    fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
        (**self).remove_member(workspace_id, user_id)
    }
}

impl<B: WorkspaceBackend + ?Sized> WorkspaceBackend for Box<B> {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        (**self).list_tasks()
    }
    fn create_task(&self, new: &NewTask) -> Result<Task> {
        (**self).create_task(new)
    }
    fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        (**self).update_task(id, patch)
    }
    fn delete_task(&self, id: &str) -> Result<()> {
        (**self).delete_task(id)
    }
    fn list_projects(&self) -> Result<Vec<Project>> {
        (**self).list_projects()
    }
    fn create_project(&self, new: &NewProject) -> Result<Project> {
        (**self).create_project(new)
    }
    fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project> {
        (**self).update_project(id, patch)
    }
    fn delete_project(&self, id: &str) -> Result<Vec<String>> {
        (**self).delete_project(id)
    }
    fn list_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
        (**self).list_members(workspace_id)
    }
    fn add_member(&self, workspace_id: &str, new: &NewMember) -> Result<WorkspaceMember> {
        (**self).add_member(workspace_id, new)
    }
    fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> Result<WorkspaceMember> {
        (**self).update_member_role(workspace_id, user_id, role)
    }
    fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
        (**self).remove_member(workspace_id, user_id)
    }
}

pub struct WorkspaceStore<B: WorkspaceBackend> {
    backend: B,
    workspace_id: String,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    members: Vec<WorkspaceMember>,
    unsynced: BTreeSet<String>,
}

impl<B: WorkspaceBackend> WorkspaceStore<B> {
    /// Load a snapshot of `workspace_id` from `backend`.
    pub fn load(backend: B, workspace_id: impl Into<String>) -> Result<Self> {
        let mut store = Self {
            backend,
            workspace_id: workspace_id.into(),
            tasks: Vec::new(),
            projects: Vec::new(),
            members: Vec::new(),
            unsynced: BTreeSet::new(),
        };
        store.refresh()?;
        Ok(store)
    }

    /// Replace the snapshot with the backend's current rows.
    /// Pending unsynced marks are dropped.
    pub fn refresh(&mut self) -> Result<()> {
        self.tasks = self.backend.list_tasks()?;
        self.projects = self.backend.list_projects()?;
        self.members = self.backend.list_members(&self.workspace_id)?;
        self.unsynced.clear();
        debug!(
            tasks = self.tasks.len(),
            projects = self.projects.len(),
            members = self.members.len(),
            "workspace snapshot loaded"
        );
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn members(&self) -> &[WorkspaceMember] {
        &self.members
    }

    /// Ids of entities whose local change the backend rejected.
    pub fn unsynced(&self) -> &BTreeSet<String> {
        &self.unsynced
    }

    pub fn get_task_by_id(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_project_by_id(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn get_user_tasks(&self, user_id: &str) -> Vec<&Task> {
        crate::stats::user_tasks(&self.tasks, user_id)
    }

    pub fn get_project_tasks(&self, project_id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.project_id == project_id)
            .collect()
    }

    /// Membership role wins over the profile's cached role.
    pub fn is_manager(&self, profile: &Profile) -> bool {
        self.members
            .iter()
            .find(|m| m.id == profile.id)
            .map_or(profile.is_manager(), |m| m.role == MemberRole::Manager)
    }

    fn mark_unsynced(&mut self, id: &str, err: &CoreError) {
        warn!(id, error = %err, "backend rejected change, keeping local copy");
        self.unsynced.insert(id.to_string());
    }

    // === Tasks ===

    pub fn add_task(&mut self, new: NewTask) -> Result<Task> {
        new.validate()?;
        let task = self.backend.create_task(&new)?;
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Apply `patch` locally, then persist it.
    pub fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<Task> {
        let local = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CoreError::not_found("Task", id))?;
        patch.apply(local);

        match self.backend.update_task(id, patch) {
            Ok(saved) => {
                *local = saved.clone();
                Ok(saved)
            }
            Err(e) => {
                self.mark_unsynced(id, &e);
                Err(e)
            }
        }
    }

    pub fn delete_task(&mut self, id: &str) -> Result<()> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Err(CoreError::not_found("Task", id));
        }
        self.backend.delete_task(id).map_err(|e| {
            self.mark_unsynced(id, &e);
            e
        })
    }

    // === Projects ===

    pub fn add_project(&mut self, new: NewProject) -> Result<Project> {
        new.validate()?;
        let project = self.backend.create_project(&new)?;
        self.projects.push(project.clone());
        Ok(project)
    }

    /// The patched project must still be valid; an invalid patch changes
    /// nothing locally or in the backend.
    pub fn update_project(&mut self, id: &str, patch: &ProjectPatch) -> Result<Project> {
        let local = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::not_found("Project", id))?;
        let mut patched = local.clone();
        patch.apply(&mut patched);
        patched.validate()?;
        *local = patched;

        match self.backend.update_project(id, patch) {
            Ok(saved) => {
                *local = saved.clone();
                Ok(saved)
            }
            Err(e) => {
                self.mark_unsynced(id, &e);
                Err(e)
            }
        }
    }

    /// Delete the project and its tasks. Returns the deleted task ids.
    pub fn delete_project(&mut self, id: &str) -> Result<Vec<String>> {
        if self.get_project_by_id(id).is_none() {
            return Err(CoreError::not_found("Project", id));
        }
        self.projects.retain(|p| p.id != id);
        let removed: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.project_id == id)
            .map(|t| t.id.clone())
            .collect();
        self.tasks.retain(|t| t.project_id != id);

        match self.backend.delete_project(id) {
            Ok(_) => Ok(removed),
            Err(e) => {
                self.mark_unsynced(id, &e);
                Err(e)
            }
        }
    }

    // === Members ===

    pub fn add_member(&mut self, new: NewMember) -> Result<WorkspaceMember> {
        new.validate()?;
        let member = self.backend.add_member(&self.workspace_id, &new)?;
        self.members.retain(|m| m.id != member.id);
        self.members.push(member.clone());
        Ok(member)
    }

    pub fn update_member_role(&mut self, user_id: &str, role: MemberRole) -> Result<WorkspaceMember> {
        let local = self
            .members
            .iter_mut()
            .find(|m| m.id == user_id)
            .ok_or_else(|| CoreError::not_found("Member", user_id))?;
        local.role = role;

        match self
            .backend
            .update_member_role(&self.workspace_id, user_id, role)
        {
            Ok(saved) => {
                *local = saved.clone();
                Ok(saved)
            }
            Err(e) => {
                self.mark_unsynced(user_id, &e);
                Err(e)
            }
        }
    }

    pub fn remove_member(&mut self, user_id: &str) -> Result<()> {
        let before = self.members.len();
        self.members.retain(|m| m.id != user_id);
        if self.members.len() == before {
            return Err(CoreError::not_found("Member", user_id));
        }
        let workspace_id = self.workspace_id.clone();
        self.backend
            .remove_member(&workspace_id, user_id)
            .map_err(|e| {
                self.mark_unsynced(user_id, &e);
                e
            })
    }
}

/// Commits read the task from the local snapshot, add the minutes and write
/// the new total back. Two writers committing to the same task at once can
/// lose one commit.
impl<B: WorkspaceBackend> TimeLedger for WorkspaceStore<B> {
    fn add_time_to_task(&mut self, task_id: &str, minutes: u32) -> Result<Task> {
        let current = self
            .get_task_by_id(task_id)
            .ok_or_else(|| CoreError::not_found("Task", task_id))?
            .time_spent;
        let patch = TaskPatch {
            time_spent: Some(current.saturating_add(minutes)),
            ..TaskPatch::default()
        };
        self.update_task(task_id, &patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::storage::WorkspaceDb;
    use crate::task::TaskStatus;
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_project(name: &str) -> NewProject {
        NewProject {
            name: name.into(),
            description: String::new(),
            color: crate::project::default_color(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 6, 30),
            created_by: "u1".into(),
            members: vec!["u1".into()],
        }
    }

    fn new_task(title: &str, project_id: &str) -> NewTask {
        NewTask {
            title: title.into(),
            description: String::new(),
            project_id: project_id.into(),
            user_id: "u1".into(),
            assigned_to: vec!["u1".into()],
            priority: Default::default(),
            status: TaskStatus::Todo,
            due_date: date(2024, 5, 1),
            time_estimate: 60,
            time_spent: 0,
        }
    }

    /// Wraps a real database and fails writes on demand.
    struct Flaky {
        db: WorkspaceDb,
        fail_writes: Cell<bool>,
    }

    impl Flaky {
        fn check(&self) -> Result<()> {
            if self.fail_writes.get() {
                Err(crate::error::BackendError::NotConfigured.into())
            } else {
                Ok(())
            }
        }
    }

    impl WorkspaceBackend for Flaky {
        fn list_tasks(&self) -> Result<Vec<Task>> {
            self.db.list_tasks()
        }
        fn create_task(&self, new: &NewTask) -> Result<Task> {
            self.check()?;
            self.db.create_task(new)
        }
        fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
            self.check()?;
            self.db.update_task(id, patch)
        }
        fn delete_task(&self, id: &str) -> Result<()> {
            self.check()?;
            self.db.delete_task(id)
        }
        fn list_projects(&self) -> Result<Vec<Project>> {
            self.db.list_projects()
        }
        fn create_project(&self, new: &NewProject) -> Result<Project> {
            self.check()?;
            self.db.create_project(new)
        }
        fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project> {
            self.check()?;
            self.db.update_project(id, patch)
        }
        fn delete_project(&self, id: &str) -> Result<Vec<String>> {
            self.check()?;
            self.db.delete_project(id)
        }
        fn list_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
            self.db.list_members(workspace_id)
        }
        fn add_member(&self, workspace_id: &str, new: &NewMember) -> Result<WorkspaceMember> {
            self.check()?;
            self.db.add_member(workspace_id, new)
        }
        fn update_member_role(
            &self,
            workspace_id: &str,
            user_id: &str,
            role: MemberRole,
        ) -> Result<WorkspaceMember> {
            self.check()?;
            self.db.update_member_role(workspace_id, user_id, role)
        }
        fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
            self.check()?;
            self.db.remove_member(workspace_id, user_id)
        }
    }

    fn flaky_store() -> WorkspaceStore<Flaky> {
        let backend = Flaky {
            db: WorkspaceDb::open_memory().unwrap(),
            fail_writes: Cell::new(false),
        };
        WorkspaceStore::load(backend, "ws").unwrap()
    }

    #[test]
    fn create_assigns_id_and_appends() {
        let db = WorkspaceDb::open_memory().unwrap();
        let mut store = WorkspaceStore::load(&db, "ws").unwrap();
        let project = store.add_project(new_project("Site")).unwrap();
        let task = store.add_task(new_task("Design", &project.id)).unwrap();

        assert!(!task.id.is_empty());
        assert_eq!(store.get_task_by_id(&task.id), Some(&task));
        assert_eq!(store.get_project_tasks(&project.id).len(), 1);
        assert_eq!(db.list_tasks().unwrap(), vec![task]);
    }

    #[test]
    fn validation_runs_before_backend() {
        let mut store = flaky_store();
        store.backend().fail_writes.set(true);
        let err = store.add_task(new_task("   ", "p1")).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn failed_update_keeps_local_change_and_marks_unsynced() {
        let mut store = flaky_store();
        let project = store.add_project(new_project("Site")).unwrap();
        let task = store.add_task(new_task("Design", &project.id)).unwrap();

        store.backend().fail_writes.set(true);
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..TaskPatch::default()
        };
        assert!(store.update_task(&task.id, &patch).is_err());

        assert_eq!(
            store.get_task_by_id(&task.id).unwrap().status,
            TaskStatus::Completed
        );
        assert!(store.unsynced().contains(&task.id));
        assert_eq!(
            store.backend().db.list_tasks().unwrap()[0].status,
            TaskStatus::Todo
        );

        store.refresh().unwrap();
        assert!(store.unsynced().is_empty());
        assert_eq!(store.tasks()[0].status, TaskStatus::Todo);
    }

    #[test]
    fn invalid_project_patch_changes_nothing() {
        let mut store = flaky_store();
        let project = store.add_project(new_project("Site")).unwrap();
        store.backend().fail_writes.set(true);

        let inverted = ProjectPatch {
            end_date: Some(date(2023, 12, 31)),
            ..ProjectPatch::default()
        };
        assert!(matches!(
            store.update_project(&project.id, &inverted),
            Err(CoreError::Validation(ValidationError::InvalidValue { .. }))
        ));
        let blank = ProjectPatch {
            name: Some("  ".into()),
            ..ProjectPatch::default()
        };
        assert!(matches!(
            store.update_project(&project.id, &blank),
            Err(CoreError::Validation(ValidationError::MissingField("name")))
        ));

        assert_eq!(store.get_project_by_id(&project.id), Some(&project));
        assert!(store.unsynced().is_empty());

        store.backend().fail_writes.set(false);
        let moved = ProjectPatch {
            start_date: Some(date(2023, 6, 1)),
            end_date: Some(date(2023, 12, 31)),
            ..ProjectPatch::default()
        };
        let saved = store.update_project(&project.id, &moved).unwrap();
        assert_eq!(saved.end_date, date(2023, 12, 31));
    }

    #[test]
    fn delete_project_cascades_locally_and_in_backend() {
        let db = WorkspaceDb::open_memory().unwrap();
        let mut store = WorkspaceStore::load(&db, "ws").unwrap();
        let keep = store.add_project(new_project("Keep")).unwrap();
        let drop = store.add_project(new_project("Drop")).unwrap();
        let kept_task = store.add_task(new_task("a", &keep.id)).unwrap();
        let gone_1 = store.add_task(new_task("b", &drop.id)).unwrap();
        let gone_2 = store.add_task(new_task("c", &drop.id)).unwrap();

        let mut removed = store.delete_project(&drop.id).unwrap();
        removed.sort();
        let mut expected = vec![gone_1.id, gone_2.id];
        expected.sort();
        assert_eq!(removed, expected);

        assert_eq!(store.tasks(), &[kept_task.clone()][..]);
        assert!(store.get_project_by_id(&drop.id).is_none());
        assert_eq!(db.list_tasks().unwrap(), vec![kept_task]);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut store = flaky_store();
        assert!(matches!(
            store.update_task("nope", &TaskPatch::default()),
            Err(CoreError::NotFound { entity: "Task", .. })
        ));
        assert!(matches!(
            store.delete_project("nope"),
            Err(CoreError::NotFound { entity: "Project", .. })
        ));
        assert!(store.unsynced().is_empty());
    }

    #[test]
    fn add_time_reads_then_writes_total() {
        let db = WorkspaceDb::open_memory().unwrap();
        let mut store = WorkspaceStore::load(&db, "ws").unwrap();
        let project = store.add_project(new_project("Site")).unwrap();
        let mut new = new_task("Design", &project.id);
        new.time_spent = 10;
        let task = store.add_task(new).unwrap();

        let updated = store.add_time_to_task(&task.id, 5).unwrap();
        assert_eq!(updated.time_spent, 15);
        assert_eq!(db.list_tasks().unwrap()[0].time_spent, 15);

        assert!(store.add_time_to_task("missing", 1).is_err());
    }

    #[test]
    fn member_role_drives_is_manager() {
        let db = WorkspaceDb::open_memory().unwrap();
        let mut store = WorkspaceStore::load(&db, "ws").unwrap();
        store
            .add_member(NewMember {
                user_id: "u2".into(),
                name: "Bo".into(),
                email: "bo@example.com".into(),
                role: MemberRole::Member,
                avatar_url: None,
            })
            .unwrap();
        let profile = Profile {
            id: "u2".into(),
            name: "Bo".into(),
            email: "bo@example.com".into(),
            role: MemberRole::Manager,
            workspace_id: "ws".into(),
        };
        assert!(!store.is_manager(&profile));

        store.update_member_role("u2", MemberRole::Manager).unwrap();
        assert!(store.is_manager(&profile));
        assert_eq!(db.list_members("ws").unwrap()[0].role, MemberRole::Manager);

        store.remove_member("u2").unwrap();
        assert!(store.members().is_empty());
        // Without a membership row the profile's own role decides.
        assert!(store.is_manager(&profile));
    }
}
