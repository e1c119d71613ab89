//! Blocking adapter over [`RestBackend`].

use tokio::runtime::{Builder, Runtime};

use super::rest::RestBackend;
use crate::error::Result;
use crate::member::{MemberRole, NewMember, WorkspaceMember};
use crate::project::{NewProject, Project, ProjectPatch};
use crate::storage::BackendConfig;
use crate::store::WorkspaceBackend;
use crate::task::{NewTask, Task, TaskPatch};

/// [`WorkspaceBackend`] for the hosted tables.
///
/// Owns a current-thread runtime and blocks on each request, so it must not
/// be called from inside another tokio runtime.
pub struct HostedBackend {
    client: RestBackend,
    runtime: Runtime,
}

impl HostedBackend {
    pub fn new(client: RestBackend) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { client, runtime })
    }

    /// Build from the `[backend]` config section.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(RestBackend::from_config(config)?)
    }
}

impl WorkspaceBackend for HostedBackend {
    fn list_tasks(&self) -> Result<Vec<Task>> {
        self.runtime.block_on(self.client.list_tasks())
    }
    fn create_task(&self, new: &NewTask) -> Result<Task> {
        self.runtime.block_on(self.client.create_task(new))
    }
    fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        self.runtime.block_on(self.client.update_task(id, patch))
    }
    fn delete_task(&self, id: &str) -> Result<()> {
        self.runtime.block_on(self.client.delete_task(id))
    }
    fn list_projects(&self) -> Result<Vec<Project>> {
        self.runtime.block_on(self.client.list_projects())
    }
    fn create_project(&self, new: &NewProject) -> Result<Project> {
        self.runtime.block_on(self.client.create_project(new))
    }
    fn update_project(&self, id: &str, patch: &ProjectPatch) -> Result<Project> {
        self.runtime.block_on(self.client.update_project(id, patch))
    }
    fn delete_project(&self, id: &str) -> Result<Vec<String>> {
        self.runtime.block_on(self.client.delete_project(id))
    }
    fn list_members(&self, workspace_id: &str) -> Result<Vec<WorkspaceMember>> {
        self.runtime.block_on(self.client.list_members(workspace_id))
    }
    fn add_member(&self, workspace_id: &str, new: &NewMember) -> Result<WorkspaceMember> {
        self.runtime
            .block_on(self.client.add_member(workspace_id, new))
    }
    fn update_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> Result<WorkspaceMember> {
        self.runtime
            .block_on(self.client.update_member_role(workspace_id, user_id, role))
    }
    fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
        self.runtime
            .block_on(self.client.remove_member(workspace_id, user_id))
    }
}
