//! In-memory Azure DevOps double shared by the unit tests of this crate.
//!
//! The mock keeps just enough state to behave like the platform: created
//! projects become visible by name, pushes create the default branch, created
//! refs show up in later listings and every call is recorded by name.

use async_trait::async_trait;
use devops_client::{
    AccessControlEntryPayload, DevOpsClient, Error, GitPush, GitPushResult, GitRef,
    GitRefUpdate, GitRefUpdateResult, GitRepository, GraphGroup, GroupCreatePayload, Identity,
    JsonPatchOperation, OperationReference, OperationStatus, PolicyConfiguration, Project,
    ProjectCreatePayload, RefUpdateStatus, WorkItem, WorkItemComment,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

pub const TEST_ORG: &str = "contoso";
pub const BOOTSTRAP_COMMIT: &str = "1111111111111111111111111111111111111111";

pub const BUILTIN_GROUPS: [&str; 7] = [
    "Readers",
    "Contributors",
    "Project Administrators",
    "Build Administrators",
    "Endpoint Administrators",
    "Deployment Group Administrators",
    "Release Administrators",
];

#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<String>,
    pub projects: Vec<Project>,
    pub created_projects: Vec<ProjectCreatePayload>,
    pub operation_statuses: VecDeque<OperationStatus>,
    pub repositories: Vec<GitRepository>,
    /// Refs present in every repository.
    pub refs: Vec<GitRef>,
    /// Refs created through pushes and branch creation, per repository id.
    pub repository_refs: HashMap<String, Vec<GitRef>>,
    pub pushes: Vec<GitPush>,
    pub branch_updates: Vec<GitRefUpdate>,
    pub aces: Vec<AccessControlEntryPayload>,
    pub removed_permissions: Vec<(String, String, u64)>,
    pub policies: Vec<PolicyConfiguration>,
    pub created_policies: Vec<PolicyConfiguration>,
    pub updated_policies: Vec<(u64, PolicyConfiguration)>,
    pub groups: Vec<GraphGroup>,
    pub created_groups: Vec<(GroupCreatePayload, Vec<String>)>,
    pub work_item_patches: Vec<(u64, Vec<JsonPatchOperation>)>,
    pub comments: Vec<(u64, String)>,
    pub missing_identities: HashSet<String>,
    pub fail_on: HashSet<String>,
    /// Created projects are not returned by later lookups.
    pub hide_created_projects: bool,
    /// Pushes register the pushed refs. On by default.
    pub push_creates_refs: bool,
    /// Status reported by every branch creation instead of the computed one.
    pub branch_status: Option<RefUpdateStatus>,
}

impl MockState {
    fn refs_of(&self, repository_id: &str) -> Vec<GitRef> {
        let mut refs = self.refs.clone();
        if let Some(created) = self.repository_refs.get(repository_id) {
            refs.extend(created.iter().cloned());
        }
        refs
    }
}

/// Records calls and answers them from [`MockState`].
#[derive(Debug, Default)]
pub struct MockDevOpsClient {
    pub state: Mutex<MockState>,
}

impl MockDevOpsClient {
    /// A client whose project scope contains every built-in group and whose
    /// project creation succeeds on the first poll.
    pub fn new() -> Self {
        let client = Self::default();
        {
            let mut state = client.state.lock().unwrap();
            state.groups = BUILTIN_GROUPS
                .iter()
                .map(|name| builtin_group(name))
                .collect();
            state.operation_statuses.push_back(OperationStatus::Succeeded);
            state.push_creates_refs = true;
        }
        client
    }

    pub fn with_projects(self, names: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for name in names {
                state.projects.push(project(name));
            }
        }
        self
    }

    pub fn with_operation_statuses(self, statuses: &[OperationStatus]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.operation_statuses = statuses.iter().copied().collect();
        }
        self
    }

    /// Makes every call to `method` fail with an API error.
    pub fn fail_on(self, method: &str) -> Self {
        self.state.lock().unwrap().fail_on.insert(method.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == method)
            .count()
    }

    fn record(&self, method: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method.to_string());
        if state.fail_on.contains(method) {
            return Err(Error::Api {
                status: 500,
                message: format!("{} failed", method),
            });
        }
        Ok(())
    }
}

pub fn project(name: &str) -> Project {
    Project {
        id: format!("id-{}", name),
        name: name.to_string(),
        description: None,
        state: Some("wellFormed".to_string()),
    }
}

pub fn builtin_group(name: &str) -> GraphGroup {
    GraphGroup {
        descriptor: format!("vssgp.{}", name.replace(' ', "-").to_lowercase()),
        display_name: name.to_string(),
        principal_name: None,
        origin_id: None,
    }
}

pub fn identity_descriptor(scope: &str, group: &str) -> String {
    format!("ident.{}.{}", scope, group.replace(' ', "-"))
}

#[async_trait]
impl DevOpsClient for MockDevOpsClient {
    fn organization(&self) -> &str {
        TEST_ORG
    }

    async fn list_projects(&self) -> Result<Vec<Project>, Error> {
        self.record("list_projects")?;
        Ok(self.state.lock().unwrap().projects.clone())
    }

    async fn create_project(
        &self,
        payload: &ProjectCreatePayload,
    ) -> Result<OperationReference, Error> {
        self.record("create_project")?;
        let mut state = self.state.lock().unwrap();
        state.created_projects.push(payload.clone());
        if !state.hide_created_projects {
            state.projects.push(project(&payload.name));
        }
        Ok(OperationReference {
            id: format!("op-{}", state.created_projects.len()),
            status: OperationStatus::Queued,
            url: None,
            result_message: None,
        })
    }

    async fn get_operation_status(
        &self,
        operation_id: &str,
    ) -> Result<OperationReference, Error> {
        self.record("get_operation_status")?;
        let mut state = self.state.lock().unwrap();
        let status = if state.operation_statuses.len() > 1 {
            state.operation_statuses.pop_front()
        } else {
            state.operation_statuses.front().copied()
        }
        .unwrap_or(OperationStatus::Succeeded);

        Ok(OperationReference {
            id: operation_id.to_string(),
            status,
            url: None,
            result_message: match status {
                OperationStatus::Failed => Some("quota exceeded".to_string()),
                _ => None,
            },
        })
    }

    async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>, Error> {
        self.record("get_project_by_name")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn get_identity(&self, scope: &str, group: &str) -> Result<Option<Identity>, Error> {
        self.record("get_identity")?;
        if self.state.lock().unwrap().missing_identities.contains(group) {
            return Ok(None);
        }
        Ok(Some(Identity {
            id: format!("{}-{}", scope, group),
            descriptor: identity_descriptor(scope, group),
            provider_display_name: None,
        }))
    }

    async fn list_repositories(&self, _project: &str) -> Result<Vec<GitRepository>, Error> {
        self.record("list_repositories")?;
        Ok(self.state.lock().unwrap().repositories.clone())
    }

    async fn create_repository(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<GitRepository, Error> {
        self.record("create_repository")?;
        let repository = GitRepository {
            id: format!("repo-{}", name),
            name: name.to_string(),
            default_branch: None,
            project: Some(devops_client::models::ProjectReference {
                id: project_id.to_string(),
                name: None,
            }),
        };
        self.state
            .lock()
            .unwrap()
            .repositories
            .push(repository.clone());
        Ok(repository)
    }

    async fn push_initial_commit(
        &self,
        repository_id: &str,
        push: &GitPush,
    ) -> Result<GitPushResult, Error> {
        self.record("push_initial_commit")?;
        let mut state = self.state.lock().unwrap();
        state.pushes.push(push.clone());
        if state.push_creates_refs {
            for update in &push.ref_updates {
                state
                    .repository_refs
                    .entry(repository_id.to_string())
                    .or_default()
                    .push(GitRef {
                        name: update.name.clone(),
                        object_id: BOOTSTRAP_COMMIT.to_string(),
                    });
            }
        }
        Ok(GitPushResult {
            push_id: Some(1),
            commits: vec![],
        })
    }

    async fn list_refs(
        &self,
        _project_id: &str,
        repository_id: &str,
    ) -> Result<Vec<GitRef>, Error> {
        self.record("list_refs")?;
        Ok(self.state.lock().unwrap().refs_of(repository_id))
    }

    async fn create_branch(
        &self,
        _project_id: &str,
        repository_id: &str,
        update: &GitRefUpdate,
    ) -> Result<GitRefUpdateResult, Error> {
        self.record("create_branch")?;
        let mut state = self.state.lock().unwrap();
        state.branch_updates.push(update.clone());
        if let Some(status) = state.branch_status {
            return Ok(GitRefUpdateResult {
                name: update.name.clone(),
                success: status == RefUpdateStatus::Succeeded,
                update_status: status,
                new_object_id: None,
            });
        }
        let exists = state
            .refs_of(repository_id)
            .iter()
            .any(|r| r.name == update.name);
        if !exists {
            state
                .repository_refs
                .entry(repository_id.to_string())
                .or_default()
                .push(GitRef {
                    name: update.name.clone(),
                    object_id: update.new_object_id.clone(),
                });
        }
        Ok(GitRefUpdateResult {
            name: update.name.clone(),
            success: !exists,
            update_status: if exists {
                RefUpdateStatus::StaleOldObjectId
            } else {
                RefUpdateStatus::Succeeded
            },
            new_object_id: Some(update.new_object_id.clone()),
        })
    }

    async fn set_access_control_entry(
        &self,
        payload: &AccessControlEntryPayload,
    ) -> Result<(), Error> {
        self.record("set_access_control_entry")?;
        self.state.lock().unwrap().aces.push(payload.clone());
        Ok(())
    }

    async fn remove_permission(
        &self,
        token: &str,
        descriptor: &str,
        permissions: u64,
    ) -> Result<(), Error> {
        self.record("remove_permission")?;
        self.state.lock().unwrap().removed_permissions.push((
            token.to_string(),
            descriptor.to_string(),
            permissions,
        ));
        Ok(())
    }

    async fn list_policy_configurations(
        &self,
        _project: &str,
        policy_type_id: &str,
    ) -> Result<Vec<PolicyConfiguration>, Error> {
        self.record("list_policy_configurations")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .policies
            .iter()
            .filter(|p| p.policy_type.id == policy_type_id)
            .cloned()
            .collect())
    }

    async fn create_policy_configuration(
        &self,
        _project: &str,
        configuration: &PolicyConfiguration,
    ) -> Result<PolicyConfiguration, Error> {
        self.record("create_policy_configuration")?;
        let mut state = self.state.lock().unwrap();
        let mut created = configuration.clone();
        created.id = Some(100 + state.created_policies.len() as u64);
        state.created_policies.push(configuration.clone());
        state.policies.push(created.clone());
        Ok(created)
    }

    async fn update_policy_configuration(
        &self,
        _project: &str,
        configuration_id: u64,
        configuration: &PolicyConfiguration,
    ) -> Result<PolicyConfiguration, Error> {
        self.record("update_policy_configuration")?;
        self.state
            .lock()
            .unwrap()
            .updated_policies
            .push((configuration_id, configuration.clone()));
        let mut updated = configuration.clone();
        updated.id = Some(configuration_id);
        Ok(updated)
    }

    async fn get_scope_descriptor(&self, project_id: &str) -> Result<String, Error> {
        self.record("get_scope_descriptor")?;
        Ok(format!("scp.{}", project_id))
    }

    async fn list_groups(&self, _scope_descriptor: &str) -> Result<Vec<GraphGroup>, Error> {
        self.record("list_groups")?;
        Ok(self.state.lock().unwrap().groups.clone())
    }

    async fn create_group(
        &self,
        _scope_descriptor: &str,
        payload: &GroupCreatePayload,
        member_of: &[String],
    ) -> Result<GraphGroup, Error> {
        self.record("create_group")?;
        let group = GraphGroup {
            descriptor: format!("vssgp.{}", payload.display_name),
            display_name: payload.display_name.clone(),
            principal_name: None,
            origin_id: None,
        };
        let mut state = self.state.lock().unwrap();
        state
            .created_groups
            .push((payload.clone(), member_of.to_vec()));
        state.groups.push(group.clone());
        Ok(group)
    }

    async fn trigger_endpoint_group_seed(
        &self,
        _project_id: &str,
        _project_name: &str,
    ) -> Result<(), Error> {
        self.record("trigger_endpoint_group_seed")
    }

    async fn trigger_deployment_group_seed(&self, _project_id: &str) -> Result<(), Error> {
        self.record("trigger_deployment_group_seed")
    }

    async fn trigger_release_group_seed(&self, _project_id: &str) -> Result<(), Error> {
        self.record("trigger_release_group_seed")
    }

    async fn patch_work_item(
        &self,
        work_item_id: u64,
        operations: &[JsonPatchOperation],
    ) -> Result<WorkItem, Error> {
        self.record("patch_work_item")?;
        self.state
            .lock()
            .unwrap()
            .work_item_patches
            .push((work_item_id, operations.to_vec()));
        Ok(WorkItem {
            id: work_item_id,
            rev: Some(2),
        })
    }

    async fn add_work_item_comment(
        &self,
        work_item_id: u64,
        text: &str,
    ) -> Result<WorkItemComment, Error> {
        self.record("add_work_item_comment")?;
        self.state
            .lock()
            .unwrap()
            .comments
            .push((work_item_id, text.to_string()));
        Ok(WorkItemComment {
            id: Some(1),
            text: text.to_string(),
        })
    }
}

/// Returns the value of `field` in the last patch sent for `work_item_id`.
pub fn patched_field(
    client: &MockDevOpsClient,
    work_item_id: u64,
    field: &str,
) -> Option<serde_json::Value> {
    let path = format!("/fields/{}", field);
    let state = client.state.lock().unwrap();
    state
        .work_item_patches
        .iter()
        .rev()
        .find(|(id, _)| *id == work_item_id)
        .and_then(|(_, ops)| ops.iter().find(|op| op.path == path))
        .and_then(|op| op.value.clone())
}
