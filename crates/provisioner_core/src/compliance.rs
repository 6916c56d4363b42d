//! Compliant repository layout.
//!
//! A provisioned repository always has the same shape: a `main` branch with a
//! bootstrap commit, the long lived `integ/init`, `maint/init` and `task/init`
//! branches, a fixed set of access control entries and the standard policies.
//! [`RepositoryComplianceBuilder`] creates that layout and records each finished
//! step in the ticket's checkpoint so a re-submitted ticket resumes where the
//! previous run stopped.

use devops_client::{DevOpsClient, GitPush, GitRef, GitRefUpdate, GitRepository, Project};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::checkpoint::{CheckpointRecorder, CheckpointStep};
use crate::groups::{CONTRIBUTORS, PROJECT_ADMINISTRATORS, READERS};
use crate::permissions::{AccessRule, GitPermission, PermissionMask, SecurityScope};
use crate::policy::{PolicyAssembler, PolicyKind};
use crate::{ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "compliance_tests.rs"]
mod tests;

pub const DEFAULT_BRANCH: &str = "main";
pub const LONG_LIVED_BRANCHES: [&str; 3] = ["integ/init", "maint/init", "task/init"];
pub const PROJECT_COLLECTION_ADMINISTRATORS: &str = "Project Collection Administrators";

const INTEGRATION_PREFIX: &str = "integ";
const MAINTENANCE_PREFIX: &str = "maint";
const TASK_PREFIX: &str = "task";

const BOOTSTRAP_PATH: &str = "/readme.md";
const BOOTSTRAP_CONTENT: &str = "initial file";
const BOOTSTRAP_COMMENT: &str = "Initial commit.";

/// A group an access rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    Readers,
    Contributors,
    ProjectAdministrators,
    ProjectCollectionAdministrators,
}

impl Principal {
    pub fn group_name(&self) -> &'static str {
        match self {
            Self::Readers => READERS,
            Self::Contributors => CONTRIBUTORS,
            Self::ProjectAdministrators => PROJECT_ADMINISTRATORS,
            Self::ProjectCollectionAdministrators => PROJECT_COLLECTION_ADMINISTRATORS,
        }
    }

    /// Returns true for groups resolved at organization scope rather than project scope.
    pub fn is_organization_scoped(&self) -> bool {
        matches!(self, Self::ProjectCollectionAdministrators)
    }
}

/// Where in the repository a rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// All repositories of the project. Inherited permissions live here.
    Project,
    Repository,
    BranchPrefix(&'static str),
}

/// What a rule does to the principal's permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Allow(PermissionMask),
    Deny(PermissionMask),
    /// Removes any explicit allow or deny of the permissions.
    Revoke(PermissionMask),
}

/// One entry of the fixed access control layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceRule {
    pub principals: &'static [Principal],
    pub scopes: &'static [RuleScope],
    pub action: RuleAction,
}

/// The access control layout applied to every repository.
pub fn compliance_rules() -> Vec<ComplianceRule> {
    vec![
        ComplianceRule {
            principals: &[Principal::Contributors],
            scopes: &[RuleScope::Repository],
            action: RuleAction::Deny(GitPermission::CreateBranch.into()),
        },
        ComplianceRule {
            principals: &[Principal::Contributors],
            scopes: &[
                RuleScope::BranchPrefix(INTEGRATION_PREFIX),
                RuleScope::BranchPrefix(MAINTENANCE_PREFIX),
                RuleScope::BranchPrefix(TASK_PREFIX),
            ],
            action: RuleAction::Allow(GitPermission::CreateBranch.into()),
        },
        ComplianceRule {
            principals: &[Principal::Readers],
            scopes: &[RuleScope::Project],
            action: RuleAction::Revoke(GitPermission::PullRequestContribute.into()),
        },
        ComplianceRule {
            principals: &[Principal::ProjectAdministrators],
            scopes: &[RuleScope::Repository],
            action: RuleAction::Allow(
                GitPermission::PullRequestBypassPolicy | GitPermission::PolicyExempt,
            ),
        },
        ComplianceRule {
            principals: &[Principal::ProjectCollectionAdministrators],
            scopes: &[RuleScope::Repository],
            action: RuleAction::Allow(GitPermission::ForcePush.into()),
        },
        ComplianceRule {
            principals: &[Principal::Contributors, Principal::ProjectAdministrators],
            scopes: &[RuleScope::BranchPrefix(TASK_PREFIX)],
            action: RuleAction::Allow(GitPermission::ForcePush.into()),
        },
    ]
}

/// Policies applied to every repository, with the branch prefix of branch scoped kinds.
pub const REPOSITORY_POLICIES: [(PolicyKind, Option<&str>); 5] = [
    (PolicyKind::MinimumReviewers, Some(INTEGRATION_PREFIX)),
    (PolicyKind::WorkItemLinking, Some(INTEGRATION_PREFIX)),
    (PolicyKind::RepoSettings, None),
    (PolicyKind::PathLength, None),
    (PolicyKind::FileSize, None),
];

/// Descriptors of the principals used by the compliance rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalDescriptors {
    pub readers: String,
    pub contributors: String,
    pub project_administrators: String,
    pub project_collection_administrators: String,
}

impl PrincipalDescriptors {
    pub fn get(&self, principal: Principal) -> &str {
        match principal {
            Principal::Readers => &self.readers,
            Principal::Contributors => &self.contributors,
            Principal::ProjectAdministrators => &self.project_administrators,
            Principal::ProjectCollectionAdministrators => &self.project_collection_administrators,
        }
    }
}

/// Builds a compliant repository inside an existing project.
pub struct RepositoryComplianceBuilder {
    client: Arc<dyn DevOpsClient>,
    policies: PolicyAssembler,
}

impl RepositoryComplianceBuilder {
    pub fn new(client: Arc<dyn DevOpsClient>) -> Self {
        Self {
            policies: PolicyAssembler::new(client.clone()),
            client,
        }
    }

    /// Creates or completes the repository `repository_name` in `project`.
    ///
    /// Steps already recorded in `recorder` are skipped. The first failing
    /// step stops the run and nothing is rolled back.
    #[instrument(skip(self, project, recorder), fields(project = %project.name))]
    pub async fn build(
        &self,
        project: &Project,
        repository_name: &str,
        recorder: &mut CheckpointRecorder,
    ) -> ProvisioningResult<GitRepository> {
        let descriptors = self.resolve_principals(&project.name).await?;

        let repository = self.get_or_create_repository(project, repository_name).await?;
        if recorder
            .checkpoint()
            .repository_id()
            .is_some_and(|id| id != repository.id)
        {
            warn!(
                repository = %repository.name,
                repository_id = %repository.id,
                "Checkpoint belongs to another repository, starting over"
            );
            recorder.restart().await?;
        }
        recorder
            .record(CheckpointStep::RepositoryResolved {
                repository_id: repository.id.clone(),
            })
            .await?;

        if !recorder.is_done(&CheckpointStep::BranchesCreated) {
            let head = self.bootstrap_default_branch(project, &repository).await?;
            self.create_long_lived_branches(project, &repository, &head).await?;
            recorder.record(CheckpointStep::BranchesCreated).await?;
        }

        if !recorder.is_done(&CheckpointStep::PermissionsApplied) {
            self.apply_permissions(project, &repository, &descriptors).await?;
            recorder.record(CheckpointStep::PermissionsApplied).await?;
        }

        if !recorder.is_done(&CheckpointStep::PoliciesApplied) {
            let result = self
                .policies
                .apply_all(&project.name, &repository.id, &REPOSITORY_POLICIES)
                .await?;
            info!(
                repository = %repository.name,
                created = result.created,
                updated = result.updated,
                "Policies applied"
            );
            recorder.record(CheckpointStep::PoliciesApplied).await?;
        }

        Ok(repository)
    }

    /// Looks up the descriptors of the groups the compliance rules refer to.
    pub async fn resolve_principals(&self, project_name: &str) -> ProvisioningResult<PrincipalDescriptors> {
        Ok(PrincipalDescriptors {
            readers: self.resolve(project_name, Principal::Readers).await?,
            contributors: self.resolve(project_name, Principal::Contributors).await?,
            project_administrators: self
                .resolve(project_name, Principal::ProjectAdministrators)
                .await?,
            project_collection_administrators: self
                .resolve(project_name, Principal::ProjectCollectionAdministrators)
                .await?,
        })
    }

    async fn resolve(&self, project_name: &str, principal: Principal) -> ProvisioningResult<String> {
        let scope = if principal.is_organization_scoped() {
            self.client.organization()
        } else {
            project_name
        };
        let group = principal.group_name();

        match self.client.get_identity(scope, group).await? {
            Some(identity) => Ok(identity.descriptor),
            None => Err(ProvisioningError::MissingIdentity {
                scope: scope.to_string(),
                group: group.to_string(),
            }),
        }
    }

    async fn get_or_create_repository(
        &self,
        project: &Project,
        name: &str,
    ) -> ProvisioningResult<GitRepository> {
        let existing = self.client.list_repositories(&project.name).await?;
        if let Some(repository) = existing
            .into_iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
        {
            debug!(repository = %repository.name, "Using existing repository");
            return Ok(repository);
        }

        let repository = self.client.create_repository(&project.id, name).await?;
        info!(repository = %repository.name, repository_id = %repository.id, "Repository created");
        Ok(repository)
    }

    /// Returns the commit the default branch points to, pushing the bootstrap commit if needed.
    async fn bootstrap_default_branch(
        &self,
        project: &Project,
        repository: &GitRepository,
    ) -> ProvisioningResult<String> {
        let default_ref = branch_ref(DEFAULT_BRANCH);
        let refs = self.client.list_refs(&project.id, &repository.id).await?;
        if let Some(head) = find_ref(&refs, &default_ref) {
            debug!(commit = %head, "Default branch already exists");
            return Ok(head);
        }

        let push = GitPush::initial(
            DEFAULT_BRANCH,
            BOOTSTRAP_PATH,
            BOOTSTRAP_CONTENT,
            BOOTSTRAP_COMMENT,
        );
        self.client.push_initial_commit(&repository.id, &push).await?;
        info!(repository = %repository.name, "Bootstrap commit pushed");

        let refs = self.client.list_refs(&project.id, &repository.id).await?;
        find_ref(&refs, &default_ref)
            .ok_or_else(|| ProvisioningError::DefaultBranchNotFound(DEFAULT_BRANCH.to_string()))
    }

    async fn create_long_lived_branches(
        &self,
        project: &Project,
        repository: &GitRepository,
        head: &str,
    ) -> ProvisioningResult<()> {
        for branch in LONG_LIVED_BRANCHES {
            let update = GitRefUpdate::create_branch(branch, head);
            match self
                .client
                .create_branch(&project.id, &repository.id, &update)
                .await
            {
                Ok(result) if result.success => {
                    debug!(branch = branch, "Branch created");
                }
                Ok(result) if result.already_exists() => {
                    debug!(branch = branch, "Branch already exists");
                }
                Ok(result) => {
                    return Err(ProvisioningError::BranchCreationFailed {
                        branch: branch.to_string(),
                        status: format!("{:?}", result.update_status),
                    });
                }
                Err(e) if e.is_conflict() => {
                    debug!(branch = branch, "Branch already exists");
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(repository = %repository.name, "Long lived branches in place");
        Ok(())
    }

    async fn apply_permissions(
        &self,
        project: &Project,
        repository: &GitRepository,
        descriptors: &PrincipalDescriptors,
    ) -> ProvisioningResult<()> {
        let mut applied = 0usize;
        for rule in compliance_rules() {
            for scope in rule.scopes {
                let security_scope = match scope {
                    RuleScope::Project => SecurityScope::Project {
                        project_id: project.id.clone(),
                    },
                    RuleScope::Repository => SecurityScope::Repository {
                        project_id: project.id.clone(),
                        repository_id: repository.id.clone(),
                    },
                    RuleScope::BranchPrefix(prefix) => SecurityScope::BranchPrefix {
                        project_id: project.id.clone(),
                        repository_id: repository.id.clone(),
                        prefix: prefix.to_string(),
                    },
                };

                for principal in rule.principals {
                    let descriptor = descriptors.get(*principal);
                    match rule.action {
                        RuleAction::Allow(mask) => {
                            let entry = AccessRule::allow(security_scope.clone(), descriptor, mask);
                            self.client.set_access_control_entry(&entry.to_payload()).await?;
                        }
                        RuleAction::Deny(mask) => {
                            let entry = AccessRule::deny(security_scope.clone(), descriptor, mask);
                            self.client.set_access_control_entry(&entry.to_payload()).await?;
                        }
                        RuleAction::Revoke(mask) => {
                            self.client
                                .remove_permission(&security_scope.token(), descriptor, mask.bits())
                                .await?;
                        }
                    }
                    applied += 1;
                }
            }
        }

        info!(repository = %repository.name, entries = applied, "Permissions applied");
        Ok(())
    }
}

fn branch_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}

fn find_ref(refs: &[GitRef], name: &str) -> Option<String> {
    refs.iter()
        .find(|r| r.name == name)
        .map(|r| r.object_id.clone())
}
