//! Branch and repository policy assembly.
//!
//! This module provides the [`PolicyAssembler`] component which creates or
//! updates the policy configurations of a repository. For each policy kind the
//! assembler looks for an existing configuration scoped to the repository. If
//! one exists it is updated in place, keeping its configuration id. Otherwise a
//! new configuration is created.

use devops_client::{DevOpsClient, PolicyConfiguration, PolicyScope, PolicySettings, PolicyTypeRef};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;

const MAX_PATH_LENGTH: u32 = 254;
const MAX_BLOB_SIZE_BYTES: u64 = 104_857_600;

/// The policy kinds the provisioner knows how to configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    MinimumReviewers,
    WorkItemLinking,
    PathLength,
    FileSize,
    RepoSettings,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 5] = [
        Self::MinimumReviewers,
        Self::WorkItemLinking,
        Self::PathLength,
        Self::FileSize,
        Self::RepoSettings,
    ];

    /// Platform id of the policy type.
    pub fn type_id(&self) -> &'static str {
        match self {
            Self::MinimumReviewers => "fa4e907d-c16b-4a4c-9dfa-4906e5d171dd",
            Self::WorkItemLinking => "40e92b44-2fe1-4dd6-b3d8-74a9c21d0c6e",
            Self::RepoSettings => "7ed39669-655c-494e-b4a0-a08b4da0fcce",
            Self::PathLength => "001a79cf-fda1-4c4e-9e7c-bac40ee5ead8",
            Self::FileSize => "2e26e725-8201-4edd-8bf5-978563c34a80",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MinimumReviewers => "minimum-reviewers",
            Self::WorkItemLinking => "work-item-linking",
            Self::PathLength => "path-length",
            Self::FileSize => "file-size",
            Self::RepoSettings => "repo-settings",
        }
    }

    /// Returns true for kinds scoped to a branch prefix rather than the whole repository.
    pub fn is_branch_scoped(&self) -> bool {
        matches!(self, Self::MinimumReviewers | Self::WorkItemLinking)
    }

    /// Looks up a kind by its platform type id.
    ///
    /// # Errors
    /// Returns `ProvisioningError::UnsupportedPolicy` for unknown type ids.
    pub fn from_type_id(type_id: &str) -> ProvisioningResult<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.type_id().eq_ignore_ascii_case(type_id))
            .ok_or_else(|| ProvisioningError::UnsupportedPolicy(type_id.to_string()))
    }

    fn settings(&self, repository_id: &str, branch: Option<&str>) -> PolicySettings {
        let scope = if self.is_branch_scoped() {
            PolicyScope::branch_prefix(repository_id, branch.unwrap_or_default())
        } else {
            PolicyScope::repository(repository_id)
        };

        match self {
            Self::MinimumReviewers => PolicySettings {
                minimum_approver_count: Some(1),
                creator_vote_counts: Some(false),
                allow_downvotes: Some(false),
                block_last_pusher_vote: Some(false),
                require_vote_on_last_iteration: Some(false),
                reset_on_source_push: Some(false),
                reset_rejections_on_source_push: Some(false),
                scope: vec![scope],
                ..Default::default()
            },
            Self::WorkItemLinking => PolicySettings {
                scope: vec![scope],
                ..Default::default()
            },
            Self::RepoSettings => PolicySettings {
                enforce_consistent_case: Some(true),
                scope: vec![scope],
                ..Default::default()
            },
            Self::PathLength => PolicySettings {
                max_path_length: Some(MAX_PATH_LENGTH),
                scope: vec![scope],
                ..Default::default()
            },
            Self::FileSize => PolicySettings {
                maximum_git_blob_size_in_bytes: Some(MAX_BLOB_SIZE_BYTES),
                use_uncompressed_size: Some(false),
                scope: vec![scope],
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PolicyKind {
    type Err = ProvisioningError;

    /// Parses a kind from its name (`minimum-reviewers`) or its platform type id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::ALL.into_iter().find(|k| k.name() == s) {
            Some(kind) => Ok(kind),
            None => Self::from_type_id(s),
        }
    }
}

/// Builds the configuration payload for a policy.
///
/// With `existing_id` the payload is an update of that configuration and carries
/// no revision. Without it the payload creates a new configuration at revision 1.
/// `branch` is the branch prefix of branch scoped kinds and is ignored by the
/// repository scoped ones.
pub fn assemble(
    kind: PolicyKind,
    repository_id: &str,
    branch: Option<&str>,
    existing_id: Option<u64>,
) -> PolicyConfiguration {
    let (id, revision, is_deleted) = match existing_id {
        Some(id) => (Some(id), None, None),
        None => (None, Some(1), Some(false)),
    };

    PolicyConfiguration {
        id,
        revision,
        is_deleted,
        is_blocking: true,
        is_enabled: true,
        policy_type: PolicyTypeRef {
            id: kind.type_id().to_string(),
        },
        settings: kind.settings(repository_id, branch),
    }
}

/// Returns the first configuration whose scope targets `repository_id`.
pub fn find_existing_policy<'a>(
    configurations: &'a [PolicyConfiguration],
    repository_id: &str,
) -> Option<&'a PolicyConfiguration> {
    configurations
        .iter()
        .find(|c| c.id.is_some() && c.applies_to_repository(repository_id))
}

/// What happened to a policy when it was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    Created(u64),
    Updated(u64),
}

/// Result of applying a set of policies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyPoliciesResult {
    pub created: usize,
    pub updated: usize,
}

/// Creates or updates repository policies.
pub struct PolicyAssembler {
    client: Arc<dyn DevOpsClient>,
}

impl PolicyAssembler {
    pub fn new(client: Arc<dyn DevOpsClient>) -> Self {
        Self { client }
    }

    /// Applies a single policy to a repository, creating or updating as needed.
    ///
    /// # Errors
    /// Returns `ProvisioningError::Remote` if listing, creating or updating fails.
    pub async fn apply(
        &self,
        project: &str,
        kind: PolicyKind,
        repository_id: &str,
        branch: Option<&str>,
    ) -> ProvisioningResult<PolicyOutcome> {
        let existing = self
            .client
            .list_policy_configurations(project, kind.type_id())
            .await?;
        let existing_id = find_existing_policy(&existing, repository_id).and_then(|c| c.id);

        let configuration = assemble(kind, repository_id, branch, existing_id);
        match existing_id {
            Some(id) => {
                debug!(policy = %kind, id = id, "Updating existing policy");
                self.client
                    .update_policy_configuration(project, id, &configuration)
                    .await?;
                info!(
                    policy = %kind,
                    id = id,
                    repository_id = repository_id,
                    "Policy updated"
                );
                Ok(PolicyOutcome::Updated(id))
            }
            None => {
                let created = self
                    .client
                    .create_policy_configuration(project, &configuration)
                    .await?;
                let id = created.id.unwrap_or_default();
                info!(
                    policy = %kind,
                    id = id,
                    repository_id = repository_id,
                    "Policy created"
                );
                Ok(PolicyOutcome::Created(id))
            }
        }
    }

    /// Applies every `(kind, branch)` pair in order. The first failure stops the run.
    pub async fn apply_all(
        &self,
        project: &str,
        repository_id: &str,
        policies: &[(PolicyKind, Option<&str>)],
    ) -> ProvisioningResult<ApplyPoliciesResult> {
        let mut result = ApplyPoliciesResult::default();
        for (kind, branch) in policies {
            match self.apply(project, *kind, repository_id, *branch).await? {
                PolicyOutcome::Created(_) => result.created += 1,
                PolicyOutcome::Updated(_) => result.updated += 1,
            }
        }
        Ok(result)
    }
}
