//! Security group hierarchy of a provisioned project.
//!
//! Every project gets six groups named after its allocated identifier. Each
//! group is created as a member of one or more of the project's built-in
//! groups, which is how it inherits permissions. Some built-in administrator
//! groups only exist once the matching feature has been used in the project,
//! so the builder first creates and deletes a throwaway service endpoint,
//! deployment group and release definition.

use devops_client::{DevOpsClient, GraphGroup, GroupCreatePayload, Project};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::names::AzpId;
use crate::{ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "groups_tests.rs"]
mod tests;

pub const READERS: &str = "Readers";
pub const CONTRIBUTORS: &str = "Contributors";
pub const PROJECT_ADMINISTRATORS: &str = "Project Administrators";
pub const BUILD_ADMINISTRATORS: &str = "Build Administrators";
pub const ENDPOINT_ADMINISTRATORS: &str = "Endpoint Administrators";
pub const DEPLOYMENT_GROUP_ADMINISTRATORS: &str = "Deployment Group Administrators";
pub const RELEASE_ADMINISTRATORS: &str = "Release Administrators";

/// The groups created for every project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupRole {
    Consumer,
    MaintainerDeveloper,
    MaintainerAdministrator,
    MaintainerDeployer,
    InfraDeveloper,
    InfraAdministrator,
}

impl GroupRole {
    pub const ALL: [GroupRole; 6] = [
        Self::Consumer,
        Self::MaintainerDeveloper,
        Self::MaintainerAdministrator,
        Self::MaintainerDeployer,
        Self::InfraDeveloper,
        Self::InfraAdministrator,
    ];

    /// Part of the display name that follows the `AZG-NNN_` prefix.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Consumer => "Proj_Consumer",
            Self::MaintainerDeveloper => "ProjMaint_Developer",
            Self::MaintainerAdministrator => "ProjMaint_Administrator",
            Self::MaintainerDeployer => "ProjMaint_Deployer",
            Self::InfraDeveloper => "InfraMaint_Developer",
            Self::InfraAdministrator => "InfraMaint_Administrator",
        }
    }

    /// Built-in groups the role is a member of.
    pub fn builtin_parents(&self) -> &'static [&'static str] {
        match self {
            Self::Consumer => &[READERS],
            Self::MaintainerDeveloper => &[CONTRIBUTORS],
            Self::MaintainerAdministrator => &[PROJECT_ADMINISTRATORS],
            Self::MaintainerDeployer => &[BUILD_ADMINISTRATORS],
            Self::InfraDeveloper => &[ENDPOINT_ADMINISTRATORS, DEPLOYMENT_GROUP_ADMINISTRATORS],
            Self::InfraAdministrator => &[
                ENDPOINT_ADMINISTRATORS,
                DEPLOYMENT_GROUP_ADMINISTRATORS,
                BUILD_ADMINISTRATORS,
                RELEASE_ADMINISTRATORS,
            ],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Consumer => "Read access to the project",
            Self::MaintainerDeveloper => "Developers maintaining the project",
            Self::MaintainerAdministrator => "Administrators of the project",
            Self::MaintainerDeployer => "Members allowed to manage builds",
            Self::InfraDeveloper => "Developers maintaining the project infrastructure",
            Self::InfraAdministrator => "Administrators of the project infrastructure",
        }
    }

    pub fn display_name(&self, azp_id: AzpId) -> String {
        azp_id.group_name(self.suffix())
    }
}

/// Outcome of building the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupHierarchy {
    /// Display names of groups created by this run.
    pub created: Vec<String>,
    /// Display names of groups that already existed.
    pub existing: Vec<String>,
}

/// Creates the security groups of a project.
pub struct GroupHierarchyBuilder {
    client: Arc<dyn DevOpsClient>,
}

impl GroupHierarchyBuilder {
    pub fn new(client: Arc<dyn DevOpsClient>) -> Self {
        Self { client }
    }

    /// Creates the six role groups of `project`.
    ///
    /// Groups that already exist are left alone. Every built-in parent group
    /// is checked before the first group is created.
    ///
    /// # Errors
    /// - `ProvisioningError::MissingBuiltinGroup` when a parent group is absent.
    /// - `ProvisioningError::Remote` for any failing platform call. Groups
    ///   created before the failure are kept.
    #[instrument(skip(self, project, azp_id), fields(project = %project.name, azp_id = %azp_id))]
    pub async fn build(&self, project: &Project, azp_id: AzpId) -> ProvisioningResult<GroupHierarchy> {
        self.seed_builtin_groups(project).await?;

        let scope = self.client.get_scope_descriptor(&project.id).await?;
        let groups = self.client.list_groups(&scope).await?;
        let index: HashMap<&str, &GraphGroup> = groups
            .iter()
            .map(|g| (g.display_name.as_str(), g))
            .collect();
        debug!(count = index.len(), "Indexed project groups");

        let mut plan = Vec::with_capacity(GroupRole::ALL.len());
        for role in GroupRole::ALL {
            let parents = role
                .builtin_parents()
                .iter()
                .map(|name| {
                    index
                        .get(name)
                        .map(|g| g.descriptor.clone())
                        .ok_or_else(|| ProvisioningError::MissingBuiltinGroup(name.to_string()))
                })
                .collect::<ProvisioningResult<Vec<String>>>()?;
            plan.push((role, parents));
        }

        let mut result = GroupHierarchy::default();
        for (role, parents) in plan {
            let display_name = role.display_name(azp_id);
            if index.contains_key(display_name.as_str()) {
                debug!(group = %display_name, "Group already exists");
                result.existing.push(display_name);
                continue;
            }

            let payload = GroupCreatePayload {
                display_name: display_name.clone(),
                description: role.description().to_string(),
            };
            self.client.create_group(&scope, &payload, &parents).await?;
            info!(group = %display_name, parents = parents.len(), "Group created");
            result.created.push(display_name);
        }

        Ok(result)
    }

    async fn seed_builtin_groups(&self, project: &Project) -> ProvisioningResult<()> {
        self.client
            .trigger_endpoint_group_seed(&project.id, &project.name)
            .await?;
        self.client.trigger_deployment_group_seed(&project.id).await?;
        self.client.trigger_release_group_seed(&project.id).await?;
        debug!("Seeded built-in administrator groups");
        Ok(())
    }
}
