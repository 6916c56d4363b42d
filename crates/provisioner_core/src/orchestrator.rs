//! Provisioning workflow.
//!
//! [`Provisioner::handle_message`] takes one raw queue message through the
//! whole workflow:
//!
//! 1. decode the message into a [`ProvisioningRequest`];
//! 2. validate it against the existing projects;
//! 3. for a project, allocate an identifier, create the project and build its
//!    group hierarchy;
//! 4. for a repository, build the compliant repository in the parent project;
//! 5. mark the ticket `Provisioned`.
//!
//! Any failure dead-letters the original message and marks the ticket `Error`.
//! Completed steps are checkpointed per ticket, so re-submitting a failed
//! message continues from the last completed step.

use devops_client::{DevOpsClient, Project};
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Span};

use crate::checkpoint::{CheckpointRecorder, CheckpointStep, CheckpointStore};
use crate::compliance::RepositoryComplianceBuilder;
use crate::dead_letter::DeadLetterSink;
use crate::errors::ErrorCategory;
use crate::groups::GroupHierarchyBuilder;
use crate::project::{PollSettings, ProjectProvisioner};
use crate::reporter::TicketReporter;
use crate::request::{ProjectRequest, ProvisioningRequest, RepositoryRequest, RequestKind};
use crate::validation::{validate_project_request, validate_repository_request};
use crate::{IdAllocator, ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

/// Settings of the provisioning workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerSettings {
    /// Process template used for new projects.
    pub process_template_id: String,
    pub poll: PollSettings,
}

/// Final outcome of a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Provisioned {
        work_item_id: u64,
        kind: RequestKind,
        /// Project name for project requests, repository name for repository requests.
        name: String,
    },
    DeadLettered {
        /// `None` when the message could not be decoded.
        work_item_id: Option<u64>,
        category: ErrorCategory,
        reason: String,
    },
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Provisioned { .. })
    }
}

/// Runs provisioning requests end to end.
pub struct Provisioner {
    client: Arc<dyn DevOpsClient>,
    allocator: Arc<IdAllocator>,
    checkpoints: Arc<dyn CheckpointStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    projects: ProjectProvisioner,
    groups: GroupHierarchyBuilder,
    compliance: RepositoryComplianceBuilder,
    reporter: TicketReporter,
}

impl Provisioner {
    pub fn new(
        client: Arc<dyn DevOpsClient>,
        allocator: Arc<IdAllocator>,
        checkpoints: Arc<dyn CheckpointStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        settings: ProvisionerSettings,
    ) -> Self {
        Self {
            projects: ProjectProvisioner::new(
                client.clone(),
                settings.poll,
                &settings.process_template_id,
            ),
            groups: GroupHierarchyBuilder::new(client.clone()),
            compliance: RepositoryComplianceBuilder::new(client.clone()),
            reporter: TicketReporter::new(client.clone()),
            client,
            allocator,
            checkpoints,
            dead_letters,
        }
    }

    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    /// Seeds the identifier allocator from the projects that currently exist.
    ///
    /// # Errors
    /// Returns `ProvisioningError::Remote` if the projects cannot be listed.
    pub async fn seed_allocator(&self) -> ProvisioningResult<u32> {
        let projects = self.client.list_projects().await?;
        Ok(self.allocator.seed_from_projects(&projects))
    }

    /// Processes one raw queue message.
    ///
    /// Never fails: every error ends in the dead-letter sink and, when the
    /// message identifies a ticket, in an `Error` ticket state.
    #[instrument(skip(self, raw), fields(work_item_id = tracing::field::Empty, kind = tracing::field::Empty))]
    pub async fn handle_message(&self, raw: &[u8]) -> ProcessOutcome {
        let request = match ProvisioningRequest::decode(raw) {
            Ok(request) => request,
            Err(e) => return self.route_failure(raw, None, e).await,
        };

        let work_item_id = request.work_item_id();
        Span::current().record("work_item_id", work_item_id);
        Span::current().record("kind", tracing::field::display(request.kind()));
        info!("Processing provisioning request");

        let result = match &request {
            ProvisioningRequest::Project(r) => self.handle_project(r).await,
            ProvisioningRequest::Repository(r) => self.handle_repository(r).await,
        };

        match result {
            Ok(name) => {
                info!(name = %name, "Provisioning request completed");
                ProcessOutcome::Provisioned {
                    work_item_id,
                    kind: request.kind(),
                    name,
                }
            }
            Err(e) => self.route_failure(raw, Some(work_item_id), e).await,
        }
    }

    async fn handle_project(&self, request: &ProjectRequest) -> ProvisioningResult<String> {
        let mut recorder = CheckpointRecorder::load(
            self.checkpoints.clone(),
            request.work_item_id,
            &request.checkpoint_subject(),
        )
        .await?;

        let (azp_id, project) = match recorder.checkpoint().resolved_project() {
            Some((azp_id, project_id, project_name)) => {
                info!(
                    azp_id = %azp_id,
                    project = project_name,
                    "Project was created by an earlier run"
                );
                let project = Project {
                    id: project_id.to_string(),
                    name: project_name.to_string(),
                    description: None,
                    state: None,
                };
                (azp_id, project)
            }
            None => {
                let existing = self.client.list_projects().await?;
                let base_name = validate_project_request(request, &existing)?;
                let azp_id = self.allocator.next()?;
                let name = azp_id.project_name(&base_name);
                info!(azp_id = %azp_id, project = %name, "Allocated project id");

                let project = self
                    .projects
                    .provision(&name, &request.project_description)
                    .await?;
                recorder
                    .record(CheckpointStep::ProjectResolved {
                        azp_id,
                        project_id: project.id.clone(),
                        project_name: project.name.clone(),
                    })
                    .await?;
                (azp_id, project)
            }
        };

        if !recorder.is_done(&CheckpointStep::GroupsCreated) {
            let groups = self.groups.build(&project, azp_id).await?;
            info!(
                created = groups.created.len(),
                existing = groups.existing.len(),
                "Group hierarchy in place"
            );
            recorder.record(CheckpointStep::GroupsCreated).await?;
        }

        self.reporter
            .report_project_success(request.work_item_id, &request.requestor, &project.name, azp_id)
            .await?;
        Ok(project.name)
    }

    async fn handle_repository(&self, request: &RepositoryRequest) -> ProvisioningResult<String> {
        let existing = self.client.list_projects().await?;
        let parent = validate_repository_request(request, &existing)?;
        let repository_name = request.repository_name.trim();

        let mut recorder = CheckpointRecorder::load(
            self.checkpoints.clone(),
            request.work_item_id,
            &request.checkpoint_subject(),
        )
        .await?;
        let repository = self
            .compliance
            .build(&parent, repository_name, &mut recorder)
            .await?;

        self.reporter
            .report_repository_success(request.work_item_id, &request.requestor, &repository.name)
            .await?;
        Ok(repository.name)
    }

    async fn route_failure(
        &self,
        raw: &[u8],
        work_item_id: Option<u64>,
        error: ProvisioningError,
    ) -> ProcessOutcome {
        let category = error.category();
        match category {
            ErrorCategory::Validation => {
                warn!(error_message = %error, "Provisioning request rejected")
            }
            ErrorCategory::Terminal | ErrorCategory::Unexpected => {
                error!(error_message = %error, "Provisioning request failed")
            }
        }

        if let Err(e) = self.dead_letters.send(raw).await {
            error!(error_message = %e, "Failed to dead-letter message");
        }

        if let Some(id) = work_item_id {
            if let Err(e) = self.reporter.report_failure(id, &error).await {
                error!(
                    work_item_id = id,
                    error_message = %e,
                    "Failed to mark ticket as errored"
                );
            }
        }

        ProcessOutcome::DeadLettered {
            work_item_id,
            category,
            reason: error.to_string(),
        }
    }
}
