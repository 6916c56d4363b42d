//! Remote project creation.
//!
//! Creating a project on the platform is asynchronous: the create call returns
//! an operation handle which has to be polled until it reaches a terminal
//! status. [`ProjectProvisioner`] drives that state machine and resolves the
//! final project once the operation has succeeded.

use devops_client::{DevOpsClient, OperationReference, OperationStatus, Project, ProjectCreatePayload};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::{ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;

/// Default delay between two operation status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default upper bound on how long an operation is polled.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

/// Settings of the operation poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` polls until the platform reports a terminal status.
    pub max_wait: Option<Duration>,
}

impl PollSettings {
    /// Builds settings from whole seconds. A `max_wait_secs` of zero means unbounded.
    pub fn from_secs(interval_secs: u64, max_wait_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            max_wait: (max_wait_secs > 0).then(|| Duration::from_secs(max_wait_secs)),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: Some(DEFAULT_MAX_WAIT),
        }
    }
}

/// States of a project creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectState {
    Requested,
    OperationPending { operation_id: String },
    Succeeded { operation_id: String },
    Failed { operation_id: String, message: String },
    Cancelled { operation_id: String },
    TimedOut { operation_id: String, waited: Duration },
}

impl ProjectState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Requested | Self::OperationPending { .. })
    }
}

/// Computes the state that follows a poll of `operation`.
///
/// A terminal status always wins over the time limit, so an operation that
/// succeeds on the last allowed poll is still reported as succeeded.
pub fn next_state(
    operation: &OperationReference,
    elapsed: Duration,
    max_wait: Option<Duration>,
) -> ProjectState {
    let operation_id = operation.id.clone();
    match operation.status {
        OperationStatus::Succeeded => ProjectState::Succeeded { operation_id },
        OperationStatus::Failed => ProjectState::Failed {
            operation_id,
            message: operation
                .result_message
                .clone()
                .unwrap_or_else(|| "no detail reported".to_string()),
        },
        OperationStatus::Cancelled => ProjectState::Cancelled { operation_id },
        _ => match max_wait {
            Some(limit) if elapsed >= limit => ProjectState::TimedOut {
                operation_id,
                waited: elapsed,
            },
            _ => ProjectState::OperationPending { operation_id },
        },
    }
}

/// Creates projects and waits for them to become available.
pub struct ProjectProvisioner {
    client: Arc<dyn DevOpsClient>,
    poll: PollSettings,
    process_template_id: String,
}

impl ProjectProvisioner {
    pub fn new(client: Arc<dyn DevOpsClient>, poll: PollSettings, process_template_id: &str) -> Self {
        Self {
            client,
            poll,
            process_template_id: process_template_id.to_string(),
        }
    }

    /// Creates the project `name` and returns it once the platform has finished creating it.
    ///
    /// # Errors
    /// - `ProvisioningError::OperationFailed`, `OperationCancelled` or
    ///   `OperationTimedOut` when the creation operation does not succeed.
    /// - `ProvisioningError::ProjectNotResolved` when the project cannot be
    ///   found by name after the operation succeeded.
    /// - `ProvisioningError::Remote` for any failing platform call.
    #[instrument(skip(self, description), fields(project = name))]
    pub async fn provision(&self, name: &str, description: &str) -> ProvisioningResult<Project> {
        let payload = ProjectCreatePayload::git(name, description, &self.process_template_id);
        let operation = self.client.create_project(&payload).await?;
        info!(operation_id = %operation.id, "Project creation requested");

        let started = Instant::now();
        loop {
            let status = self.client.get_operation_status(&operation.id).await?;
            match next_state(&status, started.elapsed(), self.poll.max_wait) {
                ProjectState::Succeeded { .. } => break,
                ProjectState::Failed {
                    operation_id,
                    message,
                } => {
                    warn!(operation_id = %operation_id, message = %message, "Project creation failed");
                    return Err(ProvisioningError::OperationFailed {
                        operation_id,
                        message,
                    });
                }
                ProjectState::Cancelled { operation_id } => {
                    warn!(operation_id = %operation_id, "Project creation cancelled");
                    return Err(ProvisioningError::OperationCancelled { operation_id });
                }
                ProjectState::TimedOut {
                    operation_id,
                    waited,
                } => {
                    warn!(
                        operation_id = %operation_id,
                        waited_secs = waited.as_secs(),
                        "Gave up waiting for project creation"
                    );
                    return Err(ProvisioningError::OperationTimedOut {
                        operation_id,
                        waited_secs: waited.as_secs(),
                    });
                }
                ProjectState::Requested | ProjectState::OperationPending { .. } => {
                    debug!(
                        operation_id = %operation.id,
                        status = %status.status,
                        "Project creation still pending"
                    );
                    tokio::time::sleep(self.poll.interval).await;
                }
            }
        }

        let project = self
            .client
            .get_project_by_name(name)
            .await?
            .ok_or_else(|| ProvisioningError::ProjectNotResolved(name.to_string()))?;

        info!(project_id = %project.id, "Project created");
        Ok(project)
    }
}
