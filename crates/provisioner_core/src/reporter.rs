//! Ticket status updates.
//!
//! The ticket that triggered a request always ends up either `Provisioned` or
//! `Error`, with a comment explaining the outcome to the requestor.

use devops_client::work_item::fields;
use devops_client::{DevOpsClient, JsonPatchOperation};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::errors::ErrorCategory;
use crate::names::AzpId;
use crate::request::RequestKind;
use crate::{ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "reporter_tests.rs"]
mod tests;

pub const STATE_PROVISIONED: &str = "Provisioned";
pub const STATE_ERROR: &str = "Error";

const INTERNAL_ERROR_COMMENT: &str =
    "Provisioning failed due to an internal error. Please contact the platform team.";

/// Comment appended to a ticket whose request succeeded.
pub fn success_comment(requestor: &str, kind: RequestKind, name: &str) -> String {
    format!("Hello {}, {} {} has been provisioned.", requestor, kind, name)
}

/// Comment appended to a ticket whose request failed.
///
/// Only validation and remote operation failures are described. Other errors
/// may carry internal detail and get a generic text.
pub fn failure_comment(error: &ProvisioningError) -> String {
    match error.category() {
        ErrorCategory::Validation => match error {
            ProvisioningError::Validation(inner) => format!("Provisioning rejected: {}", inner),
            other => format!("Provisioning rejected: {}", other),
        },
        ErrorCategory::Terminal => format!("Provisioning failed: {}", error),
        ErrorCategory::Unexpected => INTERNAL_ERROR_COMMENT.to_string(),
    }
}

/// Writes provisioning outcomes to tickets.
pub struct TicketReporter {
    client: Arc<dyn DevOpsClient>,
}

impl TicketReporter {
    pub fn new(client: Arc<dyn DevOpsClient>) -> Self {
        Self { client }
    }

    /// Marks a project ticket as provisioned and records the allocated identifier.
    #[instrument(skip(self, requestor, azp_id), fields(azp_id = %azp_id))]
    pub async fn report_project_success(
        &self,
        work_item_id: u64,
        requestor: &str,
        project_name: &str,
        azp_id: AzpId,
    ) -> ProvisioningResult<()> {
        let operations = vec![
            JsonPatchOperation::set_field(
                fields::WORK_ITEM_TYPE,
                RequestKind::Project.work_item_type(),
            ),
            JsonPatchOperation::set_field(fields::STATE, STATE_PROVISIONED),
            JsonPatchOperation::set_field(fields::TITLE, project_name),
            JsonPatchOperation::set_field(fields::AZP_ID, azp_id.value()),
        ];
        self.client.patch_work_item(work_item_id, &operations).await?;
        self.client
            .add_work_item_comment(
                work_item_id,
                &success_comment(requestor, RequestKind::Project, project_name),
            )
            .await?;

        info!("Ticket marked as provisioned");
        Ok(())
    }

    /// Marks a repository ticket as provisioned.
    #[instrument(skip(self, requestor))]
    pub async fn report_repository_success(
        &self,
        work_item_id: u64,
        requestor: &str,
        repository_name: &str,
    ) -> ProvisioningResult<()> {
        let operations = vec![
            JsonPatchOperation::set_field(
                fields::WORK_ITEM_TYPE,
                RequestKind::Repository.work_item_type(),
            ),
            JsonPatchOperation::set_field(fields::STATE, STATE_PROVISIONED),
        ];
        self.client.patch_work_item(work_item_id, &operations).await?;
        self.client
            .add_work_item_comment(
                work_item_id,
                &success_comment(requestor, RequestKind::Repository, repository_name),
            )
            .await?;

        info!("Ticket marked as provisioned");
        Ok(())
    }

    /// Marks a ticket as errored and explains why.
    #[instrument(skip(self, error))]
    pub async fn report_failure(
        &self,
        work_item_id: u64,
        error: &ProvisioningError,
    ) -> ProvisioningResult<()> {
        let operations = vec![JsonPatchOperation::set_field(fields::STATE, STATE_ERROR)];
        self.client.patch_work_item(work_item_id, &operations).await?;
        self.client
            .add_work_item_comment(work_item_id, &failure_comment(error))
            .await?;

        info!("Ticket marked as errored");
        Ok(())
    }
}
