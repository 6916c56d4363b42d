//! Error types for the provisioning workflow.
//!
//! [`ValidationError`] covers problems with the request itself and is safe to
//! show to the requestor. [`ProvisioningError`] is the top level error of every
//! workflow step. Its [`ErrorCategory`] decides how the ticket is updated when
//! the step fails.

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Problems found in a decoded request before any remote change is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Project name '{name}' is invalid: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("'{value}' is not a valid e-mail address")]
    InvalidEmail { value: String },

    #[error("Project name '{name}' is already used by project '{existing}'")]
    DuplicateName { name: String, existing: String },

    #[error("Required field '{field}' is missing or empty")]
    MissingField { field: String },

    #[error("Parent project '{name}' was not found")]
    ParentProjectNotFound { name: String },
}

impl ValidationError {
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_email(value: impl Into<String>) -> Self {
        Self::InvalidEmail {
            value: value.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// How a failure is reported back to the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request was rejected. The reason is shown to the requestor.
    Validation,
    /// The platform reported a terminal failure for a remote operation.
    Terminal,
    /// Anything else. Details are logged but not shown to the requestor.
    Unexpected,
}

/// Errors raised while provisioning a project or repository.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Request validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Queue message could not be decoded: {0}")]
    Decode(String),

    #[error("Project creation operation {operation_id} failed: {message}")]
    OperationFailed {
        operation_id: String,
        message: String,
    },

    #[error("Project creation operation {operation_id} was cancelled")]
    OperationCancelled { operation_id: String },

    #[error("Project creation operation {operation_id} did not finish within {waited_secs} seconds")]
    OperationTimedOut {
        operation_id: String,
        waited_secs: u64,
    },

    #[error("Policy type '{0}' is not supported")]
    UnsupportedPolicy(String),

    #[error("Built-in group '{0}' does not exist in the project")]
    MissingBuiltinGroup(String),

    #[error("Identity '{group}' was not found in scope '{scope}'")]
    MissingIdentity { scope: String, group: String },

    #[error("Default branch '{0}' was not found after the initial commit")]
    DefaultBranchNotFound(String),

    #[error("Branch '{branch}' could not be created: {status}")]
    BranchCreationFailed { branch: String, status: String },

    #[error("Project '{0}' could not be found after it was created")]
    ProjectNotResolved(String),

    #[error("No project id is left after {last}")]
    IdSpaceExhausted { last: u32 },

    #[error("Azure DevOps request failed: {0}")]
    Remote(#[from] devops_client::Error),

    #[error("Checkpoint store failure: {0}")]
    Checkpoint(String),

    #[error("Dead-letter sink failure: {0}")]
    DeadLetter(String),
}

impl ProvisioningError {
    /// Returns the reporting category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::Decode(_) => ErrorCategory::Validation,
            Self::OperationFailed { .. }
            | Self::OperationCancelled { .. }
            | Self::OperationTimedOut { .. } => ErrorCategory::Terminal,
            _ => ErrorCategory::Unexpected,
        }
    }
}

/// Result alias used by every provisioning step.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;
