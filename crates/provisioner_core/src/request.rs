//! Provisioning request types
//!
//! Queue messages are JSON objects whose `createType` field selects the kind of
//! request. They are decoded once into a [`ProvisioningRequest`] and treated as
//! immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ProvisioningError, ProvisioningResult};

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;

/// A decoded queue message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "createType")]
pub enum ProvisioningRequest {
    Project(ProjectRequest),
    Repository(RepositoryRequest),
}

impl ProvisioningRequest {
    /// Decodes a raw queue message.
    ///
    /// # Errors
    /// Returns `ProvisioningError::Decode` if the bytes are not a JSON object
    /// with a known `createType` and the fields that kind requires.
    pub fn decode(raw: &[u8]) -> ProvisioningResult<Self> {
        serde_json::from_slice(raw).map_err(|e| ProvisioningError::Decode(e.to_string()))
    }

    /// Id of the ticket that triggered the request.
    pub fn work_item_id(&self) -> u64 {
        match self {
            Self::Project(r) => r.work_item_id,
            Self::Repository(r) => r.work_item_id,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Project(_) => RequestKind::Project,
            Self::Repository(_) => RequestKind::Repository,
        }
    }

    pub fn requestor(&self) -> &str {
        match self {
            Self::Project(r) => &r.requestor,
            Self::Repository(r) => &r.requestor,
        }
    }
}

/// Kind of resource a request provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Project,
    Repository,
}

impl RequestKind {
    /// Value written to the ticket's `System.WorkItemType` field.
    pub fn work_item_type(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Repository => "Repository",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => write!(f, "project"),
            Self::Repository => write!(f, "repository"),
        }
    }
}

/// Request for a new project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub work_item_id: u64,
    pub project_name: String,
    #[serde(default)]
    pub project_description: String,
    #[serde(default)]
    pub data_owner1: String,
    #[serde(default)]
    pub data_owner2: Option<String>,
    #[serde(default)]
    pub requestor: String,
    #[serde(default)]
    pub cost_center: String,
    #[serde(default)]
    pub cost_center_manager: String,
}

impl ProjectRequest {
    /// Identifies the requested project across submissions of the same ticket.
    pub fn checkpoint_subject(&self) -> String {
        format!("project:{}", self.project_name.trim().to_lowercase())
    }
}

/// Request for a new repository inside an already provisioned project.
///
/// `project_name` is the base name of the parent project and `azp_id` its
/// allocated identifier. The remaining project fields are carried over from
/// the ticket form but not used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRequest {
    pub work_item_id: u64,
    pub project_name: String,
    #[serde(default)]
    pub repository_name: String,
    #[serde(rename = "azp_Id")]
    pub azp_id: u32,
    #[serde(default)]
    pub requestor: String,
    #[serde(default)]
    pub project_description: Option<String>,
    #[serde(default)]
    pub data_owner1: Option<String>,
    #[serde(default)]
    pub data_owner2: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default)]
    pub cost_center_manager: Option<String>,
}

impl RepositoryRequest {
    /// Identifies the requested repository across submissions of the same ticket.
    pub fn checkpoint_subject(&self) -> String {
        format!(
            "repository:{}/{}",
            self.azp_id,
            self.repository_name.trim().to_lowercase()
        )
    }
}
