//! # Models
//!
//! Typed request and response bodies for the subset of the Azure DevOps REST API
//! used by the provisioner.
//!
//! Responses are deserialized into these structs rather than walked as dynamic
//! JSON documents. Fields the platform may omit are `Option`s or carry a serde
//! default, so a missing field surfaces as `None` instead of a parse failure.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;

/// Object id used by git to signal "no previous commit" in ref updates.
pub const EMPTY_OBJECT_ID: &str = "0000000000000000000000000000000000000000";

/// The list envelope Azure DevOps wraps around collection responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// A team project as returned by the core projects API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Reference to a project by id, used inside other payloads.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of the create-project call.
///
/// # Examples
///
/// ```rust
/// use devops_client::models::ProjectCreatePayload;
///
/// let payload = ProjectCreatePayload::git(
///     "AZP-001_Contoso",
///     "Contoso services",
///     "6b724908-ef14-45cf-84f8-768b5384da45",
/// );
/// assert_eq!(payload.capabilities.versioncontrol.source_control_type, "Git");
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreatePayload {
    pub name: String,
    pub description: String,
    pub capabilities: ProjectCapabilities,
}

impl ProjectCreatePayload {
    /// Creates a payload for a Git backed project using the given process template.
    pub fn git(name: &str, description: &str, process_template_id: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            capabilities: ProjectCapabilities {
                versioncontrol: VersionControlCapability {
                    source_control_type: "Git".to_string(),
                },
                process_template: ProcessTemplateCapability {
                    template_type_id: process_template_id.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCapabilities {
    pub versioncontrol: VersionControlCapability,
    pub process_template: ProcessTemplateCapability,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionControlCapability {
    pub source_control_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTemplateCapability {
    pub template_type_id: String,
}

/// Status of a long running platform operation.
///
/// Unknown status strings map to [`OperationStatus::Unknown`] so that a new
/// platform state keeps the poll loop going instead of failing to parse.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotSet,
    Queued,
    InProgress,
    Cancelled,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    /// Returns true for the states after which the platform no longer changes the operation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            OperationStatus::NotSet => "notSet",
            OperationStatus::Queued => "queued",
            OperationStatus::InProgress => "inProgress",
            OperationStatus::Cancelled => "cancelled",
            OperationStatus::Succeeded => "succeeded",
            OperationStatus::Failed => "failed",
            OperationStatus::Unknown => "unknown",
        };
        write!(f, "{}", text)
    }
}

/// Handle to an asynchronous operation, returned by project creation and status polls.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationReference {
    pub id: String,
    pub status: OperationStatus,
    #[serde(default)]
    pub url: Option<String>,
    /// Failure detail reported by the platform for failed operations.
    #[serde(default)]
    pub result_message: Option<String>,
}

/// An identity found through the identities search API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub descriptor: String,
    #[serde(default)]
    pub provider_display_name: Option<String>,
}

/// A git repository.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRepository {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub project: Option<ProjectReference>,
}

/// Body of the create-repository call.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryCreatePayload {
    pub name: String,
    pub project: ProjectReference,
}

impl RepositoryCreatePayload {
    pub fn new(project_id: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            project: ProjectReference {
                id: project_id.to_string(),
                name: None,
            },
        }
    }
}

/// A git ref (branch head) with the commit it points to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRef {
    pub name: String,
    pub object_id: String,
}

/// A single ref update, used to create branches.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRefUpdate {
    pub name: String,
    pub old_object_id: String,
    pub new_object_id: String,
}

impl GitRefUpdate {
    /// Creates a ref update that adds `refs/heads/{branch}` pointing at `object_id`.
    pub fn create_branch(branch: &str, object_id: &str) -> Self {
        Self {
            name: format!("refs/heads/{}", branch),
            old_object_id: EMPTY_OBJECT_ID.to_string(),
            new_object_id: object_id.to_string(),
        }
    }
}

/// Outcome the platform reports for each ref update.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RefUpdateStatus {
    Succeeded,
    ForcePushRequired,
    StaleOldObjectId,
    InvalidRefName,
    RefNameConflict,
    CreateBranchPermissionRequired,
    RejectedByPolicy,
    Locked,
    #[serde(other)]
    Other,
}

/// Result of a single ref update.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRefUpdateResult {
    pub name: String,
    #[serde(default)]
    pub success: bool,
    pub update_status: RefUpdateStatus,
    #[serde(default)]
    pub new_object_id: Option<String>,
}

impl GitRefUpdateResult {
    /// Returns true if the ref already existed, which happens when a branch is re-created.
    pub fn already_exists(&self) -> bool {
        matches!(
            self.update_status,
            RefUpdateStatus::StaleOldObjectId | RefUpdateStatus::RefNameConflict
        )
    }
}

/// Body of the pushes API.
///
/// Only the shape needed for a bootstrap commit is modelled: a set of ref
/// updates and commits that add files with raw text content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitPush {
    pub ref_updates: Vec<GitPushRefUpdate>,
    pub commits: Vec<GitCommit>,
}

impl GitPush {
    /// Creates a push that adds a single file as the first commit on `branch`.
    pub fn initial(branch: &str, path: &str, content: &str, comment: &str) -> Self {
        Self {
            ref_updates: vec![GitPushRefUpdate {
                name: format!("refs/heads/{}", branch),
                old_object_id: EMPTY_OBJECT_ID.to_string(),
            }],
            commits: vec![GitCommit {
                comment: comment.to_string(),
                changes: vec![GitChange {
                    change_type: "add".to_string(),
                    item: GitItem {
                        path: path.to_string(),
                    },
                    new_content: ItemContent {
                        content: content.to_string(),
                        content_type: "rawtext".to_string(),
                    },
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitPushRefUpdate {
    pub name: String,
    pub old_object_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitCommit {
    pub comment: String,
    pub changes: Vec<GitChange>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitChange {
    pub change_type: String,
    pub item: GitItem,
    pub new_content: ItemContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitItem {
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemContent {
    pub content: String,
    pub content_type: String,
}

/// Response of the pushes API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitPushResult {
    #[serde(default)]
    pub push_id: Option<u64>,
    #[serde(default)]
    pub commits: Vec<GitCommitRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitCommitRef {
    pub commit_id: String,
}

/// Response of the graph descriptors API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GraphDescriptor {
    pub value: String,
}

/// A security group as returned by the graph API.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphGroup {
    pub descriptor: String,
    pub display_name: String,
    #[serde(default)]
    pub principal_name: Option<String>,
    #[serde(default)]
    pub origin_id: Option<String>,
}

/// Body of the create-group call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCreatePayload {
    pub display_name: String,
    pub description: String,
}

/// Identifier of a resource created only to be deleted again.
///
/// Service endpoints use GUID ids while deployment groups and release
/// definitions use integers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResourceId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Number(n) => write!(f, "{}", n),
            ResourceId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CreatedResource {
    pub id: ResourceId,
}

/// A work item as returned after a patch.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WorkItem {
    pub id: u64,
    #[serde(default)]
    pub rev: Option<u64>,
}

/// A comment appended to a work item.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemComment {
    #[serde(default)]
    pub id: Option<u64>,
    pub text: String,
}
