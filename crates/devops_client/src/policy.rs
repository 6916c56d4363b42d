//! Policy configuration payloads.
//!
//! The same struct is used to read existing configurations and to send create
//! or update requests. Create requests carry `revision` and `isDeleted`, update
//! requests carry the configuration `id` instead. Settings are a flat struct of
//! optional fields because each policy type uses a different subset.

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;

/// A policy configuration as stored by the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,

    #[serde(default)]
    pub is_blocking: bool,

    #[serde(default)]
    pub is_enabled: bool,

    #[serde(rename = "type")]
    pub policy_type: PolicyTypeRef,

    #[serde(default)]
    pub settings: PolicySettings,
}

impl PolicyConfiguration {
    /// Returns true if any scope entry of this configuration targets `repository_id`.
    pub fn applies_to_repository(&self, repository_id: &str) -> bool {
        self.settings
            .scope
            .iter()
            .any(|s| s.repository_id.as_deref() == Some(repository_id))
    }
}

/// Reference to a policy type by its platform id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyTypeRef {
    pub id: String,
}

/// Settings of a policy configuration. Only the fields relevant to the policy type are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_approver_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_vote_counts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_downvotes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_last_pusher_vote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_vote_on_last_iteration: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_on_source_push: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_rejections_on_source_push: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_consistent_case: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_path_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_git_blob_size_in_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_uncompressed_size: Option<bool>,
    #[serde(default)]
    pub scope: Vec<PolicyScope>,
}

/// Scope entry of a policy: a repository, optionally narrowed to a ref.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyScope {
    #[serde(default)]
    pub repository_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<String>,
}

impl PolicyScope {
    /// Scope covering a whole repository.
    pub fn repository(repository_id: &str) -> Self {
        Self {
            repository_id: Some(repository_id.to_string()),
            ref_name: None,
            match_kind: None,
        }
    }

    /// Scope covering every branch below `refs/heads/{branch}` in a repository.
    pub fn branch_prefix(repository_id: &str, branch: &str) -> Self {
        Self {
            repository_id: Some(repository_id.to_string()),
            ref_name: Some(format!("refs/heads/{}", branch)),
            match_kind: Some("Prefix".to_string()),
        }
    }
}
