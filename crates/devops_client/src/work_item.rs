//! JSON patch documents for work item updates.

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "work_item_tests.rs"]
mod tests;

/// Field reference names used by the provisioner.
pub mod fields {
    pub const WORK_ITEM_TYPE: &str = "System.WorkItemType";
    pub const STATE: &str = "System.State";
    pub const TITLE: &str = "System.Title";
    pub const AZP_ID: &str = "Custom.AZP_ID";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOperation {
    Add,
    Replace,
    Remove,
    Test,
}

/// One operation of a `application/json-patch+json` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonPatchOperation {
    pub op: PatchOperation,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl JsonPatchOperation {
    /// Sets a work item field, creating it if needed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use devops_client::work_item::{fields, JsonPatchOperation};
    ///
    /// let op = JsonPatchOperation::set_field(fields::STATE, "Provisioned");
    /// assert_eq!(op.path, "/fields/System.State");
    /// ```
    pub fn set_field(field: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            op: PatchOperation::Add,
            path: format!("/fields/{}", field),
            value: Some(value.into()),
        }
    }
}
