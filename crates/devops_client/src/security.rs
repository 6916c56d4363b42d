//! Access control entry payloads for the security namespaces API.
//!
//! Azure DevOps stores git permissions as access control entries (ACEs) in the
//! git repositories security namespace. Each entry binds an allow mask and a deny
//! mask to a principal descriptor under a security token.

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "security_tests.rs"]
mod tests;

/// Id of the security namespace that holds git repository permissions.
pub const GIT_SECURITY_NAMESPACE: &str = "2e9eb7ed-3c0a-47d4-87c1-0ffdd275fd87";

/// Body of the set-access-control-entries call.
///
/// `merge` is always sent as `true` so that the entry is merged into any
/// existing entry for the same descriptor instead of replacing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlEntryPayload {
    pub token: String,
    pub merge: bool,
    pub access_control_entries: Vec<AccessControlEntry>,
}

impl AccessControlEntryPayload {
    /// Creates a merging payload holding a single entry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use devops_client::security::AccessControlEntryPayload;
    ///
    /// let payload = AccessControlEntryPayload::single("repoV2/p/r", "vssgp.abc", 0, 16);
    /// assert!(payload.merge);
    /// assert_eq!(payload.access_control_entries[0].deny, 16);
    /// ```
    pub fn single(token: &str, descriptor: &str, allow: u64, deny: u64) -> Self {
        Self {
            token: token.to_string(),
            merge: true,
            access_control_entries: vec![AccessControlEntry::new(descriptor, allow, deny)],
        }
    }
}

/// A single access control entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlEntry {
    pub descriptor: String,
    pub allow: u64,
    pub deny: u64,
    pub extended_info: AceExtendedInfo,
}

impl AccessControlEntry {
    pub fn new(descriptor: &str, allow: u64, deny: u64) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            allow,
            deny,
            extended_info: AceExtendedInfo {
                effective_allow: allow,
                effective_deny: deny,
                inherited_allow: allow,
                inherited_deny: deny,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AceExtendedInfo {
    pub effective_allow: u64,
    pub effective_deny: u64,
    pub inherited_allow: u64,
    pub inherited_deny: u64,
}
