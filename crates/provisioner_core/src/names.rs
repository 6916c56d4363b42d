//! Naming conventions for provisioned resources.
//!
//! Every provisioned project is named `AZP-{id}_{name}` and its security
//! groups `AZG-{id}_{suffix}`, where `{id}` is the allocated identifier padded
//! to at least three digits.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;

/// Prefix of every provisioned project name.
pub const PROJECT_PREFIX: &str = "AZP-";

/// Prefix of every provisioned security group name.
pub const GROUP_PREFIX: &str = "AZG-";

/// Identifier allocated to a provisioned project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AzpId(u32);

impl AzpId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the platform project name for `base_name`, e.g. `AZP-001_Contoso`.
    pub fn project_name(&self, base_name: &str) -> String {
        format!("{}{}_{}", PROJECT_PREFIX, self, base_name)
    }

    /// Returns the security group name for `suffix`, e.g. `AZG-001_Proj_Consumer`.
    pub fn group_name(&self, suffix: &str) -> String {
        format!("{}{}_{}", GROUP_PREFIX, self, suffix)
    }
}

impl fmt::Display for AzpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl From<u32> for AzpId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Splits a provisioned project name into its identifier and base name.
///
/// Returns `None` for names that do not follow the `AZP-NNN_name` convention.
///
/// # Examples
///
/// ```rust
/// use provisioner_core::names::{parse_project_name, AzpId};
///
/// assert_eq!(parse_project_name("AZP-007_Foo"), Some((AzpId::new(7), "Foo")));
/// assert_eq!(parse_project_name("Management"), None);
/// ```
pub fn parse_project_name(name: &str) -> Option<(AzpId, &str)> {
    let rest = name.strip_prefix(PROJECT_PREFIX)?;
    let (digits, base) = rest.split_once('_')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let id = digits.parse::<u32>().ok()?;
    Some((AzpId(id), base))
}

/// Returns the base name of a project, without the `AZP-NNN_` prefix if present.
pub fn strip_project_prefix(name: &str) -> &str {
    match parse_project_name(name) {
        Some((_, base)) => base,
        None => name,
    }
}
