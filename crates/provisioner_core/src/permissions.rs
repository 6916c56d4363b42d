//! Git repository permissions and security tokens.
//!
//! Git permissions are bit flags in the git repositories security namespace.
//! An access control entry pairs an allow mask and a deny mask with a principal
//! under a security token. Tokens are hierarchical:
//!
//! - project: `repoV2/{projectId}`
//! - repository: `repoV2/{projectId}/{repositoryId}`
//! - branch prefix: `repoV2/{projectId}/{repositoryId}/refs/heads/{hex}/{hex}...`
//!
//! Branch path segments are encoded as the lowercase hex of their UTF-16LE bytes.

use devops_client::AccessControlEntryPayload;
use std::fmt;
use std::ops::BitOr;

#[cfg(test)]
#[path = "permissions_tests.rs"]
mod tests;

/// A single git permission bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitPermission {
    Administer,
    Read,
    Contribute,
    ForcePush,
    CreateBranch,
    CreateTag,
    ManageNotes,
    PolicyExempt,
    CreateRepository,
    DeleteRepository,
    RenameRepository,
    EditPolicies,
    RemoveOthersLocks,
    ManagePermissions,
    PullRequestContribute,
    PullRequestBypassPolicy,
}

impl GitPermission {
    pub const ALL: [GitPermission; 16] = [
        Self::Administer,
        Self::Read,
        Self::Contribute,
        Self::ForcePush,
        Self::CreateBranch,
        Self::CreateTag,
        Self::ManageNotes,
        Self::PolicyExempt,
        Self::CreateRepository,
        Self::DeleteRepository,
        Self::RenameRepository,
        Self::EditPolicies,
        Self::RemoveOthersLocks,
        Self::ManagePermissions,
        Self::PullRequestContribute,
        Self::PullRequestBypassPolicy,
    ];

    /// Bit value of the permission in the git security namespace.
    pub const fn bit(self) -> u64 {
        match self {
            Self::Administer => 1,
            Self::Read => 2,
            Self::Contribute => 4,
            Self::ForcePush => 8,
            Self::CreateBranch => 16,
            Self::CreateTag => 32,
            Self::ManageNotes => 64,
            Self::PolicyExempt => 128,
            Self::CreateRepository => 256,
            Self::DeleteRepository => 512,
            Self::RenameRepository => 1024,
            Self::EditPolicies => 2048,
            Self::RemoveOthersLocks => 4096,
            Self::ManagePermissions => 8192,
            Self::PullRequestContribute => 16384,
            Self::PullRequestBypassPolicy => 32768,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Administer => "administer",
            Self::Read => "read",
            Self::Contribute => "contribute",
            Self::ForcePush => "force-push",
            Self::CreateBranch => "create-branch",
            Self::CreateTag => "create-tag",
            Self::ManageNotes => "manage-notes",
            Self::PolicyExempt => "policy-exempt",
            Self::CreateRepository => "create-repo",
            Self::DeleteRepository => "delete-repo",
            Self::RenameRepository => "rename-repo",
            Self::EditPolicies => "edit-policies",
            Self::RemoveOthersLocks => "remove-locks",
            Self::ManagePermissions => "manage-permissions",
            Self::PullRequestContribute => "pr-contribute",
            Self::PullRequestBypassPolicy => "pr-bypass-policy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for GitPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A combination of git permissions.
///
/// # Examples
///
/// ```rust
/// use provisioner_core::permissions::{GitPermission, PermissionMask};
///
/// let mask = GitPermission::CreateBranch | GitPermission::ForcePush;
/// assert_eq!(mask.bits(), 24);
/// assert!(mask.contains(GitPermission::ForcePush));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PermissionMask(u64);

impl PermissionMask {
    pub const EMPTY: PermissionMask = PermissionMask(0);

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, permission: GitPermission) -> bool {
        self.0 & permission.bit() != 0
    }
}

impl From<GitPermission> for PermissionMask {
    fn from(value: GitPermission) -> Self {
        PermissionMask(value.bit())
    }
}

impl BitOr for PermissionMask {
    type Output = PermissionMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        PermissionMask(self.0 | rhs.0)
    }
}

impl BitOr<GitPermission> for PermissionMask {
    type Output = PermissionMask;

    fn bitor(self, rhs: GitPermission) -> Self::Output {
        PermissionMask(self.0 | rhs.bit())
    }
}

impl BitOr for GitPermission {
    type Output = PermissionMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        PermissionMask(self.bit() | rhs.bit())
    }
}

/// Where an access control entry applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScope {
    Project {
        project_id: String,
    },
    Repository {
        project_id: String,
        repository_id: String,
    },
    BranchPrefix {
        project_id: String,
        repository_id: String,
        prefix: String,
    },
}

impl SecurityScope {
    /// Returns the security token of the scope.
    pub fn token(&self) -> String {
        match self {
            Self::Project { project_id } => format!("repoV2/{}", project_id),
            Self::Repository {
                project_id,
                repository_id,
            } => security_token(project_id, repository_id, None),
            Self::BranchPrefix {
                project_id,
                repository_id,
                prefix,
            } => security_token(project_id, repository_id, Some(prefix)),
        }
    }
}

/// Builds the security token of a repository, or of a branch prefix inside it.
///
/// Empty path segments are skipped, so `integ` and `integ/` give the same token.
pub fn security_token(project_id: &str, repository_id: &str, branch_prefix: Option<&str>) -> String {
    let mut token = format!("repoV2/{}/{}", project_id, repository_id);

    if let Some(prefix) = branch_prefix {
        token.push_str("/refs/heads");
        for segment in prefix.split('/').filter(|s| !s.is_empty()) {
            token.push('/');
            token.push_str(&encode_segment(segment));
        }
    }

    token
}

/// Encodes a ref path segment as lowercase hex of its UTF-16LE bytes.
fn encode_segment(segment: &str) -> String {
    segment
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// An access control entry to set on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub scope: SecurityScope,
    pub descriptor: String,
    pub allow: PermissionMask,
    pub deny: PermissionMask,
}

impl AccessRule {
    pub fn allow(scope: SecurityScope, descriptor: &str, allow: PermissionMask) -> Self {
        Self {
            scope,
            descriptor: descriptor.to_string(),
            allow,
            deny: PermissionMask::EMPTY,
        }
    }

    pub fn deny(scope: SecurityScope, descriptor: &str, deny: PermissionMask) -> Self {
        Self {
            scope,
            descriptor: descriptor.to_string(),
            allow: PermissionMask::EMPTY,
            deny,
        }
    }

    /// Converts the rule into a merging access control entry payload.
    pub fn to_payload(&self) -> AccessControlEntryPayload {
        AccessControlEntryPayload::single(
            &self.scope.token(),
            &self.descriptor,
            self.allow.bits(),
            self.deny.bits(),
        )
    }
}
