//! Request validation.
//!
//! Validation runs after decoding and before any remote change. It needs the
//! current project list to detect duplicate names and to resolve the parent
//! project of a repository request.

use devops_client::Project;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::errors::ValidationError;
use crate::names::{strip_project_prefix, AzpId};
use crate::request::{ProjectRequest, RepositoryRequest};

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;

const EMAIL_PATTERN: &str =
    r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    // The pattern is a compile-time constant covered by tests.
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("e-mail pattern must compile"))
}

/// Validates a project base name and returns it trimmed.
///
/// # Validation Rules
/// - Leading and trailing whitespace is ignored
/// - Must not be empty
/// - Characters: ASCII letters, digits and `_`
pub fn validate_project_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::invalid_name(name, "must not be empty"));
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::invalid_name(
            trimmed,
            "only letters, digits and '_' are allowed",
        ));
    }

    Ok(trimmed.to_string())
}

/// Validates the syntax of an e-mail address.
pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !email_regex().is_match(trimmed) {
        return Err(ValidationError::invalid_email(value));
    }
    Ok(())
}

/// Fails if an existing project already uses `name` once its `AZP-NNN_` prefix is removed.
///
/// Project names are compared case-insensitively, the way the platform compares them.
pub fn check_duplicate_name(name: &str, existing: &[Project]) -> Result<(), ValidationError> {
    match existing
        .iter()
        .find(|p| strip_project_prefix(&p.name).eq_ignore_ascii_case(name))
    {
        Some(p) => Err(ValidationError::DuplicateName {
            name: name.to_string(),
            existing: p.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Validates a project request and returns the trimmed project base name.
pub fn validate_project_request(
    request: &ProjectRequest,
    existing: &[Project],
) -> Result<String, ValidationError> {
    let name = validate_project_name(&request.project_name)?;
    validate_email(&request.cost_center_manager)?;
    check_duplicate_name(&name, existing)?;

    debug!(
        work_item_id = request.work_item_id,
        project = name.as_str(),
        "Project request is valid"
    );
    Ok(name)
}

/// Validates a repository request and returns the parent project.
///
/// The parent is the existing project named `AZP-{azp_id}_{project_name}`.
pub fn validate_repository_request(
    request: &RepositoryRequest,
    existing: &[Project],
) -> Result<Project, ValidationError> {
    if request.repository_name.trim().is_empty() {
        return Err(ValidationError::missing_field("repositoryName"));
    }

    let base_name = validate_project_name(&request.project_name)?;
    let parent_name = AzpId::new(request.azp_id).project_name(&base_name);

    let parent = existing
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(&parent_name))
        .cloned()
        .ok_or(ValidationError::ParentProjectNotFound { name: parent_name })?;

    debug!(
        work_item_id = request.work_item_id,
        project = parent.name.as_str(),
        repository = request.repository_name.as_str(),
        "Repository request is valid"
    );
    Ok(parent)
}
