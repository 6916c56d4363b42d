use super::*;
use serde_json::{from_value, json, to_value};

#[test]
fn test_existing_configuration_deserialization() {
    let config: PolicyConfiguration = from_value(json!({
        "id": 42,
        "revision": 3,
        "isBlocking": true,
        "isEnabled": true,
        "type": { "id": "fa4e907d-c16b-4a4c-9dfa-4906e5d171dd", "displayName": "Minimum number of reviewers" },
        "settings": {
            "minimumApproverCount": 2,
            "scope": [
                { "repositoryId": "repo-1", "refName": "refs/heads/integ", "matchKind": "Prefix" }
            ]
        }
    }))
    .expect("Failed to parse configuration");

    assert_eq!(config.id, Some(42));
    assert_eq!(config.settings.minimum_approver_count, Some(2));
    assert!(config.applies_to_repository("repo-1"));
    assert!(!config.applies_to_repository("repo-2"));
}

#[test]
fn test_scope_without_repository_does_not_match() {
    let config: PolicyConfiguration = from_value(json!({
        "id": 7,
        "type": { "id": "x" },
        "settings": { "scope": [ { "repositoryId": null } ] }
    }))
    .expect("Failed to parse configuration");

    assert!(!config.applies_to_repository("repo-1"));
}

#[test]
fn test_repository_scope_omits_ref_fields() {
    let value = to_value(PolicyScope::repository("repo-1")).expect("Failed to serialize");

    assert_eq!(value, json!({ "repositoryId": "repo-1" }));
}

#[test]
fn test_branch_prefix_scope() {
    let value = to_value(PolicyScope::branch_prefix("repo-1", "integ")).expect("Failed to serialize");

    assert_eq!(
        value,
        json!({ "repositoryId": "repo-1", "refName": "refs/heads/integ", "matchKind": "Prefix" })
    );
}
