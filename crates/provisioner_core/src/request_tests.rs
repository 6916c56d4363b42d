//! Tests for ProvisioningRequest decoding

use super::*;

#[test]
fn test_decode_project_request() {
    let raw = br#"{
        "createType": "Project",
        "workItemId": 100,
        "projectName": "Contoso",
        "projectDescription": "Contoso services",
        "dataOwner1": "owner1@contoso.com",
        "dataOwner2": "owner2@contoso.com",
        "requestor": "Jane Doe",
        "costCenter": "CC-1",
        "costCenterManager": "a@b.com"
    }"#;

    let request = ProvisioningRequest::decode(raw).expect("Failed to decode request");

    assert_eq!(request.work_item_id(), 100);
    assert_eq!(request.kind(), RequestKind::Project);
    assert_eq!(request.requestor(), "Jane Doe");
    match request {
        ProvisioningRequest::Project(project) => {
            assert_eq!(project.project_name, "Contoso");
            assert_eq!(project.data_owner2.as_deref(), Some("owner2@contoso.com"));
            assert_eq!(project.cost_center_manager, "a@b.com");
        }
        _ => panic!("Expected project request"),
    }
}

#[test]
fn test_decode_repository_request() {
    let raw = br#"{
        "createType": "Repository",
        "workItemId": 101,
        "projectName": "Contoso",
        "repositoryName": "svc",
        "azp_Id": 1,
        "requestor": "Jane Doe"
    }"#;

    let request = ProvisioningRequest::decode(raw).expect("Failed to decode request");

    assert_eq!(request.kind(), RequestKind::Repository);
    match request {
        ProvisioningRequest::Repository(repo) => {
            assert_eq!(repo.azp_id, 1);
            assert_eq!(repo.repository_name, "svc");
            assert!(repo.cost_center.is_none());
        }
        _ => panic!("Expected repository request"),
    }
}

#[test]
fn test_decode_repository_request_without_name_defaults_to_empty() {
    let raw = br#"{"createType": "Repository", "workItemId": 5, "projectName": "Contoso", "azp_Id": 1}"#;

    let request = ProvisioningRequest::decode(raw).expect("Failed to decode request");

    match request {
        ProvisioningRequest::Repository(repo) => assert!(repo.repository_name.is_empty()),
        _ => panic!("Expected repository request"),
    }
}

#[test]
fn test_decode_rejects_unknown_create_type() {
    let raw = br#"{"createType": "Pipeline", "workItemId": 5, "projectName": "Contoso"}"#;

    let result = ProvisioningRequest::decode(raw);

    assert!(matches!(result, Err(ProvisioningError::Decode(_))));
}

#[test]
fn test_decode_rejects_malformed_json() {
    let result = ProvisioningRequest::decode(b"{not json");

    assert!(matches!(result, Err(ProvisioningError::Decode(_))));
}

#[test]
fn test_decode_rejects_missing_work_item_id() {
    let raw = br#"{"createType": "Project", "projectName": "Contoso"}"#;

    assert!(ProvisioningRequest::decode(raw).is_err());
}

#[test]
fn test_request_kind_display() {
    assert_eq!(RequestKind::Project.to_string(), "project");
    assert_eq!(RequestKind::Repository.work_item_type(), "Repository");
}

#[test]
fn test_checkpoint_subject_follows_requested_names() {
    let project = ProvisioningRequest::decode(
        br#"{"createType":"Project","workItemId":1,"projectName":" Contoso "}"#,
    )
    .unwrap();
    let repository = ProvisioningRequest::decode(
        br#"{"createType":"Repository","workItemId":2,"projectName":"Contoso","repositoryName":"Svc","azp_Id":7}"#,
    )
    .unwrap();

    match (project, repository) {
        (ProvisioningRequest::Project(p), ProvisioningRequest::Repository(r)) => {
            assert_eq!(p.checkpoint_subject(), "project:contoso");
            assert_eq!(r.checkpoint_subject(), "repository:7/svc");
        }
        other => panic!("Unexpected requests: {:?}", other),
    }
}
