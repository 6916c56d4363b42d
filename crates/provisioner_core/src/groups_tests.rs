use super::*;
use crate::test_support::{builtin_group, project, MockDevOpsClient};

fn contoso() -> Project {
    project("AZP-001_Contoso")
}

#[test]
fn test_display_names_use_padded_id() {
    let id = AzpId::new(7);

    let names: Vec<String> = GroupRole::ALL.iter().map(|r| r.display_name(id)).collect();

    assert_eq!(
        names,
        vec![
            "AZG-007_Proj_Consumer",
            "AZG-007_ProjMaint_Developer",
            "AZG-007_ProjMaint_Administrator",
            "AZG-007_ProjMaint_Deployer",
            "AZG-007_InfraMaint_Developer",
            "AZG-007_InfraMaint_Administrator",
        ]
    );
}

#[test]
fn test_infra_administrator_has_four_parents() {
    assert_eq!(GroupRole::InfraAdministrator.builtin_parents().len(), 4);
    assert_eq!(GroupRole::InfraDeveloper.builtin_parents().len(), 2);
    assert_eq!(GroupRole::Consumer.builtin_parents(), &[READERS]);
}

#[tokio::test]
async fn test_build_creates_six_groups_with_parents() {
    let client = Arc::new(MockDevOpsClient::new());
    let builder = GroupHierarchyBuilder::new(client.clone());

    let result = builder
        .build(&contoso(), AzpId::new(1))
        .await
        .expect("build failed");

    assert_eq!(result.created.len(), 6);
    assert!(result.existing.is_empty());

    let state = client.state.lock().unwrap();
    let (consumer, consumer_parents) = &state.created_groups[0];
    assert_eq!(consumer.display_name, "AZG-001_Proj_Consumer");
    assert_eq!(consumer_parents, &vec![builtin_group(READERS).descriptor]);

    let (infra_admin, infra_parents) = &state.created_groups[5];
    assert_eq!(infra_admin.display_name, "AZG-001_InfraMaint_Administrator");
    assert_eq!(
        infra_parents,
        &vec![
            builtin_group(ENDPOINT_ADMINISTRATORS).descriptor,
            builtin_group(DEPLOYMENT_GROUP_ADMINISTRATORS).descriptor,
            builtin_group(BUILD_ADMINISTRATORS).descriptor,
            builtin_group(RELEASE_ADMINISTRATORS).descriptor,
        ]
    );
}

#[tokio::test]
async fn test_build_seeds_before_listing_groups() {
    let client = Arc::new(MockDevOpsClient::new());
    let builder = GroupHierarchyBuilder::new(client.clone());

    builder
        .build(&contoso(), AzpId::new(1))
        .await
        .expect("build failed");

    let calls = client.calls();
    assert_eq!(
        &calls[..5],
        &[
            "trigger_endpoint_group_seed",
            "trigger_deployment_group_seed",
            "trigger_release_group_seed",
            "get_scope_descriptor",
            "list_groups",
        ]
    );
}

#[tokio::test]
async fn test_build_skips_existing_groups() {
    let client = Arc::new(MockDevOpsClient::new());
    client
        .state
        .lock()
        .unwrap()
        .groups
        .push(builtin_group("AZG-001_Proj_Consumer"));
    let builder = GroupHierarchyBuilder::new(client.clone());

    let result = builder
        .build(&contoso(), AzpId::new(1))
        .await
        .expect("build failed");

    assert_eq!(result.existing, vec!["AZG-001_Proj_Consumer".to_string()]);
    assert_eq!(result.created.len(), 5);
    assert_eq!(client.call_count("create_group"), 5);
}

#[tokio::test]
async fn test_build_is_rerunnable() {
    let client = Arc::new(MockDevOpsClient::new());
    let builder = GroupHierarchyBuilder::new(client.clone());

    builder.build(&contoso(), AzpId::new(1)).await.unwrap();
    let second = builder.build(&contoso(), AzpId::new(1)).await.unwrap();

    assert!(second.created.is_empty());
    assert_eq!(second.existing.len(), 6);
    assert_eq!(client.call_count("create_group"), 6);
}

#[tokio::test]
async fn test_missing_builtin_group_fails_before_creation() {
    let client = Arc::new(MockDevOpsClient::new());
    client
        .state
        .lock()
        .unwrap()
        .groups
        .retain(|g| g.display_name != RELEASE_ADMINISTRATORS);
    let builder = GroupHierarchyBuilder::new(client.clone());

    let result = builder.build(&contoso(), AzpId::new(1)).await;

    match result {
        Err(ProvisioningError::MissingBuiltinGroup(name)) => {
            assert_eq!(name, RELEASE_ADMINISTRATORS)
        }
        other => panic!("Expected MissingBuiltinGroup, got {:?}", other),
    }
    assert_eq!(client.call_count("create_group"), 0);
}

#[tokio::test]
async fn test_partial_failure_keeps_created_groups() {
    let client = Arc::new(MockDevOpsClient::new().fail_on("create_group"));
    let builder = GroupHierarchyBuilder::new(client.clone());

    let result = builder.build(&contoso(), AzpId::new(1)).await;

    assert!(matches!(result, Err(ProvisioningError::Remote(_))));
    assert_eq!(client.call_count("create_group"), 1);
}
