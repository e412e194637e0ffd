//! Integration tests for parsing Service Fabric data.
//!
//! These tests validate that the servicefabric-client models decode recorded
//! gateway responses, and that the client walks the application hierarchy against
//! a mock gateway serving the same fixtures.

use servicefabric_client::models::{
    ApplicationItem, ClusterHealth, ComposeDeploymentStatusInfo, InstanceItem, PartitionItem,
    PropertyInfo, ReplicaItem, ServiceItem, ServiceTypeInfo,
};
use servicefabric_client::{resolve_extension, ServiceFabricClientBuilder};
use servicefabric_core::pagination::Page;
use servicefabric_core::types::{HealthState, ServiceKind};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PARTITION: &str = "bce46a8c-b62d-4996-89dc-7ffc00a96902";

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Load a fixture from disk.
fn load_fixture(name: &str) -> String {
    let fixture_path = fixtures_dir().join(name);
    fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    })
}

fn fixture_response(name: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(load_fixture(name), "application/json")
}

#[derive(Debug, Default, Deserialize, PartialEq)]
struct Tests {
    #[serde(rename = "Test")]
    test: TestEntry,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
struct TestEntry {
    #[serde(rename = "@Key")]
    key: String,
    #[serde(rename = "$text")]
    value: String,
}

#[test]
fn test_deserialize_application_page() {
    let json_data = load_fixture("applications.json");
    let page: Page<ApplicationItem> = serde_json::from_str(&json_data).unwrap_or_else(|e| {
        panic!(
            "Failed to deserialize application page: {}\nJSON: {}",
            e, json_data
        )
    });

    assert_eq!(page.next_token(), Some("00001234"));
    assert_eq!(page.items.len(), 2, "Expected 2 applications in test data");

    let app = &page.items[0];
    assert_eq!(app.id, "TestApplication");
    assert_eq!(app.name, "fabric:/TestApplication");
    assert_eq!(app.type_name, "TestApplicationType");
    assert_eq!(app.type_version, "1.0.0");
    assert_eq!(app.status, "Ready");
    assert_eq!(app.health_state, HealthState::Ok);
    assert_eq!(app.parameters.len(), 2);
    assert_eq!(app.parameters[1].value, "Value2");
}

#[test]
fn test_deserialize_last_page() {
    let page: Page<ApplicationItem> =
        serde_json::from_str(&load_fixture("applications_continue.json")).unwrap();
    assert_eq!(page.next_token(), None);
    assert!(page.items.is_empty());
}

#[test]
fn test_deserialize_null_collections() {
    let page: Page<ApplicationItem> =
        serde_json::from_str(&load_fixture("null_collections.json")).unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "LegacyApplication");
    assert!(page.items[0].parameters.is_empty());

    let types: Vec<ServiceTypeInfo> =
        serde_json::from_str(&load_fixture("extensions_null.json")).unwrap();
    assert!(types[0].service_type_description.extensions.is_empty());

    let resolved: Tests = resolve_extension(&types, "Legacy", "Test").unwrap();
    assert_eq!(resolved, Tests::default());

    let health: ClusterHealth = serde_json::from_str(
        r#"{"AggregatedHealthState":"Ok","HealthEvents":null,"UnhealthyEvaluations":null,
            "NodeHealthStates":null,"ApplicationHealthStates":null}"#,
    )
    .unwrap();
    assert!(health.health_events.is_empty());
    assert!(health.node_health_states.is_empty());
}

#[test]
fn test_deserialize_services() {
    let page: Page<ServiceItem> = serde_json::from_str(&load_fixture("services.json")).unwrap();
    let service = &page.items[0];

    assert_eq!(service.id, "TestApplication~TestService");
    assert_eq!(service.service_kind, ServiceKind::Stateful);
    assert!(service.has_persisted_state);
    assert!(!service.is_service_group);
    assert_eq!(service.service_status, "Active");
    assert_eq!(service.type_name, "TestServiceType");
}

#[test]
fn test_deserialize_partitions() {
    let page: Page<PartitionItem> =
        serde_json::from_str(&load_fixture("partitions.json")).unwrap();
    let partition = &page.items[0];

    assert_eq!(partition.id().to_string(), PARTITION);
    let info = &partition.partition_information;
    assert_eq!(info.service_partition_kind, "Int64Range");
    assert_eq!(info.low_key.as_deref(), Some("-9223372036854775808"));
    assert_eq!(info.high_key.as_deref(), Some("9223372036854775807"));

    let epoch = partition.current_configuration_epoch.as_ref().unwrap();
    assert_eq!(epoch.configuration_version, "12884901891");
    assert_eq!(epoch.data_loss_version, "131496928071680379");
    assert_eq!(partition.min_replica_set_size, Some(3));
    assert!(partition.instance_count.is_none());
}

#[test]
fn test_deserialize_replicas_and_instances() {
    let replicas: Page<ReplicaItem> =
        serde_json::from_str(&load_fixture("replicas.json")).unwrap();
    let replica = &replicas.items[0];
    assert_eq!(replica.replica_id, "131496928082309293");
    assert_eq!(replica.base.node_name, "_Node_0");
    let endpoints = replica.base.endpoints().unwrap();
    assert!(endpoints[""].starts_with("localhost:30001+"));

    let instances: Page<InstanceItem> =
        serde_json::from_str(&load_fixture("instances.json")).unwrap();
    let instance = &instances.items[0];
    assert_eq!(instance.instance_id, "131497042182378182");
    assert_eq!(instance.base.service_kind, ServiceKind::Stateless);
    assert_eq!(
        instance.base.endpoints().unwrap()[""],
        "http://localhost:8081"
    );
}

#[test]
fn test_resolve_extension_from_fixture() {
    let types: Vec<ServiceTypeInfo> =
        serde_json::from_str(&load_fixture("extensions_01.json")).unwrap();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].service_manifest_name, "TestServicePkg");
    assert_eq!(types[0].service_type_description.extensions.len(), 2);

    let resolved: Tests = resolve_extension(&types, "Test", "Test").unwrap();
    assert_eq!(resolved.test.key, "key1");
    assert_eq!(resolved.test.value, "value1");

    let missing: Tests = resolve_extension(&types, "Test1", "Test").unwrap();
    assert_eq!(missing, Tests::default());
}

#[test]
fn test_deserialize_cluster_health() {
    let health: ClusterHealth = serde_json::from_str(&load_fixture("cluster_health.json")).unwrap();

    assert_eq!(health.aggregated_health_state, HealthState::Warning);
    assert_eq!(health.health_events.len(), 1);
    assert_eq!(health.health_events[0].source_id, "System.FM");
    assert!(health.health_events[0].source_utc_timestamp.is_some());
    assert_eq!(health.unhealthy_evaluations.len(), 1);
    assert_eq!(
        health.node_health_states[1].aggregated_health_state,
        HealthState::Warning
    );
    assert_eq!(health.application_health_states.len(), 2);
}

#[test]
fn test_deserialize_properties() {
    let page: Page<PropertyInfo> = serde_json::from_str(&load_fixture("properties.json")).unwrap();
    assert_eq!(page.items.len(), 2);

    let enable = &page.items[0];
    assert_eq!(enable.name, "traefik.enable");
    assert_eq!(enable.value.as_ref().and_then(|v| v.as_str()), Some("true"));
    assert_eq!(enable.metadata.size_in_bytes, Some(10));
    assert!(enable.metadata.last_modified_utc_timestamp.is_some());

    let replicas = &page.items[1];
    assert_eq!(replicas.value.as_ref().and_then(|v| v.as_str()), None);
}

#[test]
fn test_deserialize_deployments() {
    let page: Page<ComposeDeploymentStatusInfo> =
        serde_json::from_str(&load_fixture("deployments.json")).unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[1].status, "Failed");
    assert_eq!(page.items[1].status_details, "Image pull failed.");
}

#[tokio::test]
async fn test_walk_application_hierarchy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Applications/"))
        .and(query_param_is_missing("continue"))
        .respond_with(fixture_response("applications.json"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Applications/"))
        .and(query_param("continue", "00001234"))
        .respond_with(fixture_response("applications_continue.json"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Applications/TestApplication/$/GetServices"))
        .respond_with(fixture_response("services.json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/Applications/TestApplication/$/GetServices/TestApplication~TestService/$/GetPartitions/",
        ))
        .respond_with(fixture_response("partitions.json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            format!(
                "/Applications/TestApplication/$/GetServices/TestApplication~TestService/$/GetPartitions/{PARTITION}/$/GetReplicas"
            )
            .as_str(),
        ))
        .respond_with(fixture_response("replicas.json"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ApplicationTypes/TestApplicationType/$/GetServiceTypes"))
        .and(query_param("ApplicationTypeVersion", "1.0.0"))
        .respond_with(fixture_response("extensions_01.json"))
        .mount(&server)
        .await;

    let client = ServiceFabricClientBuilder::new(server.uri())
        .unwrap()
        .with_api_version("1.0")
        .build()
        .unwrap();

    let apps = client.list_applications().await.unwrap();
    assert_eq!(apps.len(), 2);

    let services = client.list_services(&apps[0].id).await.unwrap();
    assert_eq!(services.len(), 1);

    let partitions = client
        .list_partitions(&apps[0].id, &services[0].id)
        .await
        .unwrap();
    let replicas = client
        .list_replicas(&apps[0].id, &services[0].id, partitions[0].id())
        .await
        .unwrap();
    assert_eq!(replicas.len(), 1);
    assert_eq!(replicas[0].base.replica_role.as_deref(), Some("Primary"));

    // The fixture declares service type "Test", not "TestServiceType".
    let service = ServiceItem {
        type_name: "Test".to_string(),
        ..services[0].clone()
    };
    let labels = client
        .get_service_labels(&apps[0], &service, "traefik")
        .await
        .unwrap();
    assert_eq!(labels.len(), 2);
    assert_eq!(labels["traefik.frontend.rule"], "PathPrefix:/test");
}
