//! Service Fabric response models.
//!
//! Field names follow the gateway's PascalCase JSON. Optional or version-dependent
//! fields default when absent so that older and newer clusters decode alike.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use servicefabric_core::ids::PartitionId;
use servicefabric_core::types::{null_as_default, HealthState, ServiceKind};
use servicefabric_core::Error;
use std::collections::BTreeMap;

use crate::Result;

/// Application parameter override.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AppParameter {
    /// Parameter name.
    pub key: String,
    /// Parameter value.
    pub value: String,
}

/// Application as returned by `GET /Applications/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicationItem {
    /// Application id (the name without the `fabric:/` scheme).
    pub id: String,
    /// Full application name, e.g. `fabric:/MyApp`.
    pub name: String,
    /// Application type name.
    pub type_name: String,
    /// Application type version.
    pub type_version: String,
    /// Lifecycle status (`Ready`, `Upgrading`, ...).
    #[serde(default)]
    pub status: String,
    /// Parameter overrides.
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Vec<AppParameter>,
    /// Aggregated health.
    #[serde(default)]
    pub health_state: HealthState,
}

/// Service as returned by `GetServices`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceItem {
    /// Service id.
    pub id: String,
    /// Stateful or stateless.
    #[serde(default)]
    pub service_kind: ServiceKind,
    /// Full service name, e.g. `fabric:/MyApp/MyService`.
    pub name: String,
    /// Service type name from the service manifest.
    pub type_name: String,
    /// Service manifest version.
    #[serde(default)]
    pub manifest_version: String,
    /// Whether the service keeps state on disk (stateful services only).
    #[serde(default)]
    pub has_persisted_state: bool,
    /// Aggregated health.
    #[serde(default)]
    pub health_state: HealthState,
    /// Lifecycle status (`Active`, `Deleting`, ...).
    #[serde(default)]
    pub service_status: String,
    /// Whether this is a service group.
    #[serde(default)]
    pub is_service_group: bool,
}

/// Partitioning scheme details of a partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PartitionInformation {
    /// `Singleton`, `Int64Range` or `Named`.
    pub service_partition_kind: String,
    /// Partition id.
    pub id: PartitionId,
    /// Lower bound of an `Int64Range` partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_key: Option<String>,
    /// Upper bound of an `Int64Range` partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_key: Option<String>,
    /// Name of a `Named` partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Reconfiguration epoch of a stateful partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Epoch {
    /// Configuration version.
    pub configuration_version: String,
    /// Data loss version.
    pub data_loss_version: String,
}

/// Partition as returned by `GetPartitions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PartitionItem {
    /// Stateful or stateless.
    #[serde(default)]
    pub service_kind: ServiceKind,
    /// Partitioning details, including the partition id.
    pub partition_information: PartitionInformation,
    /// Target replica count (stateful).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_replica_set_size: Option<i64>,
    /// Minimum replica count (stateful).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replica_set_size: Option<i64>,
    /// Instance count (stateless; `-1` means one per node).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_count: Option<i64>,
    /// Aggregated health.
    #[serde(default)]
    pub health_state: HealthState,
    /// Partition status (`Ready`, `InQuorumLoss`, ...).
    #[serde(default)]
    pub partition_status: String,
    /// Current epoch (stateful).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_configuration_epoch: Option<Epoch>,
}

impl PartitionItem {
    /// Partition id.
    #[must_use]
    pub const fn id(&self) -> PartitionId {
        self.partition_information.id
    }
}

/// Fields shared by replicas and instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ReplicaItemBase {
    /// Stateful or stateless.
    #[serde(default)]
    pub service_kind: ServiceKind,
    /// Replica role (`Primary`, `ActiveSecondary`, ...); absent for instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_role: Option<String>,
    /// Replica or instance status.
    #[serde(default)]
    pub replica_status: String,
    /// Aggregated health.
    #[serde(default)]
    pub health_state: HealthState,
    /// Listener address document, `{"Endpoints":{"<listener>":"<address>"}}`.
    #[serde(default)]
    pub address: String,
    /// Node hosting the replica.
    #[serde(default)]
    pub node_name: String,
    /// Duration of the last in-build phase, in seconds.
    #[serde(default)]
    pub last_in_build_duration_in_seconds: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddressDocument {
    #[serde(default)]
    endpoints: BTreeMap<String, String>,
}

impl ReplicaItemBase {
    /// Decode the address document into a listener name to address map.
    ///
    /// The default listener is keyed by the empty string. An empty address yields an
    /// empty map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the address is not an endpoints document.
    pub fn endpoints(&self) -> Result<BTreeMap<String, String>> {
        if self.address.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let document: AddressDocument = serde_json::from_str(&self.address).map_err(|err| {
            Error::Decode(format!(
                "could not decode address on node `{}`: {err}",
                self.node_name
            ))
        })?;
        Ok(document.endpoints)
    }
}

/// Replica of a stateful partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ReplicaItem {
    /// Shared replica fields.
    #[serde(flatten)]
    pub base: ReplicaItemBase,
    /// Replica id.
    pub replica_id: String,
}

/// Instance of a stateless partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceItem {
    /// Shared instance fields.
    #[serde(flatten)]
    pub base: ReplicaItemBase,
    /// Instance id.
    pub instance_id: String,
}

/// Raw extension attached to a service type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceTypeExtension {
    /// Extension name.
    pub key: String,
    /// Extension body as raw XML.
    #[serde(default)]
    pub value: String,
}

/// Service type description from the service manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceTypeDescription {
    /// Stateful or stateless.
    #[serde(default)]
    pub kind: ServiceKind,
    /// Service type name.
    pub service_type_name: String,
    /// Placement constraint expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_constraints: Option<String>,
    /// Whether the type is stateful.
    #[serde(default)]
    pub is_stateful: bool,
    /// Extensions in manifest order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub extensions: Vec<ServiceTypeExtension>,
}

/// Service type as returned by `GetServiceTypes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceTypeInfo {
    /// Type description including extensions.
    pub service_type_description: ServiceTypeDescription,
    /// Version of the declaring service manifest.
    #[serde(default)]
    pub service_manifest_version: String,
    /// Name of the declaring service manifest.
    #[serde(default)]
    pub service_manifest_name: String,
    /// Whether this is a service group type.
    #[serde(default)]
    pub is_service_group: bool,
}

impl ServiceTypeInfo {
    /// Service type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.service_type_description.service_type_name
    }

    /// First extension whose key matches, ignoring ASCII case.
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&ServiceTypeExtension> {
        self.service_type_description
            .extensions
            .iter()
            .find(|extension| extension.key.eq_ignore_ascii_case(key))
    }
}

/// Typed value of a naming-service property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyValue {
    /// `String`, `Int64`, `Double`, `Binary` or `Guid`.
    pub kind: String,
    /// Value payload; its JSON shape depends on `kind`.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PropertyValue {
    /// The payload of a `String` property.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        if self.kind == "String" {
            self.data.as_str()
        } else {
            None
        }
    }
}

/// System metadata of a naming-service property.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyMetadata {
    /// Value kind.
    #[serde(default)]
    pub type_id: String,
    /// Application-defined type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_type_id: Option<String>,
    /// Owning name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Size of the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<u64>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_utc_timestamp: Option<DateTime<Utc>>,
    /// Modification sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
}

/// Naming-service property as returned by `GetProperties`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyInfo {
    /// Property name.
    pub name: String,
    /// Property value; absent when values were not requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PropertyValue>,
    /// System metadata.
    #[serde(default)]
    pub metadata: PropertyMetadata,
}

/// Compose deployment status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ComposeDeploymentStatusInfo {
    /// Deployment name.
    pub name: String,
    /// Application created by the deployment.
    #[serde(default)]
    pub application_name: String,
    /// Deployment status (`Provisioning`, `Ready`, `Failed`, ...).
    #[serde(default)]
    pub status: String,
    /// Human-readable status details.
    #[serde(default)]
    pub status_details: String,
}

/// Health report attached to an entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct HealthEvent {
    /// Reporting component.
    #[serde(default)]
    pub source_id: String,
    /// Reported property.
    #[serde(default)]
    pub property: String,
    /// Reported health.
    #[serde(default)]
    pub health_state: HealthState,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Whether the report has expired.
    #[serde(default)]
    pub is_expired: bool,
    /// When the source generated the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_utc_timestamp: Option<DateTime<Utc>>,
}

/// Health summary of a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct NodeHealthState {
    /// Node name.
    #[serde(default)]
    pub name: String,
    /// Aggregated health.
    #[serde(default)]
    pub aggregated_health_state: HealthState,
}

/// Health summary of an application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicationHealthState {
    /// Application name.
    #[serde(default)]
    pub name: String,
    /// Aggregated health.
    #[serde(default)]
    pub aggregated_health_state: HealthState,
}

/// Cluster health as returned by `/$/GetClusterHealth`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterHealth {
    /// Aggregated cluster health.
    #[serde(default)]
    pub aggregated_health_state: HealthState,
    /// Reports on the cluster entity.
    #[serde(default, deserialize_with = "null_as_default")]
    pub health_events: Vec<HealthEvent>,
    /// Evaluations that explain an unhealthy state.
    #[serde(default, deserialize_with = "null_as_default")]
    pub unhealthy_evaluations: Vec<serde_json::Value>,
    /// Per-node health.
    #[serde(default, deserialize_with = "null_as_default")]
    pub node_health_states: Vec<NodeHealthState>,
    /// Per-application health.
    #[serde(default, deserialize_with = "null_as_default")]
    pub application_health_states: Vec<ApplicationHealthState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replica_and_instance_ids() {
        let replica: ReplicaItem = serde_json::from_value(json!({
            "ServiceKind": "Stateful",
            "ReplicaId": "131496928082309293",
            "ReplicaRole": "Primary",
            "ReplicaStatus": "Ready",
            "HealthState": "Ok",
            "Address": "",
            "NodeName": "_Node_0",
            "LastInBuildDurationInSeconds": "1"
        }))
        .unwrap();
        assert_eq!(replica.replica_id, "131496928082309293");
        assert_eq!(replica.base.replica_role.as_deref(), Some("Primary"));
        assert_eq!(replica.base.service_kind, ServiceKind::Stateful);

        let instance: InstanceItem = serde_json::from_value(json!({
            "ServiceKind": "Stateless",
            "InstanceId": "131497042182378182",
            "ReplicaStatus": "Ready",
            "HealthState": "Ok",
            "NodeName": "_Node_0"
        }))
        .unwrap();
        assert_eq!(instance.instance_id, "131497042182378182");
        assert!(instance.base.replica_role.is_none());
    }

    #[test]
    fn endpoints_decode_listener_map() {
        let base = ReplicaItemBase {
            address: r#"{"Endpoints":{"":"localhost:30001","admin":"localhost:30002"}}"#
                .to_string(),
            ..ReplicaItemBase::default()
        };
        let endpoints = base.endpoints().unwrap();
        assert_eq!(endpoints.get("").map(String::as_str), Some("localhost:30001"));
        assert_eq!(endpoints.len(), 2);

        assert!(ReplicaItemBase::default().endpoints().unwrap().is_empty());
    }

    #[test]
    fn malformed_address_is_decode_error() {
        let base = ReplicaItemBase {
            address: "localhost:30001".to_string(),
            ..ReplicaItemBase::default()
        };
        assert!(matches!(base.endpoints(), Err(Error::Decode(_))));
    }

    #[test]
    fn extension_lookup_ignores_case_and_keeps_first() {
        let info = ServiceTypeInfo {
            service_type_description: ServiceTypeDescription {
                service_type_name: "Web".to_string(),
                extensions: vec![
                    ServiceTypeExtension {
                        key: "Traefik".to_string(),
                        value: "<first/>".to_string(),
                    },
                    ServiceTypeExtension {
                        key: "traefik".to_string(),
                        value: "<second/>".to_string(),
                    },
                ],
                ..ServiceTypeDescription::default()
            },
            ..ServiceTypeInfo::default()
        };
        assert_eq!(info.name(), "Web");
        assert_eq!(info.extension("TRAEFIK").unwrap().value, "<first/>");
        assert!(info.extension("other").is_none());
    }

    #[test]
    fn property_value_string_kind_only() {
        let value = PropertyValue {
            kind: "String".to_string(),
            data: json!("blue"),
        };
        assert_eq!(value.as_str(), Some("blue"));

        let value = PropertyValue {
            kind: "Int64".to_string(),
            data: json!("42"),
        };
        assert_eq!(value.as_str(), None);
    }
}
