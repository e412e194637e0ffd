//! Service Fabric client and data models.
//!
//! Provides typed structures and an asynchronous client for the Service Fabric
//! cluster management REST API: paginated resource listings, single-resource
//! lookups, deletes, cluster health and service type extension resolution.

#![deny(missing_docs)]

pub mod client;
pub mod extension;
pub mod models;

pub use client::{ServiceFabricClient, ServiceFabricClientBuilder};
pub use extension::resolve_extension;
pub use models::{
    AppParameter, ApplicationHealthState, ApplicationItem, ClusterHealth,
    ComposeDeploymentStatusInfo, Epoch, HealthEvent, InstanceItem, NodeHealthState,
    PartitionInformation, PartitionItem, PropertyInfo, PropertyMetadata, PropertyValue,
    ReplicaItem, ReplicaItemBase, ServiceItem, ServiceTypeDescription, ServiceTypeExtension,
    ServiceTypeInfo,
};
pub use servicefabric_core::config::{AuthConfig, FabricClientConfig};
pub use servicefabric_core::Error;

/// Convenient result alias that reuses the shared Service Fabric error type.
pub type Result<T> = servicefabric_core::Result<T>;
