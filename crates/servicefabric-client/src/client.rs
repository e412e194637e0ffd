//! Asynchronous Service Fabric client implementation.

use crate::models::{
    ApplicationItem, ClusterHealth, ComposeDeploymentStatusInfo, InstanceItem, PartitionItem,
    PropertyInfo, ReplicaItem, ServiceItem,
};
use crate::Result;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use servicefabric_core::client::ClientConfig;
use servicefabric_core::config::{AuthConfig, FabricClientConfig};
use servicefabric_core::ids::PartitionId;
use servicefabric_core::pagination::fetch_all;
use servicefabric_core::query::{resource_url, QueryParams};
use servicefabric_core::transport::{build_transport, HttpTransport};
use servicefabric_core::types::HealthState;
use servicefabric_core::Error;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const USER_AGENT: &str = concat!("servicefabric-client/", env!("CARGO_PKG_VERSION"));

const NAME_SCHEME: &str = "fabric:";

/// Builder for [`ServiceFabricClient`].
pub struct ServiceFabricClientBuilder {
    endpoint: Url,
    api_version: String,
    auth: AuthConfig,
    http: ClientConfig,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl ServiceFabricClientBuilder {
    /// Create a builder for the specified cluster endpoint, without authentication.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the endpoint is missing or invalid.
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self> {
        Self::from_config(FabricClientConfig::new(endpoint.as_ref())?)
    }

    /// Create a builder from a deserialised configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configuration does not validate.
    pub fn from_config(config: FabricClientConfig) -> Result<Self> {
        config.validate_all()?;
        let endpoint = config.parse_endpoint()?;

        let mut http = ClientConfig::new().with_timeout(config.timeout());
        if let Some(max_pages) = config.max_pages {
            http = http.with_max_pages(max_pages);
        }

        Ok(Self {
            endpoint,
            api_version: config.api_version,
            auth: config.auth,
            http,
            transport: None,
        })
    }

    /// Override the API version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Select the authentication strategy.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http = config;
        self
    }

    /// Use a caller-supplied transport instead of one derived from the auth mode.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an empty API version, missing
    /// authentication arguments or unusable certificate files.
    pub fn build(self) -> Result<ServiceFabricClient> {
        if self.api_version.trim().is_empty() {
            return Err(Error::Configuration(
                "api_version is required but not provided".to_string(),
            ));
        }
        self.auth.validate()?;

        let mode = self.auth.mode();
        let transport = match self.transport {
            Some(transport) => transport,
            None => build_transport(self.auth, &self.http, USER_AGENT)?,
        };

        info!(
            endpoint = %self.endpoint,
            api_version = %self.api_version,
            auth = mode,
            "built Service Fabric client"
        );

        Ok(ServiceFabricClient {
            endpoint: self.endpoint,
            api_version: self.api_version,
            transport,
            max_pages: self.http.max_pages,
        })
    }
}

impl fmt::Debug for ServiceFabricClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFabricClientBuilder")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_version", &self.api_version)
            .field("auth", &self.auth)
            .field("http", &self.http)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

/// Asynchronous Service Fabric client.
///
/// Immutable after construction; clones share the underlying transport.
#[derive(Clone)]
pub struct ServiceFabricClient {
    endpoint: Url,
    api_version: String,
    transport: Arc<dyn HttpTransport>,
    max_pages: Option<usize>,
}

impl fmt::Debug for ServiceFabricClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFabricClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_version", &self.api_version)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

impl ServiceFabricClient {
    /// Construct an unauthenticated client directly from the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the endpoint is missing or invalid.
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self> {
        ServiceFabricClientBuilder::new(endpoint)?.build()
    }

    /// Return the cluster endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Return the API version sent with every request.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// List every application in the cluster.
    pub async fn list_applications(&self) -> Result<Vec<ApplicationItem>> {
        self.list(&["Applications", ""], &QueryParams::new()).await
    }

    /// Fetch a single application by id.
    ///
    /// A `204 No Content` answer is reported as [`Error::NotFound`].
    pub async fn get_application(&self, app_id: &str) -> Result<ApplicationItem> {
        self.get_single(&["Applications", app_id], &QueryParams::new())
            .await
    }

    /// List the services of an application.
    pub async fn list_services(&self, app_id: &str) -> Result<Vec<ServiceItem>> {
        self.list(&["Applications", app_id, "$", "GetServices"], &QueryParams::new())
            .await
    }

    /// List the partitions of a service.
    pub async fn list_partitions(
        &self,
        app_id: &str,
        service_id: &str,
    ) -> Result<Vec<PartitionItem>> {
        self.list(
            &[
                "Applications",
                app_id,
                "$",
                "GetServices",
                service_id,
                "$",
                "GetPartitions",
                "",
            ],
            &QueryParams::new(),
        )
        .await
    }

    /// List the replicas of a stateful partition.
    pub async fn list_replicas(
        &self,
        app_id: &str,
        service_id: &str,
        partition_id: PartitionId,
    ) -> Result<Vec<ReplicaItem>> {
        let partition = partition_id.to_string();
        self.list(
            &replicas_path(app_id, service_id, &partition),
            &QueryParams::new(),
        )
        .await
    }

    /// List the instances of a stateless partition.
    pub async fn list_instances(
        &self,
        app_id: &str,
        service_id: &str,
        partition_id: PartitionId,
    ) -> Result<Vec<InstanceItem>> {
        let partition = partition_id.to_string();
        self.list(
            &replicas_path(app_id, service_id, &partition),
            &QueryParams::new(),
        )
        .await
    }

    /// List the properties stored under a naming-service name, values included.
    ///
    /// `name` may carry the `fabric:/` scheme; each `/`-separated component becomes
    /// one path segment.
    pub async fn list_properties(&self, name: &str) -> Result<Vec<PropertyInfo>> {
        let mut segments = vec!["Names"];
        segments.extend(name_segments(name));
        segments.extend(["$", "GetProperties"]);

        let mut params = QueryParams::new();
        params.push_flag("IncludeValues", true);
        self.list(&segments, &params).await
    }

    /// Returns true if the naming service knows `name`.
    pub async fn name_exists(&self, name: &str) -> Result<bool> {
        let mut segments = vec!["Names"];
        segments.extend(name_segments(name));

        let url = self.url(&segments, &QueryParams::new())?;
        let path = url.path().to_string();
        debug!(path = %path, "checking name");

        let response = self.transport.get(url).await?;
        match response.status {
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(false),
            _ => response.error_for_status(&path).map(|_| true),
        }
    }

    /// String-valued properties of `name`, or `None` when the name does not exist.
    pub async fn get_properties(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        if !self.name_exists(name).await? {
            return Ok(None);
        }

        let properties = self
            .list_properties(name)
            .await?
            .into_iter()
            .filter_map(|property| {
                let value = property.value?.as_str()?.to_string();
                Some((property.name, value))
            })
            .collect();
        Ok(Some(properties))
    }

    /// List every compose deployment.
    pub async fn list_deployments(&self) -> Result<Vec<ComposeDeploymentStatusInfo>> {
        self.list(&["ComposeDeployments"], &QueryParams::new()).await
    }

    /// Fetch a single compose deployment by name.
    ///
    /// A `204 No Content` answer is reported as [`Error::NotFound`].
    pub async fn get_deployment(&self, name: &str) -> Result<ComposeDeploymentStatusInfo> {
        self.get_single(&["ComposeDeployments", name], &QueryParams::new())
            .await
    }

    /// Delete an application; `force` skips graceful replica shutdown.
    pub async fn delete_application(&self, app_id: &str, force: bool) -> Result<()> {
        let mut params = QueryParams::new();
        params.push_flag("ForceRemove", force);
        self.post_delete(&["Applications", app_id, "$", "Delete"], &params)
            .await
    }

    /// Delete a service; `force` skips graceful replica shutdown.
    pub async fn delete_service(&self, service_id: &str, force: bool) -> Result<()> {
        let mut params = QueryParams::new();
        params.push_flag("ForceRemove", force);
        self.post_delete(&["Services", service_id, "$", "Delete"], &params)
            .await
    }

    /// Delete a compose deployment.
    pub async fn delete_deployment(&self, name: &str) -> Result<()> {
        self.post_delete(&["ComposeDeployments", name, "$", "Delete"], &QueryParams::new())
            .await
    }

    /// Fetch the cluster health.
    ///
    /// A `204 No Content` answer or an `Invalid` or `Unknown` aggregated state
    /// is reported as [`Error::ClusterHealth`].
    pub async fn get_cluster_health(&self) -> Result<ClusterHealth> {
        let health: ClusterHealth = match self
            .get_single(&["$", "GetClusterHealth"], &QueryParams::new())
            .await
        {
            Err(Error::NotFound(_)) => {
                return Err(Error::ClusterHealth(
                    "cluster health was not reported".to_string(),
                ))
            }
            other => other?,
        };

        if !health.aggregated_health_state.is_evaluated() {
            return Err(Error::ClusterHealth(format!(
                "aggregated health state is {}",
                health.aggregated_health_state
            )));
        }
        Ok(health)
    }

    /// Returns true when the cluster is `Ok` or `Warning`.
    pub async fn is_cluster_healthy(&self) -> Result<bool> {
        let health = self.get_cluster_health().await?;
        Ok(matches!(
            health.aggregated_health_state,
            HealthState::Ok | HealthState::Warning
        ))
    }

    pub(crate) fn url(&self, segments: &[&str], params: &QueryParams) -> Result<Url> {
        resource_url(&self.endpoint, segments, &self.api_version, params)
    }

    async fn list<T>(&self, segments: &[&str], params: &QueryParams) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let url = self.url(segments, params)?;
        fetch_all(self.transport.as_ref(), url, self.max_pages).await
    }

    pub(crate) async fn get_single<T>(&self, segments: &[&str], params: &QueryParams) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.url(segments, params)?;
        let path = url.path().to_string();
        debug!(path = %path, "fetching resource");

        let response = self.transport.get(url).await?;
        if response.status == StatusCode::NO_CONTENT {
            return Err(Error::NotFound(path));
        }
        response.error_for_status(&path)?.json(&path)
    }

    async fn post_delete(&self, segments: &[&str], params: &QueryParams) -> Result<()> {
        let url = self.url(segments, params)?;
        let path = url.path().to_string();
        debug!(path = %path, "deleting resource");

        let response = self.transport.post(url).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(path));
        }
        response.error_for_status(&path).map(|_| ())
    }
}

fn replicas_path<'a>(app_id: &'a str, service_id: &'a str, partition: &'a str) -> [&'a str; 10] {
    [
        "Applications",
        app_id,
        "$",
        "GetServices",
        service_id,
        "$",
        "GetPartitions",
        partition,
        "$",
        "GetReplicas",
    ]
}

fn name_segments(name: &str) -> impl Iterator<Item = &str> {
    name.strip_prefix(NAME_SCHEME)
        .unwrap_or(name)
        .split('/')
        .filter(|segment| !segment.is_empty())
}
