//! Service type extension resolution.
//!
//! Service manifests can attach named XML blobs ("extensions") to a service type.
//! The resolver finds the first service type with the requested name, then the first
//! extension with the requested key, and decodes its XML into a caller-chosen type.
//! A missing type or key is not an error: the caller gets `T::default()`.

use crate::client::ServiceFabricClient;
use crate::models::{ApplicationItem, ServiceItem, ServiceTypeInfo};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use servicefabric_core::query::QueryParams;
use servicefabric_core::Error;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct LabelsDocument {
    #[serde(rename = "Label", default)]
    labels: Vec<LabelEntry>,
}

#[derive(Debug, Deserialize)]
struct LabelEntry {
    #[serde(rename = "@Key")]
    key: String,
    #[serde(rename = "$text", default)]
    value: String,
}

impl ServiceFabricClient {
    /// List the service types declared by an application type version.
    pub async fn list_service_types(
        &self,
        app_type: &str,
        app_type_version: &str,
    ) -> Result<Vec<ServiceTypeInfo>> {
        let mut params = QueryParams::new();
        params.push("ApplicationTypeVersion", app_type_version);
        self.get_single(&["ApplicationTypes", app_type, "$", "GetServiceTypes"], &params)
            .await
    }

    /// Resolve and decode a service type extension.
    ///
    /// The service type name must match exactly; the extension key is compared
    /// ignoring ASCII case. The first match wins at both levels.
    ///
    /// # Errors
    ///
    /// Returns the request error when the service types cannot be fetched and
    /// [`Error::Decode`] when the matched XML does not fit `T`.
    pub async fn get_service_extension<T>(
        &self,
        app_type: &str,
        app_type_version: &str,
        service_type_name: &str,
        extension_key: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let service_types = self.list_service_types(app_type, app_type_version).await?;
        resolve_extension(&service_types, service_type_name, extension_key)
    }

    /// [`get_service_extension`](Self::get_service_extension) for a listed service
    /// of a listed application.
    pub async fn get_service_extension_for<T>(
        &self,
        application: &ApplicationItem,
        service: &ServiceItem,
        extension_key: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        self.get_service_extension(
            &application.type_name,
            &application.type_version,
            &service.type_name,
            extension_key,
        )
        .await
    }

    /// Decode a `<Labels><Label Key="..">..</Label></Labels>` extension into a map.
    ///
    /// When a key repeats, its first value is kept.
    pub async fn get_service_labels(
        &self,
        application: &ApplicationItem,
        service: &ServiceItem,
        extension_key: &str,
    ) -> Result<BTreeMap<String, String>> {
        let document: LabelsDocument = self
            .get_service_extension_for(application, service, extension_key)
            .await?;
        Ok(collect_labels(document))
    }
}

/// Find the extension `extension_key` on service type `service_type_name` and decode it.
///
/// # Errors
///
/// Returns [`Error::Decode`] when the matched XML does not fit `T`.
pub fn resolve_extension<T>(
    service_types: &[ServiceTypeInfo],
    service_type_name: &str,
    extension_key: &str,
) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(service_type) = service_types
        .iter()
        .find(|service_type| service_type.name() == service_type_name)
    else {
        debug!(service_type_name, "no matching service type");
        return Ok(T::default());
    };

    let Some(extension) = service_type.extension(extension_key) else {
        debug!(service_type_name, extension_key, "no matching extension");
        return Ok(T::default());
    };

    quick_xml::de::from_str(&extension.value).map_err(|err| {
        Error::Decode(format!(
            "could not deserialise extension `{}` of `{service_type_name}`: {err}",
            extension.key
        ))
    })
}

fn collect_labels(document: LabelsDocument) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for label in document.labels {
        labels.entry(label.key).or_insert(label.value);
    }
    labels
}
