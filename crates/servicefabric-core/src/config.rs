//! Configuration structures for Service Fabric clients.
//!
//! This module provides the connection configuration (endpoint, API version,
//! authentication mode) together with its validation rules. Validation runs before
//! any transport is built, so an invalid configuration never reaches the network.

use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "3.0";

/// Authentication strategy for a client.
///
/// Exactly one strategy is active per client and it cannot change after the client
/// is built.
#[derive(Debug, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Plain HTTP(S) without credentials.
    #[default]
    NoAuth,

    /// Mutual TLS with a client certificate, trusting only the given CA.
    CertAuth {
        /// PEM file holding the client certificate
        cert_file: PathBuf,
        /// PEM file holding the client private key
        key_file: PathBuf,
        /// PEM file holding the CA bundle that signs the cluster certificate
        ca_file: PathBuf,
    },

    /// HTTP Basic credentials, upgraded to NTLM when the gateway asks for it.
    BasicAuthNtlm {
        /// Account name, optionally `DOMAIN\user`
        username: String,
        /// Account password
        #[serde(deserialize_with = "deserialize_secret")]
        password: SecretString,
    },
}

impl AuthConfig {
    /// Certificate authentication from the three PEM file paths.
    #[must_use]
    pub fn cert(
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
        ca_file: impl Into<PathBuf>,
    ) -> Self {
        Self::CertAuth {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
            ca_file: ca_file.into(),
        }
    }

    /// NTLM-negotiated basic authentication.
    #[must_use]
    pub fn basic_ntlm(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::BasicAuthNtlm {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Short name of the active strategy, safe to log.
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::NoAuth => "no_auth",
            Self::CertAuth { .. } => "cert_auth",
            Self::BasicAuthNtlm { .. } => "basic_auth_ntlm",
        }
    }

    /// Check that every argument required by the active strategy is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first missing argument.
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::NoAuth => Ok(()),
            Self::CertAuth {
                cert_file,
                key_file,
                ca_file,
            } => {
                require_path(ca_file, "ca_file")?;
                require_path(cert_file, "cert_file")?;
                require_path(key_file, "key_file")
            }
            Self::BasicAuthNtlm { username, password } => {
                if username.is_empty() {
                    return Err(Error::Configuration(
                        "username is required but not provided".to_string(),
                    ));
                }
                if password.expose_secret().is_empty() {
                    return Err(Error::Configuration(
                        "password is required but not provided".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn require_path(path: &Path, name: &str) -> Result<(), Error> {
    if path.as_os_str().is_empty() {
        return Err(Error::Configuration(format!(
            "{name} is required but not provided"
        )));
    }
    Ok(())
}

/// Configuration for a Service Fabric client instance.
#[derive(Debug, Deserialize, Validate)]
pub struct FabricClientConfig {
    /// Cluster management endpoint (e.g. `https://cluster.example.com:19080`)
    #[validate(url)]
    pub endpoint: String,

    /// Value sent as the `api-version` query parameter
    #[validate(length(min = 1))]
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Authentication strategy
    #[serde(default)]
    pub auth: AuthConfig,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Optional bound on pages fetched by a single listing
    #[serde(default)]
    pub max_pages: Option<usize>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    crate::client::DEFAULT_REQUEST_TIMEOUT
}

impl FabricClientConfig {
    /// Create a configuration for the given endpoint without authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is missing or not a valid URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            endpoint: endpoint.into(),
            api_version: default_api_version(),
            auth: AuthConfig::NoAuth,
            request_timeout_secs: default_request_timeout_secs(),
            max_pages: None,
        };

        config.validate_all()?;
        Ok(config)
    }

    /// Set the API version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set the authentication strategy.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Bound the number of pages fetched by a single listing.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the field rules and the authentication arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first problem found.
    pub fn validate_all(&self) -> Result<(), Error> {
        if self.endpoint.is_empty() {
            return Err(Error::Configuration(
                "endpoint missing for client configuration".to_string(),
            ));
        }
        self.validate()
            .map_err(|e| Error::Configuration(format!("Invalid configuration: {e}")))?;
        self.auth.validate()
    }

    /// Parse the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or cannot carry a path.
    pub fn parse_endpoint(&self) -> Result<Url, Error> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::Configuration(format!("Invalid endpoint URL: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "Endpoint `{}` cannot be used as a base URL",
                self.endpoint
            )));
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_defaults() {
        let config = FabricClientConfig::new("http://localhost:19080").unwrap();
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.auth.mode(), "no_auth");
        assert!(config.max_pages.is_none());
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let err = FabricClientConfig::new("").unwrap_err();
        assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("endpoint")));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = FabricClientConfig::new("not a url").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_empty_api_version_rejected() {
        let config = FabricClientConfig::new("http://localhost:19080")
            .unwrap()
            .with_api_version("");
        assert!(matches!(config.validate_all(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_timeout_range() {
        let config = FabricClientConfig::new("http://localhost:19080")
            .unwrap()
            .with_timeout(0);
        assert!(config.validate_all().is_err());

        let config = config.with_timeout(15);
        assert!(config.validate_all().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_cert_auth_requires_ca_file() {
        let auth = AuthConfig::cert("client.pem", "client.key", "");
        let err = auth.validate().unwrap_err();
        assert_eq!(
            err,
            Error::Configuration("ca_file is required but not provided".to_string())
        );
    }

    #[test]
    fn test_cert_auth_requires_cert_and_key() {
        let err = AuthConfig::cert("", "client.key", "ca.pem").validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.starts_with("cert_file")));

        let err = AuthConfig::cert("client.pem", "", "ca.pem").validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.starts_with("key_file")));

        assert!(AuthConfig::cert("client.pem", "client.key", "ca.pem")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_basic_auth_requires_credentials() {
        assert!(AuthConfig::basic_ntlm("", "secret").validate().is_err());
        assert!(AuthConfig::basic_ntlm("admin", "").validate().is_err());
        assert!(AuthConfig::basic_ntlm("CORP\\admin", "secret").validate().is_ok());
    }

    #[test]
    fn test_auth_validated_with_config() {
        let config = FabricClientConfig::new("https://cluster:19080")
            .unwrap()
            .with_auth(AuthConfig::cert("client.pem", "client.key", ""));
        assert!(matches!(config.validate_all(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_deserialize_cert_auth_config() {
        let config: FabricClientConfig = serde_json::from_str(
            r#"{
                "endpoint": "https://cluster.example.com:19080",
                "auth": {
                    "mode": "cert_auth",
                    "cert_file": "/etc/sf/client.pem",
                    "key_file": "/etc/sf/client.key",
                    "ca_file": "/etc/sf/ca.pem"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.auth.mode(), "cert_auth");
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_deserialize_basic_auth_config() {
        let config: FabricClientConfig = serde_json::from_str(
            r#"{
                "endpoint": "https://cluster.example.com:19080",
                "api_version": "6.0",
                "request_timeout_secs": 20,
                "max_pages": 100,
                "auth": {"mode": "basic_auth_ntlm", "username": "admin", "password": "pw"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.api_version, "6.0");
        assert_eq!(config.max_pages, Some(100));
        match &config.auth {
            AuthConfig::BasicAuthNtlm { username, password } => {
                assert_eq!(username, "admin");
                assert_eq!(password.expose_secret(), "pw");
            }
            other => panic!("unexpected auth mode {}", other.mode()),
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let auth = AuthConfig::basic_ntlm("admin", "hunter2");
        assert!(!format!("{auth:?}").contains("hunter2"));
    }

    #[test]
    fn test_parse_endpoint() {
        let config = FabricClientConfig::new("http://localhost:19080").unwrap();
        let url = config.parse_endpoint().unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(19080));
    }
}
