//! HTTP transport capability and the transport configurator.
//!
//! Clients never talk to `reqwest` directly: every request goes through an
//! [`HttpTransport`], which only knows how to issue a GET or a bodiless POST and hand
//! back the status and body. [`build_transport`] turns an [`AuthConfig`] into the
//! matching transport, and callers can inject their own implementation instead.

use crate::client::ClientConfig;
use crate::config::AuthConfig;
use crate::ntlm::{NtlmCredentials, NtlmTransport};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use reqwest::{Certificate, Client, ClientBuilder, Identity, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Response status
    pub status: StatusCode,
    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response from its parts.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for any 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-2xx response into [`Error::HttpStatus`].
    ///
    /// # Errors
    ///
    /// Returns the status error when the response is not successful.
    pub fn error_for_status(self, path: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::http_status(self.status, path, &self.body))
        }
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] when the body does not match `T`.
    pub fn json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.body).map_err(|err| {
            Error::Decode(format!("could not deserialise JSON response for `{path}`: {err}"))
        })
    }
}

/// Minimal HTTP capability used by every Service Fabric operation.
///
/// Implementations apply their authentication to every request. A non-2xx status is
/// not an error at this layer; only failures to complete the exchange are.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] or [`Error::Timeout`] if the exchange fails.
    async fn get(&self, url: Url) -> Result<HttpResponse>;

    /// Issue a POST request with an empty body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] or [`Error::Timeout`] if the exchange fails.
    async fn post(&self, url: Url) -> Result<HttpResponse>;
}

/// Transport backed by a pre-configured `reqwest` client.
///
/// Used for both the unauthenticated and the certificate-authenticated modes; the
/// difference lives entirely in the client's TLS configuration.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub const fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: Url) -> Result<HttpResponse> {
        debug!(url = %url, "GET");
        send(self.http.get(url)).await
    }

    async fn post(&self, url: Url) -> Result<HttpResponse> {
        debug!(url = %url, "POST");
        send(empty_post(&self.http, url)).await
    }
}

pub(crate) fn empty_post(http: &Client, url: Url) -> RequestBuilder {
    http.post(url).header(CONTENT_LENGTH, "0")
}

pub(crate) async fn send(request: RequestBuilder) -> Result<HttpResponse> {
    let response = request.header(ACCEPT, "application/json").send().await?;
    read_response(response).await
}

pub(crate) async fn read_response(response: reqwest::Response) -> Result<HttpResponse> {
    let status = response.status();
    let body = response.bytes().await?;
    Ok(HttpResponse::new(status, body.to_vec()))
}

/// Build the transport matching `auth`.
///
/// The authentication arguments are validated and any certificate files are loaded
/// before this returns, so configuration problems surface here and never during a
/// request.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for missing arguments, unreadable or malformed
/// PEM files, or a client that cannot be built.
pub fn build_transport(
    auth: AuthConfig,
    config: &ClientConfig,
    user_agent: &str,
) -> Result<Arc<dyn HttpTransport>> {
    auth.validate()?;
    info!(mode = auth.mode(), "building Service Fabric transport");

    let builder = base_builder(config, user_agent);

    match auth {
        AuthConfig::NoAuth => Ok(Arc::new(ReqwestTransport::new(finish(builder)?))),
        AuthConfig::CertAuth {
            cert_file,
            key_file,
            ca_file,
        } => {
            let builder = configure_client_tls(builder, &cert_file, &key_file, &ca_file)?;
            Ok(Arc::new(ReqwestTransport::new(finish(builder)?)))
        }
        AuthConfig::BasicAuthNtlm { username, password } => {
            let credentials = NtlmCredentials::new(username, password);
            Ok(Arc::new(NtlmTransport::new(finish(builder)?, credentials)))
        }
    }
}

fn base_builder(config: &ClientConfig, user_agent: &str) -> ClientBuilder {
    ClientBuilder::new()
        .user_agent(user_agent)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .gzip(config.enable_compression)
}

fn finish(builder: ClientBuilder) -> Result<Client> {
    builder
        .build()
        .map_err(|err| Error::Configuration(format!("Failed to build HTTP client: {err}")))
}

// Trust is limited to the supplied CA; chain and hostname verification stay on.
fn configure_client_tls(
    builder: ClientBuilder,
    cert_file: &Path,
    key_file: &Path,
    ca_file: &Path,
) -> Result<ClientBuilder> {
    let mut identity_pem = read_pem(cert_file, "client certificate")?;
    identity_pem.push(b'\n');
    identity_pem.extend(read_pem(key_file, "client key")?);
    let identity = Identity::from_pem(&identity_pem).map_err(|err| {
        Error::Configuration(format!("unable to load X509 key pair: {err}"))
    })?;

    let ca_pem = read_pem(ca_file, "CA certificate")?;
    let roots = Certificate::from_pem_bundle(&ca_pem)
        .map_err(|err| Error::Configuration(format!("Invalid CA certificate: {err}")))?;
    if roots.is_empty() {
        return Err(Error::Configuration(format!(
            "no CA certificate found in {}",
            ca_file.display()
        )));
    }

    let mut builder = builder
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
        .identity(identity);
    for root in roots {
        builder = builder.add_root_certificate(root);
    }
    Ok(builder)
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    debug!("loading {what} from {}", path.display());
    std::fs::read(path).map_err(|err| {
        Error::Configuration(format!("unable to read {what} {}: {err}", path.display()))
    })
}
