//! Error types for Service Fabric operations.
//!
//! This module provides the error type shared by every Service Fabric client crate,
//! including HTTP status mapping and the conversions from the underlying HTTP, URL,
//! JSON and XML libraries.

use thiserror::Error;

/// Main error type for Service Fabric operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Client construction arguments are missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection, DNS or TLS failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Server answered with a non-success status
    #[error("Service Fabric responded with {status} to `{path}`: {body}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Request path that produced the status
        path: String,
        /// Response body as text
        body: String,
    },

    /// Malformed JSON/XML or a shape mismatch
    #[error("Decode error: {0}")]
    Decode(String),

    /// Resource confirmed absent by the server
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cluster health could not be evaluated
    #[error("Cluster health could not be evaluated: {0}")]
    ClusterHealth(String),

    /// A paginated listing did not terminate within the configured page limit
    #[error("Pagination of `{path}` exceeded {limit} pages")]
    PageLimitExceeded {
        /// Request path being paginated
        path: String,
        /// Configured page limit
        limit: usize,
    },

    /// Invalid partition id
    #[error("Invalid partition id: {0}")]
    InvalidId(String),
}

/// Specialized result type for Service Fabric operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::HttpStatus { .. } => "HTTP_STATUS_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ClusterHealth(_) => "CLUSTER_HEALTH_ERROR",
            Self::PageLimitExceeded { .. } => "PAGE_LIMIT_EXCEEDED",
            Self::InvalidId(_) => "INVALID_ID",
        }
    }

    /// Returns true if the server confirmed the resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns the HTTP status carried by the error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an [`Error::HttpStatus`] from a response.
    #[must_use]
    pub fn http_status(status: reqwest::StatusCode, path: &str, body: &[u8]) -> Self {
        Self::HttpStatus {
            status: status.as_u16(),
            path: path.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Configuration(format!("invalid endpoint: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(format!("could not deserialise JSON response: {err}"))
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Self::Decode(format!("could not deserialise XML value: {err}"))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Configuration(err.to_string())
    }
}
