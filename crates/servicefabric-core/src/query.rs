//! Request URL construction.
//!
//! Every Service Fabric request is the endpoint, a list of path segments, the
//! mandatory `api-version` parameter and optional operation parameters. Path
//! segments are percent-encoded individually so identifiers can never inject
//! extra path components.

use crate::{Error, Result};
use std::fmt::Display;
use url::Url;

/// Name of the query parameter carrying the API version.
pub const API_VERSION_PARAM: &str = "api-version";

/// Name of the query parameter carrying the continuation token.
pub const CONTINUATION_PARAM: &str = "continue";

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: ToString,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Append `key=true` when the flag is set.
    pub fn push_flag(&mut self, key: &'static str, enabled: bool) {
        if enabled {
            self.pairs.push((key, "true".to_string()));
        }
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }

    /// Borrow the collected key/value pairs.
    #[must_use]
    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Build the URL for a resource below `endpoint`.
///
/// An empty final segment yields a trailing slash (`/Applications/`), which some
/// gateway routes require.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the endpoint cannot carry a path.
pub fn resource_url(
    endpoint: &Url,
    segments: &[&str],
    api_version: &str,
    params: &QueryParams,
) -> Result<Url> {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.set_fragment(None);

    url.path_segments_mut()
        .map_err(|()| {
            Error::Configuration(format!("Endpoint `{endpoint}` cannot be used as a base URL"))
        })?
        .pop_if_empty()
        .extend(segments);

    {
        let mut query = url.query_pairs_mut();
        query.append_pair(API_VERSION_PARAM, api_version);
        for (key, value) in params.pairs() {
            query.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Return `url` with the continuation token appended.
#[must_use]
pub fn with_continuation(url: &Url, token: &str) -> Url {
    let mut next = url.clone();
    next.query_pairs_mut().append_pair(CONTINUATION_PARAM, token);
    next
}
