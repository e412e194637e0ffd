//! Continuation-token pagination.
//!
//! Service Fabric list endpoints answer with one page at a time. A page carries
//! `ContinuationToken` and either `Items` or (for property listings) `Properties`;
//! an empty or absent token marks the last page.

use crate::query::with_continuation;
use crate::transport::HttpTransport;
use crate::types::null_as_default;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Token for the next page; empty or absent on the last page
    #[serde(default)]
    pub continuation_token: Option<String>,

    /// Items on this page
    #[serde(
        default = "Vec::new",
        alias = "Properties",
        deserialize_with = "null_as_default"
    )]
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// The continuation token, if another page follows.
    #[must_use]
    pub fn next_token(&self) -> Option<&str> {
        self.continuation_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

/// Fetch every page starting at `url` and concatenate the items in server order.
///
/// Requests are issued one after another; the next page is only requested once
/// the previous one has been decoded. Any failure discards what was collected.
///
/// # Errors
///
/// Returns the first transport error, [`Error::HttpStatus`] for a non-2xx page,
/// [`Error::Decode`] for a malformed page, or [`Error::PageLimitExceeded`] when
/// `max_pages` pages were fetched and the server still reports more.
pub async fn fetch_all<T>(
    transport: &dyn HttpTransport,
    url: Url,
    max_pages: Option<usize>,
) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let path = url.path().to_string();
    let mut items = Vec::new();
    let mut next = url.clone();
    let mut pages = 0usize;

    loop {
        let response = transport.get(next).await?.error_for_status(&path)?;
        let page: Page<T> = response.json(&path)?;
        pages += 1;

        debug!(
            path = %path,
            page = pages,
            items = page.items.len(),
            "fetched page"
        );

        let token = page.next_token().map(str::to_owned);
        items.extend(page.items);

        let Some(token) = token else {
            return Ok(items);
        };
        if let Some(limit) = max_pages {
            if pages >= limit {
                return Err(Error::PageLimitExceeded { path, limit });
            }
        }
        next = with_continuation(&url, &token);
    }
}
