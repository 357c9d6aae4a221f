//! URL construction for catalog requests

use crate::catalog::Status;
use chrono::{DateTime, SecondsFormat, Utc};
use url::{ParseError, Url};

/// Query parameter carrying the lower bound of a window
pub const WINDOW_START_PARAM: &str = "endDateStart";

/// Query parameter carrying the upper bound of a window
pub const WINDOW_END_PARAM: &str = "startDateEnd";

/// Query parameter carrying the 1-based page number
pub const PAGE_PARAM: &str = "page";

/// Query parameter carrying the status filter
pub const STATUS_PARAM: &str = "status";

/// Formats a timestamp the way the catalog expects it in filters
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Listing endpoint with its static query parameters applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    base: Url,
}

impl ListingQuery {
    /// Creates a listing query
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Listing endpoint URL (any existing query is replaced)
    /// * `default_query` - Raw query string applied to every listing request
    /// * `status` - Status filter; `Status::All` adds no parameter
    pub fn new(mut endpoint: Url, default_query: Option<&str>, status: Status) -> Self {
        endpoint.set_query(default_query.filter(|q| !q.is_empty()));

        if let Some(value) = status.query_value() {
            endpoint.query_pairs_mut().append_pair(STATUS_PARAM, value);
        }

        Self { base: endpoint }
    }

    /// Returns the listing URL filtered to `[start, end]`
    pub fn window_url(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair(WINDOW_START_PARAM, &format_timestamp(start))
            .append_pair(WINDOW_END_PARAM, &format_timestamp(end));
        url
    }
}

/// Returns `template` with the page number appended
pub fn page_url(template: &Url, page: u32) -> Url {
    let mut url = template.clone();
    url.query_pairs_mut()
        .append_pair(PAGE_PARAM, &page.to_string());
    url
}

/// Returns the sub-resource URL for a join key: `<endpoint>/<key>`
pub fn sub_resource_url(endpoint: &Url, join_key: &str) -> Result<Url, ParseError> {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(join_key);
    Ok(url)
}
