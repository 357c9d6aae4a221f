//! HTTP access to the catalog
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the run-scoped HTTP client with the bearer credential
//! - HEAD probes reading the pagination headers
//! - GET requests for listing pages and sub-resources
//! - Classifying transport failures

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::{ConfigError, HarvestError};

/// Response header carrying the total number of matching items
pub const TOTAL_HEADER: &str = "X-Total";

/// Response header carrying the total number of pages
pub const TOTAL_PAGES_HEADER: &str = "X-Total-Pages";

/// A failed request to the catalog
///
/// Every variant is transient from the harvester's point of view: the same
/// request may succeed in a later round.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status_code}")]
    Http { status_code: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("missing or invalid '{0}' header")]
    MissingHeader(&'static str),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Http {
                status_code: status.as_u16(),
            }
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Pagination metadata returned by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetadata {
    /// Total number of items matching the query
    pub total_items: u64,

    /// Total number of result pages
    pub total_pages: u32,
}

/// Builds the HTTP client shared by every request of a run
///
/// # Arguments
///
/// * `timeout` - Per-request timeout
/// * `token` - Bearer token; when `None` requests are sent unauthenticated
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - The token is not a valid header value or the client failed to build
pub fn build_http_client(timeout: Duration, token: Option<&str>) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            ConfigError::Validation("auth token contains invalid header characters".to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Http {
            status_code: status.as_u16(),
        })
    }
}

fn parse_header<T: std::str::FromStr>(
    response: &Response,
    name: &'static str,
) -> Result<T, FetchError> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .ok_or(FetchError::MissingHeader(name))
}

/// Sends a HEAD request and reads the pagination headers
pub async fn probe(client: &Client, url: &Url) -> Result<PageMetadata, FetchError> {
    tracing::debug!("HEAD {}", url);
    let response = check_status(client.head(url.clone()).send().await?)?;

    Ok(PageMetadata {
        total_items: parse_header(&response, TOTAL_HEADER)?,
        total_pages: parse_header(&response, TOTAL_PAGES_HEADER)?,
    })
}

/// Sends a GET request and returns the full response body
pub async fn fetch_body(client: &Client, url: &Url) -> Result<Vec<u8>, FetchError> {
    tracing::debug!("GET {}", url);
    let response = check_status(client.get(url.clone()).send().await?)?;
    let body = response.bytes().await?;
    Ok(body.to_vec())
}
