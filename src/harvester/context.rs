//! Run-scoped harvest context
//!
//! The context owns everything a run shares across stages: the validated
//! configuration, the HTTP client carrying the credential, the prepared
//! endpoints and the output sink. It is created once per run and dropped
//! when the run ends, which releases the client's connection pool.

use crate::catalog::{build_http_client, ListingQuery};
use crate::config::Config;
use crate::output::{FileSink, OutputSink};
use crate::window::{partition, FetchWindow};
use crate::HarvestError;
use reqwest::Client;
use url::Url;

/// Shared state for one harvest run
pub struct HarvestContext {
    pub(crate) config: Config,
    pub(crate) client: Client,
    pub(crate) listing: ListingQuery,
    pub(crate) sub_resource_endpoint: Url,
    pub(crate) sink: Box<dyn OutputSink>,
}

impl HarvestContext {
    /// Creates a context writing into the configured output directory
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(HarvestContext)` - Client built and output directory created
    /// * `Err(HarvestError)` - Invalid URLs, invalid token, or unwritable output directory
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let sink = FileSink::create(&config.output.directory, config.output.sub_resource_layout)?;
        Self::with_sink(config, Box::new(sink))
    }

    /// Creates a context with a caller-provided sink
    pub fn with_sink(config: Config, sink: Box<dyn OutputSink>) -> Result<Self, HarvestError> {
        let listing = listing_query(&config)?;
        let sub_resource_endpoint =
            Url::parse(&config.catalog.base_url)?.join(&config.catalog.sub_resource_path)?;

        let token = config.catalog.auth_token();
        if token.is_none() {
            tracing::debug!("No auth token configured, sending unauthenticated requests");
        }
        let client = build_http_client(config.catalog.request_timeout(), token.as_deref())?;

        Ok(Self {
            config,
            client,
            listing,
            sub_resource_endpoint,
            sink,
        })
    }

    /// Splits the configured range into query windows
    pub fn windows(&self) -> Result<Vec<FetchWindow>, HarvestError> {
        let (since, to) = self.config.range.bounds()?;
        partition(since, to, &self.listing)
    }
}

/// Builds the listing query described by a configuration
pub fn listing_query(config: &Config) -> Result<ListingQuery, HarvestError> {
    let endpoint = Url::parse(&config.catalog.base_url)?.join(&config.catalog.challenge_path)?;
    Ok(ListingQuery::new(
        endpoint,
        config.catalog.default_query.as_deref(),
        config.catalog.status,
    ))
}

/// Computes the query windows for a configuration without touching the network
pub fn plan_windows(config: &Config) -> Result<Vec<FetchWindow>, HarvestError> {
    let (since, to) = config.range.bounds()?;
    partition(since, to, &listing_query(config)?)
}
