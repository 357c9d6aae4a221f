use crate::catalog::Status;
use chrono::{Duration as DateDuration, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub range: RangeConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub harvester: HarvesterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Time range to harvest
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    /// Start of the range: a `YYYY-MM-DD` date (start of day, UTC) or an RFC 3339 timestamp
    pub since: String,

    /// End of the range: a `YYYY-MM-DD` date (end of day, UTC) or an RFC 3339 timestamp
    pub to: String,
}

impl Default for RangeConfig {
    /// Yesterday .. today, in UTC
    fn default() -> Self {
        let today = Utc::now().date_naive();
        Self {
            since: (today - DateDuration::days(1)).format("%Y-%m-%d").to_string(),
            to: today.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Upstream catalog API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Scheme and host of the API, e.g. `https://api.example.com`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the challenge listing endpoint
    #[serde(rename = "challenge-path", default = "default_challenge_path")]
    pub challenge_path: String,

    /// Raw query string added to every listing request
    #[serde(rename = "default-query", default = "default_query")]
    pub default_query: Option<String>,

    /// Path of the per-challenge sub-resource endpoint
    #[serde(rename = "sub-resource-path", default = "default_sub_resource_path")]
    pub sub_resource_path: String,

    /// Field inside `result.content` holding the sub-resource list
    #[serde(rename = "sub-resource-field", default = "default_sub_resource_field")]
    pub sub_resource_field: String,

    /// Status filter for the listing
    #[serde(default)]
    pub status: Status,

    /// Environment variable holding the bearer token
    #[serde(rename = "auth-token-env", default = "default_auth_token_env")]
    pub auth_token_env: Option<String>,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl CatalogConfig {
    /// Creates a catalog configuration with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            challenge_path: default_challenge_path(),
            default_query: default_query(),
            sub_resource_path: default_sub_resource_path(),
            sub_resource_field: default_sub_resource_field(),
            status: Status::default(),
            auth_token_env: default_auth_token_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reads the bearer token from the configured environment variable
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|token| !token.is_empty())
    }
}

/// What to do when a window's metadata probe fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbeFailurePolicy {
    /// Treat the window as having zero pages and continue
    #[default]
    Skip,

    /// Fail the whole run
    Abort,
}

/// Harvest engine behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Whether to fetch sub-resources for items that reference them
    #[serde(rename = "with-sub-resources", default)]
    pub with_sub_resources: bool,

    /// Number of sub-resource requests issued together
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause before every sub-resource batch but the first, and before each retry wave (milliseconds)
    #[serde(rename = "batch-delay-ms", default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Maximum number of rounds per stage, the first attempt included
    #[serde(rename = "max-rounds", default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Split sub-resource retry waves into batches as well
    #[serde(rename = "rebatch-retries", default)]
    pub rebatch_retries: bool,

    #[serde(rename = "on-probe-failure", default)]
    pub on_probe_failure: ProbeFailurePolicy,
}

impl HarvesterConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            with_sub_resources: false,
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            max_rounds: default_max_rounds(),
            rebatch_retries: false,
            on_probe_failure: ProbeFailurePolicy::default(),
        }
    }
}

/// How sub-resource output files are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SubResourceLayout {
    /// `{year}_{page}_{id}_registrants.json`
    #[default]
    ByPage,

    /// `{id}_registrants.json`
    ByParent,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving every output file (created if missing)
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    #[serde(rename = "sub-resource-layout", default)]
    pub sub_resource_layout: SubResourceLayout,

    /// File name of the markdown run summary, written inside `directory`
    #[serde(rename = "summary-file", default = "default_summary_file")]
    pub summary_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            sub_resource_layout: SubResourceLayout::default(),
            summary_file: default_summary_file(),
        }
    }
}

fn default_challenge_path() -> String {
    "/v5/challenges".to_string()
}

fn default_query() -> Option<String> {
    Some("perPage=100".to_string())
}

fn default_sub_resource_path() -> String {
    "/v4/challenges".to_string()
}

fn default_sub_resource_field() -> String {
    "registrants".to_string()
}

fn default_auth_token_env() -> Option<String> {
    Some("JWT".to_string())
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_ms() -> u64 {
    1500
}

fn default_max_rounds() -> u32 {
    10
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("./data")
}

fn default_summary_file() -> String {
    "harvest_summary.md".to_string()
}
