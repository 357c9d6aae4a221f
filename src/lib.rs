//! Challenge Harvester: bulk collection of a paginated, rate-limited catalog
//!
//! This crate harvests a competition-challenge listing and its nested
//! registrant lists into flat JSON files, splitting the requested time range
//! into yearly query windows and retrying failed requests in bounded rounds.

pub mod catalog;
pub mod config;
pub mod harvester;
pub mod output;
pub mod state;
pub mod window;

use thiserror::Error;

/// Main error type for harvester operations
///
/// Per-request failures (HTTP errors, timeouts, malformed bodies) are not
/// represented here: they are classified into a [`state::TaskOutcome`] and
/// retried or reported. An `Err` of this type aborts the enclosing stage.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid time range: since {since} is after to {to}")]
    InvalidRange { since: String, to: String },

    #[error("Metadata probe failed for year {year}: {reason}")]
    ProbeFailed { year: i32, reason: String },

    #[error("Failed to write output {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid date '{0}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),

    #[error("Unknown challenge status: {0}")]
    UnknownStatus(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::Status;
pub use config::Config;
pub use harvester::{harvest, HarvestContext};
pub use output::HarvestReport;
pub use window::{partition, FetchWindow};
