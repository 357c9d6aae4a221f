use crate::config::types::{Config, RangeConfig};
use crate::config::validation::validate;
use crate::window::{day_end, day_start};
use crate::ConfigError;
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Which end of a range a date-only value stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    /// A bare date expands to its first instant
    Start,
    /// A bare date expands to its last instant
    End,
}

/// Parses a range bound given as `YYYY-MM-DD` or an RFC 3339 timestamp
///
/// Bare dates are interpreted in UTC and expanded to the first or last
/// instant of the day. Timestamps with an offset are converted to UTC.
pub fn parse_range_bound(value: &str, bound: RangeBound) -> Result<DateTime<Utc>, ConfigError> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(match bound {
            RangeBound::Start => day_start(date),
            RangeBound::End => day_end(date),
        });
    }

    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|_| ConfigError::InvalidDate(value.to_string()))
}

impl RangeConfig {
    /// Returns the parsed `(since, to)` pair
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ConfigError> {
        Ok((
            parse_range_bound(&self.since, RangeBound::Start)?,
            parse_range_bound(&self.to, RangeBound::End)?,
        ))
    }
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use challenge_harvester::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Batch size: {}", config.harvester.batch_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is recorded in the run summary so a set of output files can be
/// traced back to the configuration that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
