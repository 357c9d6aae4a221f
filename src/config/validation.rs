use crate::config::types::{CatalogConfig, Config, HarvesterConfig, OutputConfig, RangeConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_range(&config.range)?;
    validate_catalog_config(&config.catalog)?;
    validate_harvester_config(&config.harvester)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates that both bounds parse and are ordered
pub fn validate_range(range: &RangeConfig) -> Result<(), ConfigError> {
    let (since, to) = range.bounds()?;

    if since > to {
        return Err(ConfigError::Validation(format!(
            "since ({}) must not be after to ({})",
            range.since, range.to
        )));
    }

    Ok(())
}

/// Validates catalog configuration
fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    for (name, path) in [
        ("challenge_path", &config.challenge_path),
        ("sub_resource_path", &config.sub_resource_path),
    ] {
        if !path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "{} must start with '/', got '{}'",
                name, path
            )));
        }
    }

    if config.sub_resource_field.is_empty() {
        return Err(ConfigError::Validation(
            "sub_resource_field cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates harvester configuration
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    if config.max_rounds < 1 {
        return Err(ConfigError::Validation(format!(
            "max_rounds must be >= 1, got {}",
            config.max_rounds
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.summary_file.is_empty()
        || config.summary_file.contains('/')
        || config.summary_file.contains('\\')
    {
        return Err(ConfigError::Validation(format!(
            "summary_file must be a plain file name, got '{}'",
            config.summary_file
        )));
    }

    Ok(())
}
