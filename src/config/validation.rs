use crate::config::types::{Config, CrawlerConfig, ForumConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_forum_config(&config.forum)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates forum location settings
fn validate_forum_config(config: &ForumConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    for (name, path) in [
        ("index_path", &config.index_path),
        ("login_path", &config.login_path),
    ] {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
        base.join(path)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, path, e)))?;
    }

    if config
        .skip_thread_titles
        .iter()
        .any(|title| title.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "skip_thread_titles cannot contain empty entries".to_string(),
        ));
    }

    if config.max_threads == Some(0) {
        return Err(ConfigError::Validation(
            "max_threads must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler pacing and limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // Zero delays get the client throttled or banned
    if !config.delay_between_requests_sec.is_finite() || config.delay_between_requests_sec <= 0.0
    {
        return Err(ConfigError::Validation(format!(
            "delay_between_requests_sec must be > 0, got {}",
            config.delay_between_requests_sec
        )));
    }

    if config.page_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "page_delay_ms must be > 0".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be > 0".to_string(),
        ));
    }

    if config.max_pages_per_walk == 0 {
        return Err(ConfigError::Validation(
            "max_pages_per_walk must be >= 1".to_string(),
        ));
    }

    if config.login_attempts == 0 {
        return Err(ConfigError::Validation(
            "login_attempts must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.state_path.is_empty() {
        return Err(ConfigError::Validation(
            "state_path cannot be empty".to_string(),
        ));
    }

    if config.archive_path.is_empty() {
        return Err(ConfigError::Validation(
            "archive_path cannot be empty".to_string(),
        ));
    }

    if config.state_path == config.archive_path {
        return Err(ConfigError::Validation(
            "state_path and archive_path must differ".to_string(),
        ));
    }

    Ok(())
}
