use crate::config::types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::url::normalize_url;
use crate::ConfigError;
use url::Url;

const MAX_CONCURRENT_FETCHES: u32 = 64;
const MIN_REQUEST_TIMEOUT_MS: u64 = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    normalize_url(config.seed_url.trim()).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid seed-url '{}': {}", config.seed_url, e))
    })?;

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > MAX_CONCURRENT_FETCHES
    {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and {}, got {}",
            MAX_CONCURRENT_FETCHES, config.max_concurrent_fetches
        )));
    }

    if config.request_timeout_ms < MIN_REQUEST_TIMEOUT_MS {
        return Err(ConfigError::Validation(format!(
            "request_timeout_ms must be >= {}ms, got {}ms",
            MIN_REQUEST_TIMEOUT_MS, config.request_timeout_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            crawler: CrawlerConfig::with_seed("https://example.com/"),
            user_agent: UserAgentConfig::default(),
            output: OutputConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_seed_must_be_http() {
        let mut config = valid_config();
        config.crawler.seed_url = "ftp://example.com/".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));

        config.crawler.seed_url = "not a url".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_seed_may_be_plain_http() {
        let mut config = valid_config();
        config.crawler.seed_url = "http://site.test/a".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut config = valid_config();
        config.crawler.max_concurrent_fetches = 0;
        assert!(validate(&config).is_err());
        config.crawler.max_concurrent_fetches = 65;
        assert!(validate(&config).is_err());
        config.crawler.max_concurrent_fetches = 1;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_timeout_minimum() {
        let mut config = valid_config();
        config.crawler.request_timeout_ms = 50;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_crawler_name_characters() {
        let mut config = valid_config();
        config.user_agent.crawler_name = "Bad Name".to_string();
        assert!(validate(&config).is_err());
        config.user_agent.crawler_name = "Good-Name2".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_contact_url_validated() {
        let mut config = valid_config();
        config.user_agent.contact_url = Some("nope".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_database_path() {
        let mut config = valid_config();
        config.output.database_path = "  ".to_string();
        assert!(validate(&config).is_err());
    }
}
