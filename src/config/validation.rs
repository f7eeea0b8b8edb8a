use crate::config::types::{
    AuditConfig, ClassifierConfig, Config, CrawlerConfig, DatabaseConfig, RenderConfig,
    SchedulerConfig, UrlsConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_database_config(&config.database)?;
    validate_crawler_config(&config.crawler)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_render_config(&config.render)?;
    validate_audit_config(&config.audit)?;
    if let Some(classifier) = &config.classifier {
        validate_classifier_config(classifier)?;
    }
    validate_urls_config(&config.urls)?;
    Ok(())
}

fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates crawler bounds
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_depth > 20 {
        return Err(ConfigError::Validation(format!(
            "max_depth must be <= 20, got {}",
            config.max_depth
        )));
    }

    if config.max_pages < 1 || config.max_pages > 100_000 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be between 1 and 100000, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates scheduler timing and concurrency
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.poll_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "poll_interval_secs must be >= 1".to_string(),
        ));
    }

    if config.error_backoff_secs < 1 {
        return Err(ConfigError::Validation(
            "error_backoff_secs must be >= 1".to_string(),
        ));
    }

    if config.persist_concurrency < 1 || config.persist_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "persist_concurrency must be between 1 and 100, got {}",
            config.persist_concurrency
        )));
    }

    Ok(())
}

fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    validate_http_url("render service-url", &config.service_url)?;

    if config.timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "render timeout_ms must be >= 1000ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "render request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.wait_policy.trim().is_empty() {
        return Err(ConfigError::Validation(
            "render wait_policy cannot be empty".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "render user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_audit_config(config: &AuditConfig) -> Result<(), ConfigError> {
    validate_http_url("audit endpoint", &config.endpoint)?;

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "audit timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    validate_http_url("classifier endpoint", &config.endpoint)?;

    if config.api_key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "classifier api_key cannot be empty".to_string(),
        ));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "classifier model cannot be empty".to_string(),
        ));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "classifier max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

fn validate_urls_config(config: &UrlsConfig) -> Result<(), ConfigError> {
    if config.recent_window_secs < 1 {
        return Err(ConfigError::Validation(
            "recent_window_secs must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates that a configured collaborator URL is absolute http(s)
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{DiscoveryMode, RenderMode};

    fn valid_config() -> Config {
        Config {
            database: DatabaseConfig {
                path: "./scout.db".to_string(),
            },
            crawler: CrawlerConfig::default(),
            scheduler: SchedulerConfig::default(),
            render: RenderConfig::default(),
            audit: AuditConfig {
                endpoint: "http://audit.local/audit".to_string(),
                timeout_secs: 300,
            },
            classifier: None,
            urls: UrlsConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = valid_config();
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.max_pages, 1000);
        assert_eq!(config.scheduler.poll_interval_secs, 10);
        assert_eq!(config.scheduler.persist_concurrency, 10);
        assert_eq!(config.scheduler.discovery, DiscoveryMode::SinglePage);
        assert_eq!(config.render.mode, RenderMode::Remote);
        assert_eq!(config.render.wait_policy, "networkidle");
        assert_eq!(config.urls.recent_window_secs, 300);
    }

    #[test]
    fn test_empty_database_path() {
        let mut config = valid_config();
        config.database.path = "  ".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_zero_max_pages() {
        let mut config = valid_config();
        config.crawler.max_pages = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_persist_concurrency_bounds() {
        let mut config = valid_config();
        config.scheduler.persist_concurrency = 0;
        assert!(validate(&config).is_err());

        config.scheduler.persist_concurrency = 101;
        assert!(validate(&config).is_err());

        config.scheduler.persist_concurrency = 100;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_poll_interval() {
        let mut config = valid_config();
        config.scheduler.poll_interval_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_audit_endpoint() {
        let mut config = valid_config();
        config.audit.endpoint = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.audit.endpoint = "ftp://audit.local/".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_classifier_requires_api_key() {
        let mut config = valid_config();
        config.classifier = Some(ClassifierConfig {
            endpoint: "https://llm.local/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "some/model".to_string(),
            timeout_secs: 60,
            max_retries: 3,
        });
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_short_render_timeout() {
        let mut config = valid_config();
        config.render.timeout_ms = 10;
        assert!(validate(&config).is_err());
    }
}
