//! Configuration management for the library client

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    /// Base path every endpoint is resolved against, e.g. `https://host/api`
    pub base_url: String,
    pub timeout_secs: u64,
    /// Sent as `limit` on list requests when set; the service default applies otherwise
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries older than this are refetched on next read. `None` keeps
    /// entries fresh until a mutation invalidates them.
    pub max_age_secs: Option<u64>,
    /// Capacity of the mutation event channel
    pub event_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::environment(), env::var("LIBRARY_API_URL").ok())
    }

    /// Environment variables with prefix LIBRARY_, e.g. LIBRARY_API__TIMEOUT_SECS
    fn environment() -> Environment {
        Environment::with_prefix("LIBRARY")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_from(environment: Environment, api_url: Option<String>) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(environment)
            .set_override_option("api.base_url", api_url)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mongoose-assignment-3-beta.vercel.app/api".to_string(),
            timeout_secs: 30,
            page_size: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: None,
            event_capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.timeout_secs, 30);
        assert!(config.api.page_size.is_none());
        assert!(config.cache.max_age_secs.is_none());
        assert_eq!(config.logging.format, "pretty");
    }

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let vars = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::environment().source(Some(vars))
    }

    #[test]
    fn test_api_url_alone_keeps_other_defaults() {
        let config = AppConfig::load_from(environment(&[]), Some("http://localhost:5000/api".into()))
            .expect("Failed to load configuration");

        assert_eq!(config.api.base_url, "http://localhost:5000/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.event_capacity, 64);
    }

    #[test]
    fn test_single_nested_variable() {
        let config = AppConfig::load_from(environment(&[("LIBRARY_API__TIMEOUT_SECS", "5")]), None)
            .expect("Failed to load configuration");

        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.api.base_url, ApiConfig::default().base_url);
        assert_eq!(config.logging.level, "info");
    }
}
