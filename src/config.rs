//! Inspector configuration.
//!
//! Settings come from defaults, then the environment, then explicit builder
//! calls (the CLI uses the builder for its flags).

use thiserror::Error;

/// Default Redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

const URL_SCHEMES: [&str; 4] = ["redis://", "rediss://", "unix://", "redis+unix://"];

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for connecting the inspector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig {
    /// Redis connection URL.
    pub redis_url: String,
    /// Whether to register Prometheus metrics on startup.
    pub metrics_enabled: bool,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            metrics_enabled: false,
        }
    }
}

impl InspectorConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// The result is not validated; call `validate()` after applying any
    /// overrides such as the `--redis-url` flag.
    ///
    /// # Environment Variables
    ///
    /// - `INSPECTOR_REDIS_URL`: Redis URL (falls back to `REDIS_URL`, then
    ///   `redis://127.0.0.1:6379`)
    /// - `INSPECTOR_METRICS`: Enable Prometheus metrics (default: false)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("INSPECTOR_REDIS_URL").or_else(|| lookup("REDIS_URL")) {
            config.redis_url = url;
        }

        if let Some(val) = lookup("INSPECTOR_METRICS") {
            config.metrics_enabled = parse_env_bool(&val, "INSPECTOR_METRICS")?;
        }

        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "redis_url cannot be empty".to_string(),
            ));
        }

        if !URL_SCHEMES
            .iter()
            .any(|scheme| self.redis_url.starts_with(scheme))
        {
            return Err(ConfigError::ValidationFailed(format!(
                "redis_url must start with one of {}",
                URL_SCHEMES.join(", ")
            )));
        }

        Ok(())
    }

    /// Builder method to set the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Builder method to enable or disable metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = InspectorConfig::default();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert!(!config.metrics_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = InspectorConfig::new()
            .with_redis_url("rediss://cache.internal:6380/2")
            .with_metrics(true);

        assert_eq!(config.redis_url, "rediss://cache.internal:6380/2");
        assert!(config.metrics_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lookup_prefers_inspector_url() {
        let config = InspectorConfig::from_lookup(lookup_from(&[
            ("INSPECTOR_REDIS_URL", "redis://primary:6379"),
            ("REDIS_URL", "redis://fallback:6379"),
            ("INSPECTOR_METRICS", "yes"),
        ]))
        .expect("config should load");

        assert_eq!(config.redis_url, "redis://primary:6379");
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_lookup_falls_back_to_redis_url() {
        let config =
            InspectorConfig::from_lookup(lookup_from(&[("REDIS_URL", "redis://fallback:6379")]))
                .expect("config should load");
        assert_eq!(config.redis_url, "redis://fallback:6379");

        let config = InspectorConfig::from_lookup(lookup_from(&[])).expect("config should load");
        assert_eq!(config, InspectorConfig::default());
    }

    #[test]
    fn test_invalid_metrics_flag() {
        let err = InspectorConfig::from_lookup(lookup_from(&[("INSPECTOR_METRICS", "maybe")]))
            .expect_err("invalid bool should fail");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("INSPECTOR_METRICS"));
    }

    #[test]
    fn test_override_replaces_invalid_env_url() {
        let env = lookup_from(&[("REDIS_URL", "localhost:6379")]);
        let config = InspectorConfig::from_lookup(env).expect("loading does not validate");
        assert!(config.validate().is_err());

        let config = config.with_redis_url("redis://127.0.0.1:1");
        assert!(config.validate().is_ok());
        assert_eq!(config.redis_url, "redis://127.0.0.1:1");
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        for url in ["", "   ", "http://localhost:6379", "localhost:6379"] {
            let config = InspectorConfig::new().with_redis_url(url);
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationFailed(_))),
                "url {url:?} should be rejected"
            );
        }
    }
}
