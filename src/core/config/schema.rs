//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! api_base = "https://github.example.com/api/v3"
//! user_agent = "my-service"
//!
//! [cache]
//! fresh_capacity = 500
//! fresh_ttl_secs = 5
//! validator_capacity = 50000
//!
//! [app]
//! client_id = "Iv1.0123456789abcdef"
//! client_secret = "..."
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// API base URL (GitHub Enterprise installs differ)
    pub api_base: Option<String>,

    /// User-Agent header for API requests
    pub user_agent: Option<String>,

    /// Cache sizing
    pub cache: Option<CacheConfig>,

    /// Shared application credentials for anonymous requests
    pub app: Option<AppConfig>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.api_base {
            if !(base.starts_with("https://") || base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "api_base '{}' must start with http:// or https://",
                    base
                )));
            }
        }

        if let Some(ua) = &self.user_agent {
            if ua.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "user_agent cannot be empty".into(),
                ));
            }
        }

        if let Some(cache) = &self.cache {
            cache.validate()?;
        }

        if let Some(app) = &self.app {
            app.validate()?;
        }

        Ok(())
    }
}

/// Cache sizing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Entries in the fresh (short TTL) cache
    pub fresh_capacity: Option<usize>,

    /// Fresh-cache TTL in seconds
    pub fresh_ttl_secs: Option<i64>,

    /// Entries in the validator cache
    pub validator_capacity: Option<usize>,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fresh_capacity == Some(0) {
            return Err(ConfigError::InvalidValue(
                "cache.fresh_capacity must be greater than 0".into(),
            ));
        }
        if self.validator_capacity == Some(0) {
            return Err(ConfigError::InvalidValue(
                "cache.validator_capacity must be greater than 0".into(),
            ));
        }
        if let Some(ttl) = self.fresh_ttl_secs {
            if ttl <= 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "cache.fresh_ttl_secs must be greater than 0, got {}",
                    ttl
                )));
            }
        }
        Ok(())
    }
}

/// Application credential pair.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl AppConfig {
    /// Both halves or neither.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.client_id, &self.client_secret) {
            (Some(_), None) => Err(ConfigError::InvalidValue(
                "app.client_secret is required when app.client_id is set".into(),
            )),
            (None, Some(_)) => Err(ConfigError::InvalidValue(
                "app.client_id is required when app.client_secret is set".into(),
            )),
            _ => Ok(()),
        }
    }
}

// Custom Debug to avoid exposing client_secret
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
