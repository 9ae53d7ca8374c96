//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. An explicit path (e.g. `--config`); must exist
//! 2. `$TRELLIS_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/trellis/config.toml`
//! 4. `~/.trellis/config.toml`
//!
//! No file means defaults.
//!
//! # Environment
//!
//! `TRELLIS_CLIENT_ID` / `TRELLIS_CLIENT_SECRET` supply the application
//! credential pair when the file has no `[app]` section.
//!
//! # Example
//!
//! ```no_run
//! use trellis::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("API: {}", config.api_base());
//! println!("Fresh TTL: {}", config.cache_settings().fresh_ttl);
//! ```

pub mod schema;

pub use schema::{AppConfig, CacheConfig, FileConfig};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use thiserror::Error;

use crate::cache::CacheSettings;
use crate::forge::github::{AppCredentials, DEFAULT_API_BASE, DEFAULT_USER_AGENT};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "TRELLIS_CONFIG";

/// Environment variable supplying the application client id.
pub const CLIENT_ID_ENV: &str = "TRELLIS_CLIENT_ID";

/// Environment variable supplying the application client secret.
pub const CLIENT_SECRET_ENV: &str = "TRELLIS_CLIENT_SECRET";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: FileConfig,
    /// Application pair taken from the environment
    env_app: Option<AppConfig>,
    /// Path the file was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `explicit` or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit` is missing, or if a config file exists
    /// but cannot be read, parsed or validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let found = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::find_file(),
        };

        let mut config = match found {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        let id = std::env::var(CLIENT_ID_ENV).ok();
        let secret = std::env::var(CLIENT_SECRET_ENV).ok();
        if id.is_some() || secret.is_some() {
            let app = AppConfig {
                client_id: id,
                client_secret: secret,
            };
            app.validate()?;
            config.env_app = Some(app);
        }

        Ok(config)
    }

    /// Read, parse and validate one config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: FileConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        Ok(Self {
            file,
            env_app: None,
            path: Some(path.to_path_buf()),
        })
    }

    /// Locate a config file in the default locations.
    fn find_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("trellis/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".trellis/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Path the configuration was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// API base URL.
    pub fn api_base(&self) -> &str {
        self.file.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// User-Agent header value.
    pub fn user_agent(&self) -> &str {
        self.file.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Cache capacities and TTL.
    pub fn cache_settings(&self) -> CacheSettings {
        let defaults = CacheSettings::default();
        let Some(cache) = &self.file.cache else {
            return defaults;
        };
        CacheSettings {
            fresh_capacity: cache.fresh_capacity.unwrap_or(defaults.fresh_capacity),
            fresh_ttl: cache
                .fresh_ttl_secs
                .map(Duration::seconds)
                .unwrap_or(defaults.fresh_ttl),
            validator_capacity: cache
                .validator_capacity
                .unwrap_or(defaults.validator_capacity),
        }
    }

    /// Application credentials: file first, then environment.
    pub fn app_credentials(&self) -> Option<AppCredentials> {
        [self.file.app.as_ref(), self.env_app.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|app| match (&app.client_id, &app.client_secret) {
                (Some(id), Some(secret)) => Some(AppCredentials::new(id, secret)),
                _ => None,
            })
    }
}
