//! Selector configuration and validation

use serde::{Deserialize, Serialize};

/// Default base URL for the utilization authority
pub const DEFAULT_API_BASE: &str = "https://api.chutes.ai";

/// Environment variable consulted when no API key is passed explicitly
pub const API_KEY_ENV: &str = "CHUTES_API_KEY";

pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to build HTTP client: {reason}")]
    ClientBuild { reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration for the utilization selector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Base URL of the utilization authority
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Credential sent with every fetch. Required; without it every fetch
    /// fails fast as `Unauthorized`.
    #[serde(default)]
    pub api_key: String,
    /// How long a fetched utilization snapshot stays fresh
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Hard timeout on the utilization fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            cache_ttl_secs: default_cache_ttl_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl SelectorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Default configuration with the API key taken from `CHUTES_API_KEY`.
    /// An unset variable leaves the key empty, which `validate` rejects.
    pub fn from_env() -> Self {
        Self::from_env_lookup(|name| std::env::var(name).ok())
    }

    fn from_env_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(key) = lookup(API_KEY_ENV) {
            config.api_key = key;
        }
        config
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_key".to_string(),
            });
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api_base".to_string(),
                value: self.api_base.clone(),
                reason: "must be an http(s) URL".to_string(),
            });
        }

        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_ttl_secs".to_string(),
                value: self.cache_ttl_secs.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch_timeout_secs".to_string(),
                value: self.fetch_timeout_secs.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}
