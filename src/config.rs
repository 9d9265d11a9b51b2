//! Adapter configuration
//!
//! Controls how remote requests are rendered and which optional remote
//! capabilities the planner may rely on. Every field has a default so an
//! empty JSON object is a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for [`AdapterConfig`]
    #[error("Malformed config '{path}': {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Config parsed but holds an unusable value
    #[error("Invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "BRIDGE_CONFIG_UNREADABLE",
            ConfigError::Malformed { .. } => "BRIDGE_CONFIG_MALFORMED",
            ConfigError::Invalid { .. } => "BRIDGE_CONFIG_INVALID",
        }
    }
}

/// Optional features of the remote store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCapabilities {
    /// Store offers a distinct-aware count metric
    #[serde(default)]
    pub count_distinct: bool,
}

/// Adapter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Query used when no filter is pushed (default: "*:*")
    #[serde(default = "default_match_all_query")]
    pub match_all_query: String,

    /// Handler for streamed document export (default: "/export")
    #[serde(default = "default_export_handler")]
    pub export_handler: String,

    /// Handler for streaming expressions (default: "/stream")
    #[serde(default = "default_stream_handler")]
    pub stream_handler: String,

    /// Sort sent when the plan pushes none. Export handlers reject unsorted
    /// requests. (default: "_version_ desc")
    #[serde(default = "default_sort")]
    pub default_sort: String,

    /// Bucket cap sent with facet expressions (default: 10000)
    #[serde(default = "default_bucket_size_limit")]
    pub bucket_size_limit: u64,

    /// Remote feature flags
    #[serde(default)]
    pub capabilities: RemoteCapabilities,
}

fn default_match_all_query() -> String {
    "*:*".to_string()
}

fn default_export_handler() -> String {
    "/export".to_string()
}

fn default_stream_handler() -> String {
    "/stream".to_string()
}

fn default_sort() -> String {
    "_version_ desc".to_string()
}

fn default_bucket_size_limit() -> u64 {
    10_000
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            match_all_query: default_match_all_query(),
            export_handler: default_export_handler(),
            stream_handler: default_stream_handler(),
            default_sort: default_sort(),
            bucket_size_limit: default_bucket_size_limit(),
            capabilities: RemoteCapabilities::default(),
        }
    }
}

impl AdapterConfig {
    /// Create a config that advertises a distinct-count metric
    pub fn with_count_distinct(mut self) -> Self {
        self.capabilities.count_distinct = true;
        self
    }

    /// Parse a config from a JSON string
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: AdapterConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed {
                path: "<inline>".to_string(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: AdapterConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Malformed {
                path: path.display().to_string(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.match_all_query.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "match_all_query",
                reason: "must not be empty".into(),
            });
        }
        for (field, handler) in [
            ("export_handler", &self.export_handler),
            ("stream_handler", &self.stream_handler),
        ] {
            if !handler.starts_with('/') {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("handler '{}' must start with '/'", handler),
                });
            }
        }
        if self.bucket_size_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "bucket_size_limit",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}
