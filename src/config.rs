//! Configuration schema, loading, and validation.
//!
//! # Data Flow
//! ```text
//! optional TOML file
//!     → load() (parse & deserialize)
//!     → CLI overrides applied by main
//!     → validate() (semantic checks, node URL parsing)
//!     → Config (immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Any configuration error is fatal at startup; the process never serves
//!   traffic with a bad algorithm name or malformed node address

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid load balancing algorithm {0:?} (expected \"roundrobin\" or \"leastconnections\")")]
    InvalidAlgorithm(String),

    #[error("invalid node address {address:?}: {reason}")]
    InvalidNodeAddress { address: String, reason: String },

    #[error("at least one node address is required")]
    NoNodes,

    #[error("health check interval must be greater than zero")]
    ZeroInterval,
}

/// Node selection algorithm used by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    LeastConnections,
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "roundrobin" => Ok(Algorithm::RoundRobin),
            "leastconnections" => Ok(Algorithm::LeastConnections),
            _ => Err(ConfigError::InvalidAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::RoundRobin => f.write_str("roundrobin"),
            Algorithm::LeastConnections => f.write_str("leastconnections"),
        }
    }
}

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Listener settings.
    pub listener: ListenerConfig,

    /// Base URLs of the backend nodes. Fixed for the process lifetime.
    pub nodes: Vec<String>,

    /// Node selection algorithm.
    pub algorithm: Algorithm,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Seconds between rounds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when RUST_LOG is unset.
    pub log_level: String,

    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Metrics exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "httplb=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Semantic validation. Returns the parsed node URLs on success.
    pub fn validate(&self) -> Result<Vec<Url>, ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }
        if self.health_check.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let mut parsed = Vec::with_capacity(self.nodes.len());
        for address in &self.nodes {
            let url = Url::parse(address).map_err(|e| ConfigError::InvalidNodeAddress {
                address: address.clone(),
                reason: e.to_string(),
            })?;
            if url.host_str().is_none() || !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidNodeAddress {
                    address: address.clone(),
                    reason: "expected an absolute http(s) URL".to_string(),
                });
            }
            parsed.push(url);
        }
        Ok(parsed)
    }
}
