//! Configuration loading and validation.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};

/// Upper bound for the TTL of synthesized answers.
pub const MAX_BLOCKED_TTL_SECONDS: u32 = 3600;

/// Main configuration for the be-productive DNS server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Socket the DNS server listens on.
    #[serde(
        default = "default_listen",
        deserialize_with = "deserialize_socket_addr"
    )]
    pub listen: SocketAddr,

    /// Upstream DNS resolver address (e.g., "8.8.8.8:53").
    #[serde(
        default = "default_upstream_resolver",
        deserialize_with = "deserialize_socket_addr"
    )]
    pub upstream_resolver: SocketAddr,

    /// How long to wait for the upstream resolver before answering empty.
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    /// TTL of the loopback answer returned for blocked domains.
    #[serde(default = "default_blocked_ttl")]
    pub blocked_ttl_seconds: u32,

    /// Directory holding the policy and classification documents.
    /// If None, a per-user data directory is used.
    pub data_dir: Option<PathBuf>,

    /// File name of the access policy document inside `data_dir`.
    #[serde(default = "default_policy_file")]
    pub policy_file: String,

    /// File name of the classification document inside `data_dir`.
    #[serde(default = "default_classification_file")]
    pub classification_file: String,

    /// Domains recorded as distracting at startup, on top of the persisted ones.
    #[serde(default)]
    pub distracting: Vec<String>,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(
        default = "default_metrics_listen",
        deserialize_with = "deserialize_socket_addr"
    )]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 53))
}

fn default_upstream_resolver() -> SocketAddr {
    SocketAddr::from(([8, 8, 8, 8], 53))
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

const fn default_upstream_timeout_ms() -> u64 {
    1000
}

const fn default_blocked_ttl() -> u32 {
    300
}

fn default_policy_file() -> String {
    "config.json".to_string()
}

fn default_classification_file() -> String {
    "domain-cache.json".to_string()
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> std::result::Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Returns the default directory for the persisted documents.
///
/// Falls back to `./data` if the platform data directory cannot be determined.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir().map_or_else(
        || PathBuf::from("./data"),
        |p| p.join("be-productive"),
    )
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.upstream_timeout_ms == 0 {
            return Err(ValidationError::ZeroUpstreamTimeout);
        }

        if self.blocked_ttl_seconds == 0 || self.blocked_ttl_seconds > MAX_BLOCKED_TTL_SECONDS {
            return Err(ValidationError::BlockedTtlOutOfRange {
                value: self.blocked_ttl_seconds,
                max: MAX_BLOCKED_TTL_SECONDS,
            });
        }

        if self.policy_file.is_empty() {
            return Err(ValidationError::EmptyFileName {
                field: "policy_file",
            });
        }

        if self.classification_file.is_empty() {
            return Err(ValidationError::EmptyFileName {
                field: "classification_file",
            });
        }

        if self.distracting.iter().any(|d| d.trim().is_empty()) {
            return Err(ValidationError::EmptyDistractingDomain);
        }

        Ok(())
    }

    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Directory holding both persisted documents.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    #[must_use]
    pub fn policy_path(&self) -> PathBuf {
        self.data_dir().join(&self.policy_file)
    }

    #[must_use]
    pub fn classification_path(&self) -> PathBuf {
        self.data_dir().join(&self.classification_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            upstream_resolver: default_upstream_resolver(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            blocked_ttl_seconds: default_blocked_ttl(),
            data_dir: None,
            policy_file: default_policy_file(),
            classification_file: default_classification_file(),
            distracting: Vec::new(),
            metrics: MetricsConfig::default(),
        }
    }
}
