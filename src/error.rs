//! Error types for the be-productive DNS server.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for be-productive operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("DNS protocol error: {0}")]
    Protocol(#[from] hickory_proto::ProtoError),

    #[error("resolver error: {0}")]
    Resolver(String),

    #[error("upstream resolver did not answer within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("upstream_timeout_ms must be greater than 0")]
    ZeroUpstreamTimeout,

    #[error("blocked_ttl_seconds must be between 1 and {max}, got {value}")]
    BlockedTtlOutOfRange { value: u32, max: u32 },

    #[error("{field} cannot be empty")]
    EmptyFileName { field: &'static str },

    #[error("distracting domain cannot be empty")]
    EmptyDistractingDomain,
}

/// Errors raised at the persistence boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode document: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("injected storage failure: {0}")]
    Injected(String),
}

/// Refusals returned by administrative operations.
///
/// None of these variants carry information beyond the kind of refusal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdminError {
    #[error("parent code must be exactly 6 digits")]
    InvalidSecretFormat,

    #[error("incorrect parent code")]
    Unauthorized,

    #[error("domain cannot be empty")]
    InvalidDomain,

    #[error("duration must be at least one minute")]
    InvalidDuration,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;
