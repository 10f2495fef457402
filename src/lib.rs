//! be-productive - a DNS resolver that sinks distracting domains.
//!
//! The resolver answers queries for domains classified as distracting with a
//! loopback address and forwards everything else to an upstream resolver.
//! A parent-held secret unlocks exceptions: a permanent allow-list and
//! short-lived temporary allowances.
//!
//! # Architecture
//!
//! - [`store`]: durable classification and access-policy documents
//! - [`dns`]: name normalisation, classification, policy and wire responses
//! - [`server`]: the query handler and UDP serve loop
//! - [`admin`]: secret-gated changes to the access policy
//! - [`activity`]: blocked/allowed annotation of activity reports
//! - [`config`]: configuration loading and validation
//! - [`error`]: error types
//!
//! # Testing
//!
//! Storage, upstream resolution and time are all behind traits, so the whole
//! decision path runs in tests without a network or a filesystem:
//!
//! ```rust
//! use be_productive::dns::domain;
//!
//! assert_eq!(domain::normalize("WWW.YouTube.com."), Some("www.youtube.com".into()));
//! assert_eq!(
//!     domain::parent_suffixes("a.b.youtube.com").collect::<Vec<_>>(),
//!     ["b.youtube.com", "youtube.com"],
//! );
//! ```

pub mod activity;
pub mod admin;
pub mod clock;
pub mod config;
pub mod dns;
pub mod error;
pub mod metrics;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
