//! DNS-related modules.

pub mod classifier;
pub mod domain;
pub mod policy;
pub mod resolver;
pub mod response;

pub use classifier::{Classification, DomainClassifier};
pub use policy::AccessPolicy;
pub use resolver::{DnsResolver, UpstreamResolver};
