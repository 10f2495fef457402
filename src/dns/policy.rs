//! Final allow/block decision for a classified domain.
//!
//! Checks run in a fixed order and the first one that matches decides:
//!
//! 1. local and control-panel names,
//! 2. [`CRITICAL_DOMAINS`] and their subdomains,
//! 3. the allow-list (exact match only),
//! 4. an unexpired temporary allowance,
//! 5. otherwise, block exactly the distracting domains.
//!
//! An expired allowance found in step 4 is removed and persisted on the
//! spot, then evaluation carries on as if it had never existed.

use std::sync::Arc;

use super::classifier::Classification;
use super::domain::is_same_or_subdomain;
use crate::clock::Clock;
use crate::store::{AccessPolicyStore, Storage};

/// Any domain containing this marker belongs to the control panel.
pub const CONTROL_PANEL_MARKER: &str = "be-productive";

/// Names that always resolve, whatever they are classified as.
pub const LOCAL_NAMES: &[&str] = &["localhost", "127.0.0.1"];

/// Domains (with all their subdomains) that must never be blocked.
pub const CRITICAL_DOMAINS: &[&str] = &[
    // DNS infrastructure
    "dns.google",
    "cloudflare-dns.com",
    "1.1.1.1",
    "8.8.8.8",
    // Apple
    "apple.com",
    "icloud.com",
    "apple-cloudkit.com",
    "push.apple.com",
    // Microsoft
    "microsoft.com",
    "windows.com",
    // Developer services
    "github.com",
    "githubcopilot.com",
];

/// Whether `domain` is exempt from blocking regardless of configuration.
#[must_use]
pub fn is_exempt(domain: &str) -> bool {
    LOCAL_NAMES.contains(&domain)
        || domain.contains(CONTROL_PANEL_MARKER)
        || CRITICAL_DOMAINS
            .iter()
            .any(|critical| is_same_or_subdomain(domain, critical))
}

/// Evaluates the access policy for a domain.
pub struct AccessPolicy<S: Storage, C: Clock> {
    store: Arc<AccessPolicyStore<S>>,
    clock: C,
}

impl<S: Storage, C: Clock> AccessPolicy<S, C> {
    pub fn new(store: Arc<AccessPolicyStore<S>>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Decide whether `domain` should be blocked.
    pub async fn should_block(&self, domain: &str, classification: Classification) -> bool {
        if is_exempt(domain) {
            return false;
        }

        // Exact match only: allow-listing "example.com" leaves
        // "www.example.com" subject to the remaining checks.
        if self.store.is_allow_listed(domain) {
            return false;
        }

        if let Some(expiry) = self.store.temporary_allowance(domain) {
            let now = self.clock.now();
            if now < expiry {
                return false;
            }
            if self.store.prune_expired(domain, now).await {
                tracing::info!(domain = %domain, %expiry, "temporary allowance expired");
            }
        }

        classification.is_distracting()
    }
}

impl<S: Storage, C: Clock> Clone for AccessPolicy<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
        }
    }
}
