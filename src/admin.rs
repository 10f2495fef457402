//! Administrative operations on the access policy.
//!
//! These back the control panel: provisioning the parent secret and, once
//! authenticated with it, managing the allow-list and temporary allowances.
//! A refused call never changes any state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::dns::domain;
use crate::error::AdminError;
use crate::store::{AccessPolicyStore, SecretDigest, Storage};

/// Number of digits in a parent secret.
pub const SECRET_LEN: usize = 6;

/// Length of a temporary allowance when none is given.
pub const DEFAULT_ALLOWANCE_MINUTES: u32 = 30;

/// The parts of the policy an authenticated caller may read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySettings {
    #[serde(rename = "whitelist")]
    pub allow_list: Vec<String>,
    #[serde(rename = "temporaryAccess")]
    pub temporary_allowances: BTreeMap<String, DateTime<Utc>>,
}

/// Entry point for administrative calls.
pub struct AdminService<S: Storage, C: Clock> {
    policy: Arc<AccessPolicyStore<S>>,
    clock: C,
}

impl<S: Storage, C: Clock> AdminService<S, C> {
    pub fn new(policy: Arc<AccessPolicyStore<S>>, clock: C) -> Self {
        Self { policy, clock }
    }

    /// Provision (or replace) the parent secret.
    pub async fn setup_secret(&self, code: &str) -> Result<(), AdminError> {
        if code.len() != SECRET_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AdminError::InvalidSecretFormat);
        }

        self.policy.set_secret_digest(SecretDigest::of(code)).await;
        tracing::info!("parent secret provisioned");
        Ok(())
    }

    /// Whether `code` matches the provisioned secret. Always `false` before
    /// a secret has been provisioned.
    #[must_use]
    pub fn verify_secret(&self, code: &str) -> bool {
        self.policy
            .secret_digest()
            .is_some_and(|stored| stored.matches(&SecretDigest::of(code)))
    }

    fn authorize(&self, code: &str) -> Result<(), AdminError> {
        if self.verify_secret(code) {
            Ok(())
        } else {
            tracing::warn!("rejected administrative call with wrong parent code");
            Err(AdminError::Unauthorized)
        }
    }

    /// Allow `domain` until `minutes` from now (30 by default).
    ///
    /// Returns the instant the allowance ends.
    pub async fn grant_temporary(
        &self,
        code: &str,
        domain: &str,
        minutes: Option<u32>,
    ) -> Result<DateTime<Utc>, AdminError> {
        self.authorize(code)?;
        let domain = domain::normalize(domain).ok_or(AdminError::InvalidDomain)?;
        let minutes = minutes.unwrap_or(DEFAULT_ALLOWANCE_MINUTES);
        if minutes == 0 {
            return Err(AdminError::InvalidDuration);
        }

        let expiry = self.clock.now() + Duration::minutes(i64::from(minutes));
        self.policy.grant_temporary(&domain, expiry).await;
        tracing::info!(domain = %domain, minutes, %expiry, "temporary allowance granted");
        Ok(expiry)
    }

    /// Permanently allow `domain`. Returns `false` if it was already allowed.
    pub async fn allow(&self, code: &str, domain: &str) -> Result<bool, AdminError> {
        self.authorize(code)?;
        let domain = domain::normalize(domain).ok_or(AdminError::InvalidDomain)?;

        let added = self.policy.allow(&domain).await;
        tracing::info!(domain = %domain, added, "domain allow-listed");
        Ok(added)
    }

    /// Remove `domain` from the allow-list. Returns whether it was there.
    pub async fn disallow(&self, code: &str, domain: &str) -> Result<bool, AdminError> {
        self.authorize(code)?;
        let domain = domain::normalize(domain).ok_or(AdminError::InvalidDomain)?;

        let removed = self.policy.disallow(&domain).await;
        tracing::info!(domain = %domain, removed, "domain removed from allow-list");
        Ok(removed)
    }

    /// Read back the allow-list and temporary allowances.
    pub fn settings(&self, code: &str) -> Result<PolicySettings, AdminError> {
        self.authorize(code)?;
        let config = self.policy.snapshot();
        Ok(PolicySettings {
            allow_list: config.allow_list,
            temporary_allowances: config.temporary_allowances.into_iter().collect(),
        })
    }
}
