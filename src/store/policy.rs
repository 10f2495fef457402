//! Parent secret, allow-list and temporary allowances.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{Document, Storage};
use crate::dns::domain;
use crate::error::StoreError;

/// SHA-256 digest of the parent secret.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SecretDigest([u8; 32]);

impl SecretDigest {
    /// Digest of `secret`.
    #[must_use]
    pub fn of(secret: &str) -> Self {
        Self(Sha256::digest(secret.as_bytes()).into())
    }

    /// Parse a lowercase or uppercase hex digest.
    #[must_use]
    pub fn from_hex(hex_digest: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_digest, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Constant-time comparison.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretDigest(..)")
    }
}

/// In-memory access policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicyConfig {
    /// None until the parent secret has been provisioned.
    pub parent_secret_hash: Option<SecretDigest>,
    /// Domains never blocked, matched by exact string equality.
    pub allow_list: Vec<String>,
    /// Domain to the instant its allowance ends (exclusive).
    pub temporary_allowances: HashMap<String, DateTime<Utc>>,
}

/// On-disk shape of the policy document. Expiries are epoch milliseconds.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyDocument {
    #[serde(default)]
    parent_code_hash: Option<String>,
    #[serde(default)]
    whitelist: Vec<String>,
    #[serde(default)]
    temporary_access: BTreeMap<String, i64>,
}

impl From<PolicyDocument> for AccessPolicyConfig {
    fn from(doc: PolicyDocument) -> Self {
        let parent_secret_hash = doc.parent_code_hash.and_then(|hex_digest| {
            let digest = SecretDigest::from_hex(&hex_digest);
            if digest.is_none() {
                tracing::warn!("ignoring malformed parent secret digest");
            }
            digest
        });

        let mut temporary_allowances: HashMap<String, DateTime<Utc>> = HashMap::new();
        for (name, millis) in doc.temporary_access {
            let Some(name) = domain::normalize(&name) else {
                continue;
            };
            let Some(expiry) = DateTime::from_timestamp_millis(millis) else {
                tracing::warn!(domain = %name, millis, "dropping out-of-range allowance");
                continue;
            };
            // Spellings that normalise alike keep the latest expiry.
            let entry = temporary_allowances.entry(name).or_insert(expiry);
            *entry = (*entry).max(expiry);
        }

        let mut allow_list = Vec::with_capacity(doc.whitelist.len());
        for name in doc.whitelist.iter().filter_map(|d| domain::normalize(d)) {
            if !allow_list.contains(&name) {
                allow_list.push(name);
            }
        }

        Self {
            parent_secret_hash,
            allow_list,
            temporary_allowances,
        }
    }
}

impl From<&AccessPolicyConfig> for PolicyDocument {
    fn from(config: &AccessPolicyConfig) -> Self {
        Self {
            parent_code_hash: config.parent_secret_hash.map(|d| d.to_hex()),
            whitelist: config.allow_list.clone(),
            temporary_access: config
                .temporary_allowances
                .iter()
                .map(|(domain, expiry)| (domain.clone(), expiry.timestamp_millis()))
                .collect(),
        }
    }
}

/// Durable access policy.
///
/// Every mutation is applied in memory first and then written back.
pub struct AccessPolicyStore<S: Storage> {
    config: RwLock<AccessPolicyConfig>,
    document: Document<S>,
}

impl<S: Storage> AccessPolicyStore<S> {
    /// Load the policy from `storage`, falling back to an empty policy.
    pub async fn load(storage: S) -> Self {
        let document = Document::new("policy", storage);

        let config = match document.load::<PolicyDocument>().await {
            Ok(Some(doc)) => AccessPolicyConfig::from(doc),
            Ok(None) => AccessPolicyConfig::default(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load access policy, starting empty");
                AccessPolicyConfig::default()
            }
        };

        tracing::info!(
            secret_provisioned = config.parent_secret_hash.is_some(),
            allow_listed = config.allow_list.len(),
            temporary = config.temporary_allowances.len(),
            "loaded access policy"
        );

        Self {
            config: RwLock::new(config),
            document,
        }
    }

    /// A copy of the current policy.
    #[must_use]
    pub fn snapshot(&self) -> AccessPolicyConfig {
        self.config.read().clone()
    }

    #[must_use]
    pub fn secret_digest(&self) -> Option<SecretDigest> {
        self.config.read().parent_secret_hash
    }

    #[must_use]
    pub fn is_allow_listed(&self, domain: &str) -> bool {
        self.config.read().allow_list.iter().any(|d| d == domain)
    }

    #[must_use]
    pub fn temporary_allowance(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.config.read().temporary_allowances.get(domain).copied()
    }

    pub async fn set_secret_digest(&self, digest: SecretDigest) {
        self.config.write().parent_secret_hash = Some(digest);
        self.persist().await;
    }

    /// Grant (or replace) a temporary allowance ending at `expiry`.
    pub async fn grant_temporary(&self, domain: &str, expiry: DateTime<Utc>) {
        self.config
            .write()
            .temporary_allowances
            .insert(domain.to_string(), expiry);
        self.persist().await;
    }

    /// Remove the allowance for `domain` if it has expired at `now`.
    ///
    /// Returns whether anything was removed. An allowance re-granted in the
    /// meantime is left alone, and a second call is a no-op.
    pub async fn prune_expired(&self, domain: &str, now: DateTime<Utc>) -> bool {
        let removed = {
            let mut config = self.config.write();
            let expired = config
                .temporary_allowances
                .get(domain)
                .is_some_and(|expiry| *expiry <= now);
            if expired {
                config.temporary_allowances.remove(domain);
            }
            expired
        };
        if removed {
            self.persist().await;
        }
        removed
    }

    /// Add `domain` to the allow-list. Returns `false` if it was already there.
    pub async fn allow(&self, domain: &str) -> bool {
        let added = {
            let mut config = self.config.write();
            if config.allow_list.iter().any(|d| d == domain) {
                false
            } else {
                config.allow_list.push(domain.to_string());
                true
            }
        };
        if added {
            self.persist().await;
        }
        added
    }

    /// Remove `domain` from the allow-list. Returns whether it was present.
    pub async fn disallow(&self, domain: &str) -> bool {
        let removed = {
            let mut config = self.config.write();
            let before = config.allow_list.len();
            config.allow_list.retain(|d| d != domain);
            config.allow_list.len() != before
        };
        self.persist().await;
        removed
    }

    /// Write the current policy, returning any storage error.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.document
            .flush(|| PolicyDocument::from(&*self.config.read()))
            .await
    }

    async fn persist(&self) {
        self.document
            .persist(|| PolicyDocument::from(&*self.config.read()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;
    use chrono::Duration;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn stored(storage: &MemoryStorage) -> serde_json::Value {
        serde_json::from_slice(&storage.contents().unwrap()).unwrap()
    }

    #[test]
    fn should_hash_secret_as_sha256_hex() {
        let digest = SecretDigest::of("123456");

        assert_eq!(
            digest.to_hex(),
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
        assert!(digest.matches(&SecretDigest::from_hex(&digest.to_hex()).unwrap()));
        assert!(!digest.matches(&SecretDigest::of("654321")));
    }

    #[test]
    fn should_reject_malformed_hex_digest() {
        assert!(SecretDigest::from_hex("abc").is_none());
        assert!(SecretDigest::from_hex(&"zz".repeat(32)).is_none());
    }

    #[tokio::test]
    async fn should_load_original_document_shape() {
        let digest = SecretDigest::of("123456").to_hex();
        let storage = MemoryStorage::with_contents(format!(
            r#"{{
                "parentCodeHash": "{digest}",
                "whitelist": ["youtube.com", "youtube.com", "docs.rs"],
                "temporaryAccess": {{"reddit.com": 1700000000000}}
            }}"#
        ));

        let store = AccessPolicyStore::load(storage).await;
        let config = store.snapshot();

        assert_eq!(config.parent_secret_hash, Some(SecretDigest::of("123456")));
        assert_eq!(config.allow_list, vec!["youtube.com", "docs.rs"]);
        assert_eq!(
            store.temporary_allowance("reddit.com"),
            Some(at(1_700_000_000_000))
        );
    }

    #[tokio::test]
    async fn should_normalize_hand_edited_entries_on_load() {
        let storage = MemoryStorage::with_contents(
            r#"{
                "whitelist": ["YouTube.com", "youtube.com.", " "],
                "temporaryAccess": {"Reddit.com": 1700000000000, "reddit.com.": 1700000060000}
            }"#,
        );

        let store = AccessPolicyStore::load(storage).await;

        assert_eq!(store.snapshot().allow_list, vec!["youtube.com"]);
        assert!(store.is_allow_listed("youtube.com"));
        assert_eq!(
            store.temporary_allowance("reddit.com"),
            Some(at(1_700_000_060_000))
        );
        assert_eq!(store.snapshot().temporary_allowances.len(), 1);
    }

    #[tokio::test]
    async fn should_default_missing_fields() {
        let storage = MemoryStorage::with_contents(r#"{"parentCodeHash": null}"#);

        let store = AccessPolicyStore::load(storage).await;

        assert_eq!(store.snapshot(), AccessPolicyConfig::default());
    }

    #[tokio::test]
    async fn should_start_empty_on_corrupt_document() {
        let storage = MemoryStorage::with_contents(r#"{"whitelist": "#);

        let store = AccessPolicyStore::load(storage).await;

        assert_eq!(store.snapshot(), AccessPolicyConfig::default());
    }

    #[tokio::test]
    async fn should_persist_secret_digest_as_hex() {
        let storage = MemoryStorage::new();
        let store = AccessPolicyStore::load(storage.clone()).await;

        store.set_secret_digest(SecretDigest::of("123456")).await;

        assert_eq!(
            stored(&storage)["parentCodeHash"],
            SecretDigest::of("123456").to_hex()
        );
    }

    #[tokio::test]
    async fn should_persist_allowances_as_epoch_millis() {
        let storage = MemoryStorage::new();
        let store = AccessPolicyStore::load(storage.clone()).await;

        store
            .grant_temporary("reddit.com", at(1_700_000_000_000))
            .await;

        assert_eq!(
            stored(&storage)["temporaryAccess"]["reddit.com"],
            1_700_000_000_000_i64
        );
    }

    #[tokio::test]
    async fn should_prune_only_expired_allowances() {
        let storage = MemoryStorage::new();
        let store = AccessPolicyStore::load(storage.clone()).await;
        let expiry = at(1_700_000_000_000);
        store.grant_temporary("reddit.com", expiry).await;
        let writes = storage.write_count();

        assert!(!store.prune_expired("reddit.com", expiry - Duration::milliseconds(1)).await);
        assert_eq!(storage.write_count(), writes);

        assert!(store.prune_expired("reddit.com", expiry).await);
        assert!(store.temporary_allowance("reddit.com").is_none());
        assert_eq!(storage.write_count(), writes + 1);
        assert_eq!(stored(&storage)["temporaryAccess"], serde_json::json!({}));

        // Already gone: nothing to do.
        assert!(!store.prune_expired("reddit.com", expiry).await);
        assert_eq!(storage.write_count(), writes + 1);
    }

    #[tokio::test]
    async fn should_add_and_remove_allow_list_entries() {
        let storage = MemoryStorage::new();
        let store = AccessPolicyStore::load(storage.clone()).await;

        assert!(store.allow("youtube.com").await);
        assert!(!store.allow("youtube.com").await);
        assert_eq!(storage.write_count(), 1);
        assert!(store.is_allow_listed("youtube.com"));
        assert!(!store.is_allow_listed("www.youtube.com"));

        assert!(store.disallow("youtube.com").await);
        assert!(!store.is_allow_listed("youtube.com"));
        assert_eq!(stored(&storage)["whitelist"], serde_json::json!([]));
    }
}
