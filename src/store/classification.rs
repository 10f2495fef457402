//! The set of domains known to be distracting.
//!
//! Productive is the default for every domain and is never written down;
//! only distracting domains are recorded.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{Document, Storage};
use crate::dns::domain;
use crate::error::StoreError;

const LEGACY_DISTRACTING: &str = "distracting";

/// On-disk shape of the classification document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ClassificationDocument {
    /// Kept for compatibility with older readers; always written empty.
    #[serde(default)]
    productive: Vec<String>,
    distracting: Vec<String>,
}

/// Every shape the classification document has had.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredClassifications {
    Current(ClassificationDocument),
    /// `{ "youtube.com": "distracting", "docs.rs": "productive" }`
    Legacy(HashMap<String, String>),
}

impl StoredClassifications {
    /// The distracting domains, normalised like query names.
    fn into_distracting(self) -> HashSet<String> {
        let domains: Vec<String> = match self {
            Self::Current(doc) => doc.distracting,
            Self::Legacy(map) => map
                .into_iter()
                .filter(|(_, label)| label == LEGACY_DISTRACTING)
                .map(|(domain, _)| domain)
                .collect(),
        };
        domains
            .iter()
            .filter_map(|d| domain::normalize(d))
            .collect()
    }
}

/// Durable set of distracting domains.
pub struct ClassificationStore<S: Storage> {
    distracting: RwLock<HashSet<String>>,
    document: Document<S>,
}

impl<S: Storage> ClassificationStore<S> {
    /// Load the store from `storage`.
    ///
    /// A missing document yields an empty store, and so does an unreadable
    /// one: nothing is blocked until the next classification is recorded.
    pub async fn load(storage: S) -> Self {
        let document = Document::new("classifications", storage);

        let distracting = match document.load::<StoredClassifications>().await {
            Ok(Some(stored)) => stored.into_distracting(),
            Ok(None) => HashSet::new(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load classifications, starting empty");
                HashSet::new()
            }
        };

        tracing::info!(count = distracting.len(), "loaded distracting domains");

        Self {
            distracting: RwLock::new(distracting),
            document,
        }
    }

    #[must_use]
    pub fn contains(&self, domain: &str) -> bool {
        self.distracting.read().contains(domain)
    }

    /// Returns the first of `candidates` that is recorded as distracting.
    pub fn first_match<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distracting = self.distracting.read();
        candidates.into_iter().find(|c| distracting.contains(*c))
    }

    /// Record `domain` as distracting and persist the change.
    ///
    /// Returns `false` without writing when the domain was already recorded.
    pub async fn record(&self, domain: &str) -> bool {
        let inserted = self.distracting.write().insert(domain.to_string());
        if inserted {
            self.persist().await;
        }
        inserted
    }

    /// Record several domains with a single write.
    pub async fn record_all<I, D>(&self, domains: I) -> usize
    where
        I: IntoIterator<Item = D>,
        D: AsRef<str>,
    {
        let added = {
            let mut distracting = self.distracting.write();
            domains
                .into_iter()
                .filter(|d| distracting.insert(d.as_ref().to_string()))
                .count()
        };
        if added > 0 {
            self.persist().await;
        }
        added
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.distracting.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.distracting.read().is_empty()
    }

    /// All recorded domains, sorted.
    #[must_use]
    pub fn domains(&self) -> Vec<String> {
        self.sorted().into_iter().collect()
    }

    /// Write the current set, returning any storage error.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.document.flush(|| self.snapshot()).await
    }

    async fn persist(&self) {
        self.document.persist(|| self.snapshot()).await;
    }

    fn sorted(&self) -> BTreeSet<String> {
        self.distracting.read().iter().cloned().collect()
    }

    fn snapshot(&self) -> ClassificationDocument {
        ClassificationDocument {
            productive: Vec::new(),
            distracting: self.sorted().into_iter().collect(),
        }
    }
}
