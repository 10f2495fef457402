//! Productive/distracting classification with subdomain inheritance.

use std::fmt;
use std::sync::Arc;

use super::domain::parent_suffixes;
use crate::store::{ClassificationStore, Storage};

/// Outcome of classifying a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Productive,
    Distracting,
}

impl Classification {
    #[must_use]
    pub const fn is_distracting(self) -> bool {
        matches!(self, Self::Distracting)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Productive => f.write_str("productive"),
            Self::Distracting => f.write_str("distracting"),
        }
    }
}

/// Classifies domains against the [`ClassificationStore`].
///
/// A subdomain of a distracting domain is itself distracting, and is
/// recorded as such the first time it is seen so later lookups hit the
/// store directly.
pub struct DomainClassifier<S: Storage> {
    store: Arc<ClassificationStore<S>>,
}

impl<S: Storage> DomainClassifier<S> {
    pub fn new(store: Arc<ClassificationStore<S>>) -> Self {
        Self { store }
    }

    /// Classify a normalised, non-empty domain.
    pub async fn classify(&self, domain: &str) -> Classification {
        if self.store.contains(domain) {
            return Classification::Distracting;
        }

        if let Some(parent) = self.store.first_match(parent_suffixes(domain)) {
            tracing::debug!(domain = %domain, parent = %parent, "inherited distracting classification");
            self.store.record(domain).await;
            return Classification::Distracting;
        }

        Classification::Productive
    }

    /// Classify by exact store membership only, without inheritance and
    /// without recording anything.
    #[must_use]
    pub fn classify_recorded(&self, domain: &str) -> Classification {
        if self.store.contains(domain) {
            Classification::Distracting
        } else {
            Classification::Productive
        }
    }
}

impl<S: Storage> Clone for DomainClassifier<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    async fn classifier_with(domains: &[&str]) -> (DomainClassifier<MemoryStorage>, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store = Arc::new(ClassificationStore::load(storage.clone()).await);
        store.record_all(domains).await;
        (DomainClassifier::new(store), storage)
    }

    #[tokio::test]
    async fn should_classify_recorded_domain_as_distracting() {
        let (classifier, _) = classifier_with(&["youtube.com"]).await;

        assert_eq!(
            classifier.classify("youtube.com").await,
            Classification::Distracting
        );
    }

    #[tokio::test]
    async fn should_inherit_from_parent_and_memoize() {
        let (classifier, storage) = classifier_with(&["youtube.com"]).await;
        let writes = storage.write_count();

        assert_eq!(
            classifier.classify("a.b.youtube.com").await,
            Classification::Distracting
        );
        assert!(classifier.store.contains("a.b.youtube.com"));
        assert_eq!(storage.write_count(), writes + 1);

        // Second lookup is a direct hit and writes nothing.
        classifier.classify("a.b.youtube.com").await;
        assert_eq!(storage.write_count(), writes + 1);
    }

    #[tokio::test]
    async fn should_not_record_intermediate_suffixes() {
        let (classifier, _) = classifier_with(&["youtube.com"]).await;

        classifier.classify("a.b.youtube.com").await;

        assert!(!classifier.store.contains("b.youtube.com"));
    }

    #[tokio::test]
    async fn should_default_to_productive_without_recording() {
        let (classifier, storage) = classifier_with(&["youtube.com"]).await;
        let writes = storage.write_count();
        let before = classifier.store.len();

        assert_eq!(classifier.classify("docs.rs").await, Classification::Productive);
        assert_eq!(
            classifier.classify("notyoutube.com").await,
            Classification::Productive
        );
        assert_eq!(classifier.store.len(), before);
        assert_eq!(storage.write_count(), writes);
    }

    #[tokio::test]
    async fn should_never_match_single_label_tld() {
        let (classifier, _) = classifier_with(&["com"]).await;

        assert_eq!(
            classifier.classify("youtube.com").await,
            Classification::Productive
        );
        assert_eq!(classifier.classify("com").await, Classification::Distracting);
    }

    #[tokio::test]
    async fn should_treat_single_label_names_as_productive() {
        let (classifier, _) = classifier_with(&["youtube.com"]).await;

        assert_eq!(classifier.classify("intranet").await, Classification::Productive);
    }

    #[tokio::test]
    async fn should_be_deterministic_for_same_store() {
        let (classifier, _) = classifier_with(&["reddit.com"]).await;

        for _ in 0..3 {
            assert_eq!(
                classifier.classify("old.reddit.com").await,
                Classification::Distracting
            );
            assert_eq!(classifier.classify("docs.rs").await, Classification::Productive);
        }
    }

    #[tokio::test]
    async fn should_not_inherit_when_classifying_recorded_only() {
        let (classifier, _) = classifier_with(&["youtube.com"]).await;

        assert_eq!(
            classifier.classify_recorded("m.youtube.com"),
            Classification::Productive
        );
        assert!(!classifier.store.contains("m.youtube.com"));
    }
}
