//! Blocked/allowed annotation for the activity feed.
//!
//! An external monitor reports the foreground window and, for browsers, the
//! current URL. The host of that URL is checked against recorded
//! classifications (exact membership, nothing is inherited or recorded) and
//! the access policy.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::clock::Clock;
use crate::dns::{AccessPolicy, DomainClassifier, domain};
use crate::error::StoreError;
use crate::store::{AccessPolicyStore, ClassificationStore, Storage};

/// What the activity monitor last saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    /// Epoch milliseconds of the observation.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub active_window: Option<String>,
    #[serde(default)]
    pub active_tab: Option<String>,
    #[serde(default)]
    pub browser_url: Option<String>,
}

impl ActivityReport {
    /// Read the monitor's latest report. `Ok(None)` if it has written nothing.
    pub async fn read<S: Storage>(storage: &S) -> Result<Option<Self>, StoreError> {
        let Some(bytes) = storage.read().await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(StoreError::Decode)
    }
}

/// An [`ActivityReport`] with the blocking verdict for its URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedActivity {
    #[serde(flatten)]
    pub report: ActivityReport,
    pub checked_domain: Option<String>,
    pub is_blocked: bool,
}

/// Annotates activity reports.
pub struct ActivityAnnotator<S: Storage, C: Clock> {
    classifier: DomainClassifier<S>,
    policy: AccessPolicy<S, C>,
}

impl<S: Storage, C: Clock> ActivityAnnotator<S, C> {
    pub fn new(classifier: DomainClassifier<S>, policy: AccessPolicy<S, C>) -> Self {
        Self { classifier, policy }
    }

    /// Convenience constructor over the two shared stores.
    pub fn from_stores(
        classifications: Arc<ClassificationStore<S>>,
        policy: Arc<AccessPolicyStore<S>>,
        clock: C,
    ) -> Self {
        Self::new(
            DomainClassifier::new(classifications),
            AccessPolicy::new(policy, clock),
        )
    }

    /// Attach `checkedDomain` and `isBlocked` to `report`.
    ///
    /// A missing or unparseable URL is reported as not blocked.
    pub async fn annotate(&self, report: ActivityReport) -> AnnotatedActivity {
        let checked_domain = report
            .browser_url
            .as_deref()
            .and_then(|raw| Url::parse(raw).ok())
            .and_then(|url| url.host_str().and_then(domain::normalize));

        let is_blocked = match checked_domain.as_deref() {
            Some(host) => {
                let classification = self.classifier.classify_recorded(host);
                self.policy.should_block(host, classification).await
            }
            None => false,
        };

        AnnotatedActivity {
            report,
            checked_domain,
            is_blocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{MemoryStorage, Stores};
    use chrono::DateTime;

    type TestAnnotator = ActivityAnnotator<MemoryStorage, ManualClock>;

    async fn annotator(distracting: &[&str]) -> (TestAnnotator, Stores<MemoryStorage>) {
        let stores = Stores::load(MemoryStorage::new(), MemoryStorage::new()).await;
        stores.classifications.record_all(distracting).await;
        let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let annotator = ActivityAnnotator::from_stores(
            Arc::clone(&stores.classifications),
            Arc::clone(&stores.policy),
            clock,
        );
        (annotator, stores)
    }

    fn report(url: Option<&str>) -> ActivityReport {
        ActivityReport {
            timestamp: 1_700_000_000_000,
            active_window: Some("Firefox".into()),
            active_tab: Some("Watch later".into()),
            browser_url: url.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn should_flag_recorded_distracting_host() {
        let (annotator, _) = annotator(&["www.youtube.com"]).await;

        let annotated = annotator
            .annotate(report(Some("https://www.YouTube.com/watch?v=1")))
            .await;

        assert_eq!(annotated.checked_domain.as_deref(), Some("www.youtube.com"));
        assert!(annotated.is_blocked);
    }

    #[tokio::test]
    async fn should_not_inherit_or_record_from_activity() {
        let (annotator, stores) = annotator(&["youtube.com"]).await;

        let annotated = annotator
            .annotate(report(Some("https://m.youtube.com/")))
            .await;

        assert!(!annotated.is_blocked);
        assert!(!stores.classifications.contains("m.youtube.com"));
    }

    #[tokio::test]
    async fn should_respect_allow_list() {
        let (annotator, stores) = annotator(&["youtube.com"]).await;
        stores.policy.allow("youtube.com").await;

        let annotated = annotator
            .annotate(report(Some("https://youtube.com/")))
            .await;

        assert!(!annotated.is_blocked);
    }

    #[tokio::test]
    async fn should_report_unblocked_without_url() {
        let (annotator, _) = annotator(&["youtube.com"]).await;

        let missing = annotator.annotate(report(None)).await;
        let invalid = annotator.annotate(report(Some("not a url"))).await;

        assert_eq!(missing.checked_domain, None);
        assert!(!missing.is_blocked);
        assert_eq!(invalid.checked_domain, None);
        assert!(!invalid.is_blocked);
    }

    #[tokio::test]
    async fn should_serialize_flat_with_camel_case_fields() {
        let (annotator, _) = annotator(&["reddit.com"]).await;

        let annotated = annotator
            .annotate(report(Some("https://reddit.com/r/rust")))
            .await;
        let value = serde_json::to_value(&annotated).unwrap();

        assert_eq!(value["browserUrl"], "https://reddit.com/r/rust");
        assert_eq!(value["activeWindow"], "Firefox");
        assert_eq!(value["checkedDomain"], "reddit.com");
        assert_eq!(value["isBlocked"], true);
    }

    #[tokio::test]
    async fn should_read_monitor_report() {
        let storage = MemoryStorage::with_contents(
            r#"{"timestamp": 1700000000000, "activeWindow": "Safari", "activeTab": null, "browserUrl": "https://docs.rs/"}"#,
        );

        let report = ActivityReport::read(&storage).await.unwrap().unwrap();

        assert_eq!(report.active_window.as_deref(), Some("Safari"));
        assert_eq!(report.browser_url.as_deref(), Some("https://docs.rs/"));
        assert!(ActivityReport::read(&MemoryStorage::new()).await.unwrap().is_none());
    }
}
