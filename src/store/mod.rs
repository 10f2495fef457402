//! Durable stores backing the blocking decisions.
//!
//! Both stores live in memory, are loaded once at startup and are written
//! back as a complete document after every mutation. Writes to the same
//! store are serialized and each one snapshots the state only after it has
//! acquired the write slot, so the last write to finish is never older than
//! the ones before it.

pub mod classification;
pub mod policy;
pub mod storage;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::metrics as counters;

pub use classification::ClassificationStore;
pub use policy::{AccessPolicyConfig, AccessPolicyStore, SecretDigest};
pub use storage::{FileStorage, MemoryStorage, Storage};

/// A [`Storage`] plus the lock that keeps its writes in order.
#[derive(Debug)]
struct Document<S> {
    name: &'static str,
    storage: S,
    write_slot: Mutex<()>,
}

impl<S: Storage> Document<S> {
    fn new(name: &'static str, storage: S) -> Self {
        Self {
            name,
            storage,
            write_slot: Mutex::new(()),
        }
    }

    async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.storage.read().await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(StoreError::Decode)
    }

    /// Write the document produced by `snapshot`.
    async fn flush<T, F>(&self, snapshot: F) -> Result<(), StoreError>
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        let _slot = self.write_slot.lock().await;
        let bytes = serde_json::to_vec_pretty(&snapshot()).map_err(StoreError::Encode)?;
        self.storage.write(bytes).await
    }

    /// Like [`flush`](Self::flush), but a failure is logged and swallowed.
    /// The in-memory state stays authoritative until the next write succeeds.
    async fn persist<T, F>(&self, snapshot: F)
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        if let Err(err) = self.flush(snapshot).await {
            counters::record_flush_failure(self.name);
            tracing::warn!(store = self.name, error = %err, "failed to persist store");
        }
    }
}

/// Both stores, as loaded at process start.
pub struct Stores<S: Storage> {
    pub classifications: Arc<ClassificationStore<S>>,
    pub policy: Arc<AccessPolicyStore<S>>,
}

impl<S: Storage> Stores<S> {
    /// Load both stores. Neither load can fail: an unreadable document
    /// starts out empty.
    pub async fn load(classification_storage: S, policy_storage: S) -> Self {
        Self {
            classifications: Arc::new(ClassificationStore::load(classification_storage).await),
            policy: Arc::new(AccessPolicyStore::load(policy_storage).await),
        }
    }
}

impl<S: Storage> Clone for Stores<S> {
    fn clone(&self) -> Self {
        Self {
            classifications: Arc::clone(&self.classifications),
            policy: Arc::clone(&self.policy),
        }
    }
}
