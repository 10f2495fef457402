//! Persistence boundary for whole-document stores.
//!
//! A [`Storage`] holds exactly one document. Reads return the whole
//! document and writes replace it; there is no merge and no append.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

/// Trait for durable document storage.
pub trait Storage: Send + Sync + 'static {
    /// Read the whole document. `Ok(None)` means nothing has been written yet.
    fn read(&self) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    /// Replace the whole document.
    fn write(&self, contents: Vec<u8>) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A document stored as a single file on disk.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Storage for FileStorage {
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Self::io_error(&self.path, err)),
        }
    }

    async fn write(&self, contents: Vec<u8>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| Self::io_error(parent, err))?;
        }

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp)
            .await
            .map_err(|err| Self::io_error(&temp, err))?;
        file.write_all(&contents)
            .await
            .map_err(|err| Self::io_error(&temp, err))?;
        file.sync_all()
            .await
            .map_err(|err| Self::io_error(&temp, err))?;
        drop(file);

        fs::rename(&temp, &self.path)
            .await
            .map_err(|err| Self::io_error(&self.path, err))?;

        tracing::debug!(path = ?self.path, bytes = contents.len(), "document written");
        Ok(())
    }
}

/// In-memory storage, shared across clones.
///
/// Counts writes and can be told to fail, which makes it the storage of
/// choice for exercising the stores without touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    contents: Arc<Mutex<Option<Vec<u8>>>>,
    writes: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage that already holds `contents`.
    pub fn with_contents(contents: impl Into<Vec<u8>>) -> Self {
        let storage = Self::default();
        *storage.contents.lock() = Some(contents.into());
        storage
    }

    /// The current document, if any.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.contents.lock().clone()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent read and write fail with `reason`.
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    /// Stop failing.
    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match self.failure.lock().as_ref() {
            Some(reason) => Err(StoreError::Injected(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Storage for MemoryStorage {
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_failure()?;
        Ok(self.contents.lock().clone())
    }

    async fn write(&self, contents: Vec<u8>) -> Result<(), StoreError> {
        self.check_failure()?;
        *self.contents.lock() = Some(contents);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
