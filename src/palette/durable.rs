//! Durable persistence for the current snapshot.
//!
//! The core only needs `load` at startup and `save` on every replace; the
//! storage engine behind [`DurableStore`] is interchangeable.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::palette::model::Snapshot;

/// Errors raised by a durable backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// External collaborator that keeps the current snapshot across restarts.
pub trait DurableStore: Send + Sync {
    /// Return the last saved snapshot, if any.
    fn load(&self) -> Result<Option<Snapshot>, StorageError>;

    /// Persist `snapshot` as the latest record.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}

/// In-process backend. Nothing survives a restart.
///
/// Saves can be made to fail on demand, which is how storage outages are
/// simulated in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<Snapshot>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `snapshot` already persisted.
    pub fn with_record(snapshot: Snapshot) -> Self {
        Self {
            record: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl DurableStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(record.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store is failing".into()));
        }
        let mut record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        *record = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Single JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the rename itself. Directories cannot be opened for syncing
    /// outside unix.
    #[cfg(unix)]
    fn sync_parent(&self) -> std::io::Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => fs::File::open(dir)?.sync_all(),
            _ => Ok(()),
        }
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DurableStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        tracing::info!(
            path = %self.path.display(),
            version = %snapshot.version,
            "Loaded palette from disk"
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // The staging file is synced before the rename so the rename can
        // never land ahead of the data.
        let staging = self.staging_path();
        let encoded = serde_json::to_vec_pretty(snapshot)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&staging)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&staging, &self.path)?;
        self.sync_parent()?;

        tracing::debug!(
            path = %self.path.display(),
            version = %snapshot.version,
            "Palette persisted"
        );
        Ok(())
    }
}
