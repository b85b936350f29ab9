//! The single current palette.
//!
//! # Design Decisions
//! - Readers load an `Arc<Snapshot>` through `ArcSwap`; they never block and
//!   never observe a partially written value
//! - Writers serialize on a mutex that is held across persistence, so the
//!   version counter only advances once the durable backend has the record
//! - The change listener runs while the writer lock is still held, so it sees
//!   replacements strictly in version order

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::palette::durable::{DurableStore, StorageError};
use crate::palette::model::{Palette, Provenance, Snapshot};

/// Hook invoked synchronously after every successful replace.
pub trait ChangeListener: Send + Sync {
    fn on_replace(&self, snapshot: &Arc<Snapshot>);
}

/// Holds the current snapshot with write-through to a [`DurableStore`].
pub struct ConfigStore {
    current: ArcSwap<Snapshot>,
    durable: Arc<dyn DurableStore>,
    write_lock: Mutex<()>,
    listener: OnceLock<Arc<dyn ChangeListener>>,
}

impl ConfigStore {
    /// Open the store, materializing and persisting the built-in default if
    /// the backend has never been written.
    pub fn open(durable: Arc<dyn DurableStore>) -> Result<Self, StorageError> {
        let snapshot = match durable.load()? {
            Some(snapshot) => snapshot,
            None => {
                let snapshot = Snapshot::initial();
                durable.save(&snapshot)?;
                tracing::info!(version = %snapshot.version, "Materialized default palette");
                snapshot
            }
        };
        metrics::set_config_version(snapshot.version);

        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            durable,
            write_lock: Mutex::new(()),
            listener: OnceLock::new(),
        })
    }

    /// The last persisted snapshot.
    ///
    /// Published before the change listener runs; readers that pair plain
    /// and hanging reads go through the listener's copy instead.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Install `palette` as current under the next version.
    ///
    /// On storage failure the previous snapshot stays current.
    pub fn replace(
        &self,
        palette: Palette,
        provenance: Option<Provenance>,
    ) -> Result<Arc<Snapshot>, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.current.load();
        let next = Arc::new(previous.successor(palette, provenance));

        self.durable.save(&next)?;
        self.current.store(Arc::clone(&next));
        metrics::set_config_version(next.version);

        if let Some(listener) = self.listener.get() {
            listener.on_replace(&next);
        }

        Ok(next)
    }

    /// Attach the change listener. Only one may be attached; returns `false`
    /// if one already was.
    pub fn attach_listener(&self, listener: Arc<dyn ChangeListener>) -> bool {
        self.listener.set(listener).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::durable::MemoryStore;
    use crate::palette::model::Version;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn sample(color: &str) -> Palette {
        Palette {
            colors: vec![color.to_string()],
            display_duration_ms: 500,
            fadeout_duration_ms: 500,
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        last: AtomicU64,
        calls: AtomicU64,
    }

    impl ChangeListener for RecordingListener {
        fn on_replace(&self, snapshot: &Arc<Snapshot>) {
            self.last.store(snapshot.version.as_u64(), Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_empty_store_materializes_default() {
        let durable = Arc::new(MemoryStore::new());
        let store = ConfigStore::open(durable.clone()).unwrap();

        let current = store.current();
        assert_eq!(current.version, Version::INITIAL);
        assert_eq!(current.palette, Palette::builtin_default());
        assert_eq!(durable.save_count(), 1);
    }

    #[test]
    fn test_open_resumes_persisted_version() {
        let persisted = Snapshot::initial().successor(sample("000000"), None);
        let durable = Arc::new(MemoryStore::with_record(persisted.clone()));
        let store = ConfigStore::open(durable.clone()).unwrap();

        assert_eq!(store.current().version, Version::new(2));
        assert_eq!(durable.save_count(), 0);

        let next = store.replace(sample("FFFFFF"), None).unwrap();
        assert_eq!(next.version, Version::new(3));
    }

    #[test]
    fn test_replace_is_monotonic_and_visible() {
        let store = ConfigStore::open(Arc::new(MemoryStore::new())).unwrap();
        let before = store.current().version;

        let installed = store.replace(sample("000000"), None).unwrap();
        let observed = store.current();
        assert!(observed.version > before);
        assert_eq!(observed.version, installed.version);
        assert_eq!(observed.palette, sample("000000"));

        // Same content still advances the version.
        let again = store.replace(sample("000000"), None).unwrap();
        assert!(again.version > installed.version);
    }

    #[test]
    fn test_storage_failure_keeps_previous() {
        let durable = Arc::new(MemoryStore::new());
        let store = ConfigStore::open(durable.clone()).unwrap();
        let before = store.current();

        durable.set_failing(true);
        assert!(store.replace(sample("000000"), None).is_err());
        assert_eq!(store.current(), before);

        durable.set_failing(false);
        let next = store.replace(sample("000000"), None).unwrap();
        assert_eq!(next.version, before.version.next());
    }

    #[test]
    fn test_listener_sees_every_replace() {
        let store = ConfigStore::open(Arc::new(MemoryStore::new())).unwrap();
        let listener = Arc::new(RecordingListener::default());
        assert!(store.attach_listener(listener.clone()));
        assert!(!store.attach_listener(listener.clone()));

        store.replace(sample("000000"), None).unwrap();
        store.replace(sample("FF0000"), None).unwrap();

        assert_eq!(listener.calls.load(Ordering::SeqCst), 2);
        assert_eq!(listener.last.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_concurrent_writers_get_distinct_versions() {
        let store = Arc::new(ConfigStore::open(Arc::new(MemoryStore::new())).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| store.replace(sample("0000FF"), None).unwrap().version)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut versions: Vec<Version> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        versions.sort();
        versions.dedup();
        assert_eq!(versions.len(), 200);
        assert_eq!(store.current().version, Version::new(201));
    }
}
