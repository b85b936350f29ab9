//! Hanging-read coordination.
//!
//! # Waiter States
//! ```text
//! ARMED ──(replace)──▶ SATISFIED
//!   │
//!   └───(bound elapsed)──▶ TIMED_OUT
//! ```
//!
//! A read whose baseline is absent or already stale never arms; it is
//! answered immediately.
//!
//! # Design Decisions
//! - The coordinator publishes the snapshot every reader sees. Plain reads
//!   load it lock-free; it is only ever stored while the waiter mutex is
//!   held, so a hanging read never observes an older version than a plain
//!   read that came before it
//! - The baseline check and registration are a single step under that mutex
//!   relative to [`ChangeListener::on_replace`]; no replace can slip in
//!   between
//! - Waiters are drained under the mutex and woken after it is released
//! - The bound is measured from registration
//! - A drop guard deregisters the waiter, so a request abandoned mid-wait
//!   leaves nothing behind

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::sync::oneshot;

use crate::observability::metrics;
use crate::palette::model::{Snapshot, Version};
use crate::palette::store::ChangeListener;

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Answered without suspending.
    Immediate,
    /// Woken by a replace.
    Changed,
    /// The bound elapsed with no change.
    TimedOut,
}

impl WaitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitKind::Immediate => "immediate",
            WaitKind::Changed => "changed",
            WaitKind::TimedOut => "timeout",
        }
    }
}

/// Result of [`WaitCoordinator::wait`]. Always carries a snapshot.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub kind: WaitKind,
    pub snapshot: Arc<Snapshot>,
}

type WaiterId = u64;

struct WaitState {
    waiters: HashMap<WaiterId, oneshot::Sender<Arc<Snapshot>>>,
    /// Set on shutdown; no new waiter arms after this.
    closed: bool,
}

/// Suspends readers until the palette version moves past their baseline.
pub struct WaitCoordinator {
    /// Written only with `state` locked.
    latest: ArcSwap<Snapshot>,
    state: Mutex<WaitState>,
    next_id: AtomicU64,
}

impl WaitCoordinator {
    pub fn new(initial: Arc<Snapshot>) -> Self {
        Self {
            latest: ArcSwap::new(initial),
            state: Mutex::new(WaitState {
                waiters: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WaitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current snapshot as seen by readers.
    pub fn latest(&self) -> Arc<Snapshot> {
        self.latest.load_full()
    }

    /// Number of armed waiters.
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Wait until the version differs from `baseline`, at most `bound`.
    pub async fn wait(&self, baseline: Option<Version>, bound: Duration) -> WaitOutcome {
        let receiver = {
            let mut state = self.lock();
            let latest = self.latest.load_full();
            match baseline {
                Some(seen) if seen == latest.version && !state.closed => {}
                _ => {
                    metrics::record_wait(WaitKind::Immediate.as_str(), Duration::ZERO);
                    return WaitOutcome {
                        kind: WaitKind::Immediate,
                        snapshot: latest,
                    };
                }
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            state.waiters.insert(id, tx);
            metrics::set_pending_waiters(state.waiters.len());
            (id, rx)
        };

        let (id, rx) = receiver;
        let _registration = Registration { coordinator: self, id };
        let armed_at = Instant::now();

        tracing::trace!(waiter = id, baseline = ?baseline, "Waiter armed");

        let snapshot = match tokio::time::timeout(bound, rx).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(_)) | Err(_) => self.latest(),
        };
        // Change is decided by version alone; a close at shutdown hands back
        // the baseline version and counts as a timeout.
        let kind = if Some(snapshot.version) != baseline {
            WaitKind::Changed
        } else {
            WaitKind::TimedOut
        };
        let outcome = WaitOutcome { kind, snapshot };

        metrics::record_wait(outcome.kind.as_str(), armed_at.elapsed());
        tracing::trace!(
            waiter = id,
            outcome = outcome.kind.as_str(),
            version = %outcome.snapshot.version,
            "Waiter finished"
        );
        outcome
    }

    /// Stop arming new waiters and wake every armed one with the current
    /// snapshot.
    ///
    /// Used on shutdown so hanging reads do not hold up the drain.
    pub fn close(&self) -> usize {
        let (latest, waiters) = {
            let mut state = self.lock();
            state.closed = true;
            let waiters = std::mem::take(&mut state.waiters);
            metrics::set_pending_waiters(0);
            (self.latest.load_full(), waiters)
        };

        let released = waiters.len();
        for (_, tx) in waiters {
            let _ = tx.send(Arc::clone(&latest));
        }
        if released > 0 {
            tracing::info!(released, "Released pending waiters");
        }
        released
    }

    fn deregister(&self, id: WaiterId) {
        let mut state = self.lock();
        if state.waiters.remove(&id).is_some() {
            metrics::set_pending_waiters(state.waiters.len());
        }
    }
}

impl ChangeListener for WaitCoordinator {
    fn on_replace(&self, snapshot: &Arc<Snapshot>) {
        let waiters = {
            let mut state = self.lock();
            if snapshot.version <= self.latest.load().version {
                return;
            }
            self.latest.store(Arc::clone(snapshot));
            metrics::set_pending_waiters(0);
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            tracing::debug!(
                version = %snapshot.version,
                waiters = waiters.len(),
                "Waking waiters"
            );
        }
        for (_, tx) in waiters {
            // A closed receiver means the reader already gave up.
            let _ = tx.send(Arc::clone(snapshot));
        }
    }
}

/// Removes a waiter from the map when its wait ends or is abandoned.
struct Registration<'a> {
    coordinator: &'a WaitCoordinator,
    id: WaiterId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.coordinator.deregister(self.id);
    }
}
