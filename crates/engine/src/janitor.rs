//! Snapshot janitor
//!
//! Reclaims statement versions no reader can see any more. A pass takes
//! the structural write lock, so it waits for every open transaction, read
//! view and cursor, then compacts the store in one step.
//!
//! Background passes run on a `quadmem-janitor` thread. At most one is in
//! flight; triggering while one runs is a no-op.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use quadmem_concurrency::ReadWriteLockManager;
use quadmem_core::Result;
use quadmem_storage::{CompactionStats, StatementStore};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct JanitorShared {
    running: AtomicBool,
    closed: AtomicBool,
    passes: AtomicU64,
}

/// Background compaction of obsolete statement versions
pub(crate) struct Janitor {
    store: Arc<StatementStore>,
    structural: Arc<dyn ReadWriteLockManager>,
    shared: Arc<JanitorShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Janitor {
    pub(crate) fn new(store: Arc<StatementStore>, structural: Arc<dyn ReadWriteLockManager>) -> Self {
        Self {
            store,
            structural,
            shared: Arc::new(JanitorShared::default()),
            handle: Mutex::new(None),
        }
    }

    /// Start a background pass unless one is already running
    ///
    /// Returns whether a pass was started.
    pub(crate) fn trigger(&self) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let mut handle = self.handle.lock();
        if let Some(previous) = handle.take() {
            let _ = previous.join();
        }

        let store = Arc::clone(&self.store);
        let structural = Arc::clone(&self.structural);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("quadmem-janitor".to_string())
            .spawn(move || background_pass(&store, structural.as_ref(), &shared));
        match spawned {
            Ok(h) => {
                *handle = Some(h);
                true
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                warn!(target: "quadmem::janitor", error = %e, "Failed to spawn janitor thread");
                false
            }
        }
    }

    /// Run a pass on the calling thread, waiting for the structural lock
    pub(crate) fn clean_now(&self) -> Result<CompactionStats> {
        let guard = self.structural.acquire_write()?;
        let stats = compact(&self.store);
        guard.release();
        Ok(stats)
    }

    /// Run a pass on the calling thread if nothing holds the structural lock
    pub(crate) fn try_clean_now(&self) -> Option<CompactionStats> {
        let guard = self.structural.try_write()?;
        let stats = compact(&self.store);
        guard.release();
        Some(stats)
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Number of background passes that completed
    #[cfg(test)]
    pub(crate) fn passes(&self) -> u64 {
        self.shared.passes.load(Ordering::Acquire)
    }

    /// Refuse further passes and wait for the running one
    ///
    /// A pass still waiting for the structural lock is interrupted; the
    /// interrupt is repeated until the thread exits since it may not have
    /// started waiting yet.
    pub(crate) fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::Release);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            while !handle.is_finished() {
                self.structural.interrupt();
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
    }
}

fn background_pass(
    store: &StatementStore,
    structural: &dyn ReadWriteLockManager,
    shared: &JanitorShared,
) {
    let guard = match structural.acquire_write() {
        Ok(guard) => guard,
        Err(e) => {
            shared.running.store(false, Ordering::Release);
            debug!(target: "quadmem::janitor", error = %e, "Janitor pass abandoned");
            return;
        }
    };
    if !shared.closed.load(Ordering::Acquire) {
        compact(store);
        shared.passes.fetch_add(1, Ordering::AcqRel);
    }
    // Cleared while the write side is still held, so a commit that follows
    // the release can always start the next pass
    shared.running.store(false, Ordering::Release);
    guard.release();
}

fn compact(store: &StatementStore) -> CompactionStats {
    let stats = store.write().compact();
    debug!(
        target: "quadmem::janitor",
        reclaimed = stats.reclaimed,
        retained = stats.retained,
        "Janitor pass complete"
    );
    stats
}
