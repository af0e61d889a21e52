//! Open-guard registry
//!
//! Records every guard handed out while tracking is enabled, so guards that
//! are never released can be found. Each entry remembers the lock alias,
//! the mode, the acquiring thread and, when requested, a captured
//! backtrace of the acquisition site.

use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::guard::GuardMode;

/// A guard that has not been released yet
#[derive(Debug, Clone)]
pub struct OpenGuard {
    /// Registry id, increasing in acquisition order
    pub id: u64,
    /// Alias of the lock manager
    pub alias: String,
    /// How the lock is held
    pub mode: GuardMode,
    /// Name (or id) of the acquiring thread
    pub thread: String,
    /// When the guard was acquired
    pub acquired_at: Instant,
    /// Acquisition backtrace, if capture was requested
    pub backtrace: Option<String>,
}

/// Registry of open guards shared by a set of lock managers
#[derive(Debug)]
pub struct LockTracker {
    enabled: bool,
    capture_backtraces: bool,
    next_id: AtomicU64,
    open: Mutex<FxHashMap<u64, OpenGuard>>,
}

impl LockTracker {
    /// Create a tracker
    pub fn new(enabled: bool, capture_backtraces: bool) -> Self {
        Self {
            enabled,
            capture_backtraces,
            next_id: AtomicU64::new(1),
            open: Mutex::new(FxHashMap::default()),
        }
    }

    /// A tracker that records nothing
    pub fn disabled() -> Self {
        Self::new(false, false)
    }

    /// Check whether guards are being recorded
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Currently open guards, oldest first
    pub fn open_guards(&self) -> Vec<OpenGuard> {
        let mut guards: Vec<_> = self.open.lock().values().cloned().collect();
        guards.sort_by_key(|g| g.id);
        guards
    }

    /// Number of currently open guards
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    pub(crate) fn register(self: &Arc<Self>, alias: &str, mode: GuardMode) -> Option<TrackToken> {
        if !self.enabled {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let current = std::thread::current();
        let thread = match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        };
        let backtrace = self
            .capture_backtraces
            .then(|| Backtrace::force_capture().to_string());
        self.open.lock().insert(
            id,
            OpenGuard {
                id,
                alias: alias.to_string(),
                mode,
                thread,
                acquired_at: Instant::now(),
                backtrace,
            },
        );
        Some(TrackToken {
            tracker: Arc::clone(self),
            id,
        })
    }
}

/// Registration handle; unregisters on drop
#[derive(Debug)]
pub(crate) struct TrackToken {
    tracker: Arc<LockTracker>,
    id: u64,
}

impl Drop for TrackToken {
    fn drop(&mut self) {
        self.tracker.open.lock().remove(&self.id);
    }
}
