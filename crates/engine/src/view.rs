//! Pinned read views

use std::fmt;
use std::sync::Arc;

use quadmem_concurrency::{GuardedCursor, ReadGuard};
use quadmem_core::{Quad, ReadMode, Term};
use quadmem_storage::{StatementPattern, StatementStore};

/// A consistent view of the store at one snapshot
///
/// Every scan through the view reads the snapshot that was current when the
/// view was taken, no matter how many commits happen meanwhile. The view
/// holds a structural read guard, which keeps the janitor from renumbering
/// snapshots until it is dropped.
pub struct ReadView {
    store: Arc<StatementStore>,
    snapshot: u64,
    guard: Arc<ReadGuard>,
}

impl fmt::Debug for ReadView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadView")
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

impl ReadView {
    pub(crate) fn new(store: Arc<StatementStore>, guard: ReadGuard) -> Self {
        // Caller holds the guard already; the snapshot cannot be renumbered.
        let snapshot = store.current_snapshot();
        Self {
            store,
            snapshot,
            guard: Arc::new(guard),
        }
    }

    /// Snapshot this view reads
    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }

    /// Scan the view
    pub fn scan(&self, pattern: &StatementPattern) -> GuardedCursor {
        let cursor = self
            .store
            .scan(pattern, self.snapshot, ReadMode::Committed);
        GuardedCursor::new(cursor, Arc::clone(&self.guard))
    }

    /// Check whether the view holds `quad`
    pub fn contains(&self, quad: &Quad) -> bool {
        self.scan(&StatementPattern::for_quad(quad)).next().is_some()
    }

    /// Number of statements in the view
    pub fn size(&self) -> usize {
        self.store.read().visible_count(self.snapshot)
    }

    /// Number of statements in the view matching `pattern`
    pub fn size_matching(&self, pattern: &StatementPattern) -> usize {
        self.scan(pattern).count()
    }

    /// Named contexts with at least one statement in the view
    pub fn context_ids(&self) -> Vec<Term> {
        self.store.read().context_ids(self.snapshot)
    }
}
