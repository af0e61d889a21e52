//! Lazy statement cursor
//!
//! A cursor walks the driving candidate list of each plan in turn and
//! yields detached [`Statement`] copies. It holds no lock between steps:
//! each call to `next` takes the store's inner read lock, advances to the
//! next match and releases it again.
//!
//! Positions are plain indexes into the candidate lists. Lists only grow
//! while no compaction runs, so a cursor must be protected by a structural
//! read guard for its whole lifetime to be exact; the engine attaches one.

use std::sync::Arc;

use quadmem_core::{ReadMode, Statement};

use crate::planner::{Candidate, Plans};
use crate::store::StatementStore;

/// Forward-only, closeable sequence of matching statements
#[derive(Debug)]
pub struct StatementCursor {
    store: Option<Arc<StatementStore>>,
    plans: Plans,
    plan_index: usize,
    position: usize,
    snapshot: u64,
    mode: ReadMode,
    explicit_only: bool,
}

impl StatementCursor {
    pub(crate) fn new(
        store: Arc<StatementStore>,
        plans: Plans,
        snapshot: u64,
        mode: ReadMode,
        explicit_only: bool,
    ) -> Self {
        Self {
            store: Some(store),
            plans,
            plan_index: 0,
            position: 0,
            snapshot,
            mode,
            explicit_only,
        }
    }

    /// A cursor that yields nothing
    pub fn empty() -> Self {
        Self {
            store: None,
            plans: Plans::new(),
            plan_index: 0,
            position: 0,
            snapshot: 0,
            mode: ReadMode::Committed,
            explicit_only: false,
        }
    }

    /// Snapshot this cursor reads
    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }

    /// Check if the cursor was closed or ran out
    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    /// Stop the scan; further calls to `next` return `None`
    ///
    /// Closing twice is harmless.
    pub fn close(&mut self) {
        self.store = None;
        self.plans.clear();
    }

    fn advance(&mut self) -> Option<Statement> {
        let store = self.store.as_ref()?;
        let state = store.read();
        while let Some(plan) = self.plans.get(self.plan_index) {
            match plan.candidate(&state, self.position) {
                Candidate::Exhausted => {
                    self.plan_index += 1;
                    self.position = 0;
                }
                Candidate::Vacant => self.position += 1,
                Candidate::Entry(id) => {
                    self.position += 1;
                    if let Some(record) = state.record(id) {
                        if plan.matches(record)
                            && state.admits(id, record, self.snapshot, self.mode, self.explicit_only)
                        {
                            return Some(state.materialize(id, record));
                        }
                    }
                }
            }
        }
        None
    }
}

impl Iterator for StatementCursor {
    type Item = Statement;

    fn next(&mut self) -> Option<Statement> {
        let next = self.advance();
        if next.is_none() {
            self.close();
        }
        next
    }
}
