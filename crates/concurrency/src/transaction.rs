//! Transactions
//!
//! A [`Transaction`] holds the exclusive transaction lock and a structural
//! read guard from `begin` until it is committed, rolled back or dropped.
//! Every `add`/`remove` immediately edits the shared arena, but only as a
//! provisional entry or pending status (see [`crate::status`]); readers at
//! committed snapshots cannot see any of it until commit publishes the new
//! snapshot.
//!
//! ## Commit
//!
//! ```text
//! T = current + 1
//! NEW                -> visible from T                   (added)
//! DEPRECATED         -> till = T                         (removed)
//! ZOMBIE             -> till = T                         (obsolete)
//! EXPLICIT/INFERRED  -> till = T on the old version,
//!                       new version with flipped flag
//!                       from T                           (obsolete)
//! any pending entry  -> current = T
//! ```
//!
//! ## Rollback
//!
//! NEW and ZOMBIE entries get `till = current` so they can never become
//! visible and the next compaction reclaims them; other statuses are simply
//! dropped. The snapshot does not move.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use quadmem_core::{
    Quad, QuadError, ReadMode, Result, Statement, StatementId, StoreChange, TxnStatus,
};
use quadmem_storage::{StatementPattern, StatementRecord, StatementStore, StoreState};
use tracing::debug;

use crate::cursor::GuardedCursor;
use crate::lock::{ExclusiveGuard, ReadGuard};
use crate::status::{on_add, on_remove, Transition};

/// Result of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitOutcome {
    /// Snapshot current after the commit
    pub snapshot: u64,
    /// At least one statement became visible
    pub statements_added: bool,
    /// At least one visible statement was removed
    pub statements_removed: bool,
    /// Versions closed by this commit, reclaimable by compaction
    pub obsolete: usize,
}

impl CommitOutcome {
    /// Change notification for listeners
    pub fn change(&self) -> StoreChange {
        StoreChange {
            statements_added: self.statements_added,
            statements_removed: self.statements_removed,
        }
    }

    /// Check whether compaction has work to do
    pub fn needs_cleanup(&self) -> bool {
        self.obsolete > 0
    }
}

/// Result of a rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollbackOutcome {
    /// Pending entries discarded
    pub discarded: usize,
    /// Provisional versions left for compaction
    pub reclaimable: usize,
}

impl RollbackOutcome {
    /// Check whether compaction has work to do
    pub fn needs_cleanup(&self) -> bool {
        self.reclaimable > 0
    }
}

/// Notified after a transaction ends and its locks are released
pub trait TransactionObserver: Send + Sync {
    /// A transaction committed
    fn committed(&self, outcome: &CommitOutcome);

    /// A transaction rolled back (explicitly or by drop)
    fn rolled_back(&self, outcome: &RollbackOutcome);
}

/// Apply the commit state machine to every pending entry
pub fn finalize_commit(state: &mut StoreState) -> CommitOutcome {
    let target = state.current_snapshot() + 1;
    let pending = state.take_pending();
    let mut outcome = CommitOutcome {
        snapshot: state.current_snapshot(),
        ..CommitOutcome::default()
    };

    for (id, status) in &pending {
        match status {
            TxnStatus::New => outcome.statements_added = true,
            TxnStatus::Deprecated => {
                if let Some(record) = state.record_mut(*id) {
                    record.till = target;
                    outcome.statements_removed = true;
                    outcome.obsolete += 1;
                }
            }
            TxnStatus::Zombie => {
                if let Some(record) = state.record_mut(*id) {
                    record.till = target;
                    outcome.obsolete += 1;
                }
            }
            TxnStatus::Explicit | TxnStatus::Inferred => {
                if let Some(record) = state.record_mut(*id) {
                    record.till = target;
                    let flipped = StatementRecord::new(
                        record.subject,
                        record.predicate,
                        record.object,
                        record.context,
                        *status == TxnStatus::Explicit,
                        target,
                    );
                    state.insert(flipped);
                    outcome.obsolete += 1;
                }
            }
            TxnStatus::Neutral => {}
        }
    }

    if !pending.is_empty() {
        state.advance_snapshot(target);
        outcome.snapshot = target;
    }
    outcome
}

/// Discard every pending entry
pub fn finalize_rollback(state: &mut StoreState) -> RollbackOutcome {
    let current = state.current_snapshot();
    let pending = state.take_pending();
    let mut outcome = RollbackOutcome {
        discarded: pending.len(),
        reclaimable: 0,
    };
    for (id, status) in pending {
        if matches!(status, TxnStatus::New | TxnStatus::Zombie) {
            if let Some(record) = state.record_mut(id) {
                record.till = current;
                outcome.reclaimable += 1;
            }
        }
    }
    outcome
}

/// The single in-flight write transaction
pub struct Transaction {
    store: Arc<StatementStore>,
    snapshot: u64,
    structural: Option<Arc<ReadGuard>>,
    exclusive: Option<ExclusiveGuard>,
    closed: Arc<AtomicBool>,
    observer: Option<Weak<dyn TransactionObserver>>,
    finished: bool,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("snapshot", &self.snapshot)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(
        store: Arc<StatementStore>,
        structural: ReadGuard,
        exclusive: ExclusiveGuard,
        closed: Arc<AtomicBool>,
        observer: Option<Weak<dyn TransactionObserver>>,
    ) -> Self {
        let snapshot = store.current_snapshot() + 1;
        Self {
            store,
            snapshot,
            structural: Some(Arc::new(structural)),
            exclusive: Some(exclusive),
            closed,
            observer,
            finished: false,
        }
    }

    /// Snapshot this transaction will commit as
    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }

    /// Number of entries with a pending status
    pub fn pending_count(&self) -> usize {
        self.store.read().pending_len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QuadError::TransactionNotActive(
                "store was shut down while the transaction was open".to_string(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Assert an explicit statement
    pub fn add(&mut self, quad: &Quad) -> Result<Option<Statement>> {
        self.add_statement(quad, true)
    }

    /// Add an inferred statement
    pub fn add_inferred(&mut self, quad: &Quad) -> Result<Option<Statement>> {
        self.add_statement(quad, false)
    }

    /// Add a statement with the given flag
    ///
    /// Returns the affected entry, or `None` if the statement was already
    /// present in a form that subsumes this one. The entry carries the
    /// requested flag; for an upgrade or downgrade its `since`/`till` are
    /// those of the version the commit will supersede.
    ///
    /// # Errors
    /// `InvalidInput` if a term is not allowed in its position.
    pub fn add_statement(&mut self, quad: &Quad, explicit: bool) -> Result<Option<Statement>> {
        self.ensure_open()?;
        let mut state = self.store.write();
        let (s, p, o, c) = state.intern_quad(quad)?;

        let id = match state.find_version(s, p, o, c, self.snapshot) {
            None => {
                let id = state.insert(StatementRecord::new(s, p, o, c, explicit, self.snapshot));
                state.set_status(id, TxnStatus::New);
                return Ok(state.statement(id));
            }
            Some(id) => id,
        };
        let stored_explicit = match state.record(id) {
            Some(record) => record.explicit,
            None => return Err(QuadError::internal(format!("{} vanished during add", id))),
        };
        let transition = on_add(state.status(id), stored_explicit, explicit);
        if apply(&mut state, id, transition) {
            Ok(state.statement(id).map(|mut statement| {
                statement.explicit = explicit;
                statement
            }))
        } else {
            Ok(None)
        }
    }

    /// Retract an explicit statement
    pub fn remove(&mut self, quad: &Quad) -> Result<bool> {
        self.remove_statement(quad, true)
    }

    /// Retract an inferred statement
    pub fn remove_inferred(&mut self, quad: &Quad) -> Result<bool> {
        self.remove_statement(quad, false)
    }

    /// Remove a statement with the given flag
    ///
    /// Returns `false` if no such statement exists or its flag does not
    /// match.
    pub fn remove_statement(&mut self, quad: &Quad, explicit: bool) -> Result<bool> {
        self.ensure_open()?;
        let mut state = self.store.write();
        let Some((s, p, o, c)) = state.lookup_quad(quad) else {
            return Ok(false);
        };
        let Some(id) = state.find_version(s, p, o, c, self.snapshot) else {
            return Ok(false);
        };
        Ok(remove_entry(&mut state, id, explicit))
    }

    /// Remove every statement matching `pattern` with the given flag
    ///
    /// The pattern's own `explicit_only` is ignored. Returns whether
    /// anything was removed.
    pub fn remove_matching(&mut self, pattern: &StatementPattern, explicit: bool) -> Result<bool> {
        self.ensure_open()?;
        let pattern = pattern.clone().explicit_only(explicit);
        let candidates: Vec<StatementId> = self
            .store
            .scan(&pattern, self.snapshot, ReadMode::Transaction)
            .map(|st| st.id)
            .collect();

        let mut state = self.store.write();
        let mut removed = false;
        for id in candidates {
            removed |= remove_entry(&mut state, id, explicit);
        }
        Ok(removed)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Scan the transaction's own view, including its uncommitted changes
    pub fn scan(&self, pattern: &StatementPattern) -> Result<GuardedCursor> {
        self.ensure_open()?;
        let guard = self
            .structural
            .clone()
            .ok_or_else(|| QuadError::internal("transaction has no structural guard"))?;
        let cursor = self
            .store
            .scan(pattern, self.snapshot, ReadMode::Transaction);
        Ok(GuardedCursor::new(cursor, guard))
    }

    /// Number of statements in the transaction's view
    pub fn size(&self) -> Result<usize> {
        Ok(self.scan(&StatementPattern::any())?.count())
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Publish every change as one new snapshot
    ///
    /// # Errors
    /// `TransactionNotActive` if the store was shut down meanwhile; the
    /// transaction is rolled back instead.
    pub fn commit(mut self) -> Result<CommitOutcome> {
        self.ensure_open()?;
        let outcome = {
            let mut state = self.store.write();
            finalize_commit(&mut state)
        };
        self.finished = true;
        self.release_locks();
        debug!(
            target: "quadmem::txn",
            snapshot = outcome.snapshot,
            added = outcome.statements_added,
            removed = outcome.statements_removed,
            obsolete = outcome.obsolete,
            "Transaction committed"
        );
        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.committed(&outcome);
        }
        Ok(outcome)
    }

    /// Discard every change
    pub fn rollback(mut self) -> RollbackOutcome {
        self.rollback_inner()
    }

    fn rollback_inner(&mut self) -> RollbackOutcome {
        let outcome = {
            let mut state = self.store.write();
            finalize_rollback(&mut state)
        };
        self.finished = true;
        self.release_locks();
        debug!(
            target: "quadmem::txn",
            discarded = outcome.discarded,
            reclaimable = outcome.reclaimable,
            "Transaction rolled back"
        );
        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.rolled_back(&outcome);
        }
        outcome
    }

    fn release_locks(&mut self) {
        if let Some(guard) = self.exclusive.take() {
            guard.release();
        }
        self.structural = None;
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            self.rollback_inner();
        }
    }
}

fn apply(state: &mut StoreState, id: StatementId, transition: Transition) -> bool {
    match transition {
        Transition::Unchanged => false,
        Transition::Status(status) => {
            state.set_status(id, status);
            true
        }
        Transition::StatusAndFlag(status, explicit) => {
            if let Some(record) = state.record_mut(id) {
                record.explicit = explicit;
            }
            state.set_status(id, status);
            true
        }
    }
}

fn remove_entry(state: &mut StoreState, id: StatementId, explicit: bool) -> bool {
    let Some(stored_explicit) = state.record(id).map(|r| r.explicit) else {
        return false;
    };
    let transition = on_remove(state.status(id), stored_explicit, explicit);
    apply(state, id, transition)
}
