//! Versioned statement store
//!
//! [`StoreState`] bundles everything a scan or a transaction touches:
//! - the value interner and its back-reference lists
//! - the statement arena
//! - the pending-status side table of the active transaction
//! - the current (last committed) snapshot number
//!
//! [`StatementStore`] wraps the state in a `parking_lot::RwLock`. That lock
//! only protects memory: it is taken briefly per operation and never held
//! across caller code. Logical coordination (one transaction at a time,
//! compaction excluded while reads are in flight) is the job of the lock
//! managers in the concurrency layer.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use quadmem_core::{
    Position, Quad, QuadError, ReadMode, Result, Statement, StatementId, Term, TxnStatus,
    ValueId, INITIAL_SNAPSHOT,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::arena::{StatementArena, StatementRecord};
use crate::cursor::StatementCursor;
use crate::interner::ValueInterner;
use crate::planner::{self, StatementPattern};

/// Result of a compaction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Versions physically removed
    pub reclaimed: usize,
    /// Versions kept
    pub retained: usize,
}

/// Interner, arena and transaction bookkeeping
#[derive(Debug)]
pub struct StoreState {
    interner: ValueInterner,
    arena: StatementArena,
    pending: FxHashMap<StatementId, TxnStatus>,
    current_snapshot: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreState {
    /// Create an empty state at the initial snapshot
    pub fn new() -> Self {
        Self {
            interner: ValueInterner::new(),
            arena: StatementArena::new(),
            pending: FxHashMap::default(),
            current_snapshot: INITIAL_SNAPSHOT,
        }
    }

    /// The value interner
    pub fn interner(&self) -> &ValueInterner {
        &self.interner
    }

    /// The statement arena
    pub fn arena(&self) -> &StatementArena {
        &self.arena
    }

    /// Last committed snapshot
    pub fn current_snapshot(&self) -> u64 {
        self.current_snapshot
    }

    /// Publish a new committed snapshot
    ///
    /// Snapshots only move forward here; compaction is the one place that
    /// resets the counter.
    pub fn advance_snapshot(&mut self, snapshot: u64) {
        debug_assert!(snapshot > self.current_snapshot);
        self.current_snapshot = snapshot;
    }

    /// Set the snapshot counter after restoring a dump
    pub fn restore_snapshot(&mut self, snapshot: u64) {
        self.current_snapshot = snapshot.max(INITIAL_SNAPSHOT);
    }

    // ========================================================================
    // Pending statuses
    // ========================================================================

    /// Pending status of an entry (`Neutral` when untouched)
    pub fn status(&self, id: StatementId) -> TxnStatus {
        self.pending.get(&id).copied().unwrap_or(TxnStatus::Neutral)
    }

    /// Record a pending status; `Neutral` clears the entry
    pub fn set_status(&mut self, id: StatementId, status: TxnStatus) {
        if status == TxnStatus::Neutral {
            self.pending.remove(&id);
        } else {
            self.pending.insert(id, status);
        }
    }

    /// Number of entries with a non-neutral status
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove and return every pending status, in slot order
    pub fn take_pending(&mut self) -> Vec<(StatementId, TxnStatus)> {
        let mut pending: Vec<_> = self.pending.drain().collect();
        pending.sort_unstable_by_key(|(id, _)| *id);
        pending
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Get a record by handle
    pub fn record(&self, id: StatementId) -> Option<&StatementRecord> {
        self.arena.get(id)
    }

    /// Get a mutable record by handle
    pub fn record_mut(&mut self, id: StatementId) -> Option<&mut StatementRecord> {
        self.arena.get_mut(id)
    }

    /// Resolve a handle into a detached [`Statement`]
    pub fn statement(&self, id: StatementId) -> Option<Statement> {
        self.arena.get(id).map(|record| self.materialize(id, record))
    }

    pub(crate) fn materialize(&self, id: StatementId, record: &StatementRecord) -> Statement {
        Statement {
            id,
            quad: Quad {
                subject: self.interner.term(record.subject).clone(),
                predicate: self.interner.term(record.predicate).clone(),
                object: self.interner.term(record.object).clone(),
                context: record.context.map(|c| self.interner.term(c).clone()),
            },
            explicit: record.explicit,
            since: record.since,
            till: record.till,
        }
    }

    /// Intern the terms of `quad`, checking each position's allowed kinds
    ///
    /// # Errors
    /// `InvalidInput` for a literal subject or context, or a predicate that
    /// is not an IRI.
    pub fn intern_quad(
        &mut self,
        quad: &Quad,
    ) -> Result<(ValueId, ValueId, ValueId, Option<ValueId>)> {
        if !quad.predicate.is_iri() {
            return Err(QuadError::invalid_input(format!(
                "predicate must be an IRI, got {} {}",
                quad.predicate.kind_name(),
                quad.predicate
            )));
        }
        let subject = self.interner.intern_resource(&quad.subject)?;
        let predicate = self.interner.intern_resource(&quad.predicate)?;
        let object = self.interner.intern(&quad.object);
        let context = match &quad.context {
            Some(ctx) => Some(self.interner.intern_resource(ctx)?),
            None => None,
        };
        Ok((subject, predicate, object, context))
    }

    /// Look up the terms of `quad` without interning
    ///
    /// Returns `None` if any term is unknown, in which case no statement with
    /// these terms can exist.
    pub fn lookup_quad(&self, quad: &Quad) -> Option<(ValueId, ValueId, ValueId, Option<ValueId>)> {
        let subject = self.interner.lookup_resource(&quad.subject)?;
        let predicate = self.interner.lookup_resource(&quad.predicate)?;
        let object = self.interner.lookup(&quad.object)?;
        let context = match &quad.context {
            Some(ctx) => Some(self.interner.lookup_resource(ctx)?),
            None => None,
        };
        Some((subject, predicate, object, context))
    }

    /// Store a new version and link it into the back-reference lists
    pub fn insert(&mut self, record: StatementRecord) -> StatementId {
        let links = [
            (Some(record.subject), Position::Subject),
            (Some(record.predicate), Position::Predicate),
            (Some(record.object), Position::Object),
            (record.context, Position::Context),
        ];
        let id = self.arena.insert(record);
        for (value, position) in links {
            if let Some(value) = value {
                self.interner.link(value, position, id);
            }
        }
        id
    }

    /// Intern and store a statement version starting at `since`
    pub fn insert_quad(&mut self, quad: &Quad, explicit: bool, since: u64) -> Result<StatementId> {
        let (s, p, o, c) = self.intern_quad(quad)?;
        Ok(self.insert(StatementRecord::new(s, p, o, c, explicit, since)))
    }

    /// Find the version with the given terms visible at `snapshot`
    ///
    /// Pending status is ignored, so this also finds entries the active
    /// transaction added or deprecated.
    pub fn find_version(
        &self,
        subject: ValueId,
        predicate: ValueId,
        object: ValueId,
        context: Option<ValueId>,
        snapshot: u64,
    ) -> Option<StatementId> {
        let mut lists = [
            self.interner.refs(subject, Position::Subject),
            self.interner.refs(predicate, Position::Predicate),
            self.interner.refs(object, Position::Object),
        ];
        lists.sort_by_key(|list| list.len());
        lists[0].iter().copied().find(|id| {
            self.arena.get(*id).map_or(false, |record| {
                record.has_terms(subject, predicate, object, context)
                    && record.is_visible_at(snapshot)
            })
        })
    }

    /// Check whether a record passes the read-mode filter
    pub fn admits(
        &self,
        id: StatementId,
        record: &StatementRecord,
        snapshot: u64,
        mode: ReadMode,
        explicit_only: bool,
    ) -> bool {
        if !record.is_visible_at(snapshot) {
            return false;
        }
        match mode {
            ReadMode::Committed => {
                self.status(id) != TxnStatus::New && (!explicit_only || record.explicit)
            }
            ReadMode::Raw => !explicit_only || record.explicit,
            ReadMode::Transaction => {
                let status = self.status(id);
                if status.is_removed() {
                    return false;
                }
                if explicit_only
                    && ((!record.explicit && status != TxnStatus::Explicit)
                        || status == TxnStatus::Inferred)
                {
                    return false;
                }
                true
            }
        }
    }

    // ========================================================================
    // Whole-store queries
    // ========================================================================

    /// Number of versions visible at `snapshot`
    pub fn visible_count(&self, snapshot: u64) -> usize {
        self.arena
            .iter()
            .filter(|(id, record)| self.admits(*id, record, snapshot, ReadMode::Committed, false))
            .count()
    }

    /// Every statement visible at `snapshot` with its explicit flag
    pub fn visible_quads(&self, snapshot: u64) -> Vec<(Quad, bool)> {
        self.arena
            .iter()
            .filter(|(id, record)| self.admits(*id, record, snapshot, ReadMode::Committed, false))
            .map(|(id, record)| (self.materialize(id, record).quad, record.explicit))
            .collect()
    }

    /// Named contexts holding at least one statement visible at `snapshot`
    pub fn context_ids(&self, snapshot: u64) -> Vec<Term> {
        self.interner
            .resources()
            .filter(|(value, _)| {
                self.interner
                    .refs(*value, Position::Context)
                    .iter()
                    .any(|id| {
                        self.arena.get(*id).map_or(false, |record| {
                            self.admits(*id, record, snapshot, ReadMode::Committed, false)
                        })
                    })
            })
            .map(|(_, term)| term.clone())
            .collect()
    }

    // ========================================================================
    // Compaction
    // ========================================================================

    /// Physically remove every version that is invisible from the current
    /// snapshot on
    ///
    /// Survivors are renumbered to start at [`INITIAL_SNAPSHOT`] and the
    /// counter is reset to it. Callers must exclude every reader that might
    /// still hold a handle or an older snapshot number. A pass with pending
    /// statuses would expose uncommitted entries, so it is refused.
    pub fn compact(&mut self) -> CompactionStats {
        if !self.pending.is_empty() {
            warn!(
                target: "quadmem::storage",
                pending = self.pending.len(),
                "Compaction skipped while a transaction has pending entries"
            );
            return CompactionStats {
                reclaimed: 0,
                retained: self.arena.len(),
            };
        }

        let current = self.current_snapshot;
        let doomed: Vec<StatementId> = self
            .arena
            .iter()
            .filter(|(_, record)| record.till <= current)
            .map(|(id, _)| id)
            .collect();

        let mut removed = FxHashSet::default();
        let mut affected = FxHashSet::default();
        for id in doomed {
            if let Some(record) = self.arena.remove(id) {
                affected.insert((record.subject, Position::Subject));
                affected.insert((record.predicate, Position::Predicate));
                affected.insert((record.object, Position::Object));
                if let Some(context) = record.context {
                    affected.insert((context, Position::Context));
                }
                removed.insert(id);
            }
        }
        self.interner.unlink_all(&affected, &removed);

        for (_, record) in self.arena.iter_mut() {
            record.since = INITIAL_SNAPSHOT;
        }
        self.current_snapshot = INITIAL_SNAPSHOT;

        CompactionStats {
            reclaimed: removed.len(),
            retained: self.arena.len(),
        }
    }

    /// Count of versions a compaction pass would remove
    pub fn reclaimable(&self) -> usize {
        let current = self.current_snapshot;
        self.arena.iter().filter(|(_, r)| r.till <= current).count()
    }
}

/// Shared statement store
///
/// Cheap to share behind an `Arc`; cursors keep their own `Arc` and take
/// the inner lock once per step.
#[derive(Debug, Default)]
pub struct StatementStore {
    state: RwLock<StoreState>,
}

impl StatementStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state for reading
    pub fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read()
    }

    /// Lock the state for writing
    pub fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write()
    }

    /// Last committed snapshot
    pub fn current_snapshot(&self) -> u64 {
        self.state.read().current_snapshot()
    }

    /// Open a cursor over `pattern` at `snapshot`
    ///
    /// Unknown terms produce an already-exhausted cursor.
    pub fn scan(
        self: &Arc<Self>,
        pattern: &StatementPattern,
        snapshot: u64,
        mode: ReadMode,
    ) -> StatementCursor {
        let plans = planner::plan(&self.state.read(), pattern);
        match plans {
            Some(plans) => StatementCursor::new(
                Arc::clone(self),
                plans,
                snapshot,
                mode,
                pattern.explicit_only,
            ),
            None => StatementCursor::empty(),
        }
    }

    /// Length of the candidate lists a scan of `pattern` would walk
    ///
    /// Used as a cardinality estimate; it over-counts by every version the
    /// filters would reject.
    pub fn count_candidates(&self, pattern: &StatementPattern) -> usize {
        let state = self.state.read();
        match planner::plan(&state, pattern) {
            Some(plans) => plans.iter().map(|plan| plan.driver_len(&state)).sum(),
            None => 0,
        }
    }
}
