//! Core types for quadmem
//!
//! This module defines the foundational types:
//! - ValueId / StatementId: integer handles into the interner and the arena
//! - Position: the four places a value can occupy in a statement
//! - Quad: an owned (subject, predicate, object, context) tuple
//! - Statement: a stored statement version as returned to callers
//! - TxnStatus: pending status of an entry inside the active transaction
//! - ReadMode: how a scan treats pending statuses
//! - StoreChange: the coarse change notification emitted after commit

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Term;

/// Snapshot number the store starts at, and resets to after compaction
pub const INITIAL_SNAPSHOT: u64 = 1;

/// `till` value of a statement version that has not been deprecated
pub const OPEN_SNAPSHOT: u64 = u64::MAX;

/// Handle to an interned value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(u32);

impl ValueId {
    /// Create a handle from a raw slot index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw slot index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Handle to a statement version in the arena
///
/// Handles are slot indexes. A slot freed by compaction may be reused for a
/// later statement, so a handle is only meaningful while the caller holds
/// the structural read lock it was obtained under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatementId(u32);

impl StatementId {
    /// Create a handle from a raw slot index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw slot index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Position of a value within a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Subject position
    Subject,
    /// Predicate position
    Predicate,
    /// Object position
    Object,
    /// Context (named graph) position
    Context,
}

impl Position {
    /// All four positions, in statement order
    pub const ALL: [Position; 4] = [
        Position::Subject,
        Position::Predicate,
        Position::Object,
        Position::Context,
    ];

    /// Index of this position in `ALL`
    pub const fn slot(self) -> usize {
        match self {
            Position::Subject => 0,
            Position::Predicate => 1,
            Position::Object => 2,
            Position::Context => 3,
        }
    }
}

/// An owned subject-predicate-object tuple with optional context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    /// Subject (IRI or blank node)
    pub subject: Term,
    /// Predicate (IRI)
    pub predicate: Term,
    /// Object (any term)
    pub object: Term,
    /// Context, `None` for the default graph
    pub context: Option<Term>,
}

impl Quad {
    /// Create a quad
    pub fn new(subject: Term, predicate: Term, object: Term, context: Option<Term>) -> Self {
        Self {
            subject,
            predicate,
            object,
            context,
        }
    }

    /// Create a triple in the default graph
    pub fn triple(subject: Term, predicate: Term, object: Term) -> Self {
        Self::new(subject, predicate, object, None)
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(ctx) = &self.context {
            write!(f, " {}", ctx)?;
        }
        write!(f, " .")
    }
}

/// A statement version as seen by a reader
///
/// This is a detached copy: holding a `Statement` does not pin anything in
/// the store. `since`/`till` are the values at the time the statement was
/// read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Arena handle of this version
    pub id: StatementId,
    /// The statement's terms
    pub quad: Quad,
    /// Asserted by a caller (true) or derived by inference (false)
    pub explicit: bool,
    /// First snapshot this version is visible in
    pub since: u64,
    /// First snapshot this version is no longer visible in
    pub till: u64,
}

impl Statement {
    /// Check whether this version is visible in `snapshot`
    pub fn is_visible_at(&self, snapshot: u64) -> bool {
        self.since <= snapshot && snapshot < self.till
    }

    /// Subject term
    pub fn subject(&self) -> &Term {
        &self.quad.subject
    }

    /// Predicate term
    pub fn predicate(&self) -> &Term {
        &self.quad.predicate
    }

    /// Object term
    pub fn object(&self) -> &Term {
        &self.quad.object
    }

    /// Context term, `None` for the default graph
    pub fn context(&self) -> Option<&Term> {
        self.quad.context.as_ref()
    }
}

/// Pending status of an arena entry within the active transaction
///
/// Entries not touched by the active transaction are `Neutral`. Every other
/// status is resolved to a final, snapshot-stamped form by commit or
/// rollback and then dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnStatus {
    /// Committed and unaffected by this transaction
    Neutral,
    /// Added by this transaction
    New,
    /// Committed entry removed by this transaction
    Deprecated,
    /// Added and removed again by this transaction, never visible
    Zombie,
    /// Inferred entry being upgraded to explicit
    Explicit,
    /// Explicit entry being downgraded to inferred
    Inferred,
}

impl TxnStatus {
    /// Check if the status hides the entry from the transaction's own view
    pub fn is_removed(self) -> bool {
        matches!(self, TxnStatus::Deprecated | TxnStatus::Zombie)
    }
}

/// How a scan treats pending transaction statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Only the snapshot visibility range matters
    #[default]
    Committed,
    /// Pretend the active transaction has already committed
    Transaction,
    /// Ignore pending status entirely (duplicate detection)
    Raw,
}

/// Coarse change notification emitted after a commit
///
/// Listeners learn *whether* statements were added or removed, not which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreChange {
    /// At least one statement became visible
    pub statements_added: bool,
    /// At least one statement stopped being visible
    pub statements_removed: bool,
}

impl StoreChange {
    /// Check if the change carries any information
    pub fn is_empty(&self) -> bool {
        !self.statements_added && !self.statements_removed
    }
}
