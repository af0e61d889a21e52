//! Value interner
//!
//! Maps every distinct [`Term`] to a single [`ValueId`] and keeps, for each
//! interned value, the four back-reference lists that the scan planner uses
//! as candidate lists:
//! - statements using the value as subject
//! - statements using the value as predicate
//! - statements using the value as object
//! - statements using the value as context
//!
//! Lists hold arena handles, never statement data, so the interner and the
//! arena reference each other only by integer id.
//!
//! Values are never removed. A store that churns through many distinct
//! terms grows this table for its whole lifetime.

use quadmem_core::{Position, QuadError, Result, StatementId, Term, ValueId};
use rustc_hash::{FxHashMap, FxHashSet};

/// One interned value and its back-references
#[derive(Debug)]
pub struct InternedValue {
    term: Term,
    refs: [Vec<StatementId>; 4],
}

impl InternedValue {
    fn new(term: Term) -> Self {
        Self {
            term,
            refs: Default::default(),
        }
    }

    /// The canonical term
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// Statements referencing this value in `position`
    pub fn refs(&self, position: Position) -> &[StatementId] {
        &self.refs[position.slot()]
    }
}

/// Deduplicating term table with per-position back-references
#[derive(Debug, Default)]
pub struct ValueInterner {
    ids: FxHashMap<Term, ValueId>,
    values: Vec<InternedValue>,
}

impl ValueInterner {
    /// Create an empty interner
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing has been interned
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Intern a resource (IRI or blank node)
    ///
    /// # Errors
    /// Returns `InvalidInput` if `term` is a literal.
    pub fn intern_resource(&mut self, term: &Term) -> Result<ValueId> {
        if !term.is_resource() {
            return Err(QuadError::invalid_input(format!(
                "expected a resource, got {} {}",
                term.kind_name(),
                term
            )));
        }
        Ok(self.intern(term))
    }

    /// Intern a literal
    ///
    /// # Errors
    /// Returns `InvalidInput` if `term` is not a literal.
    pub fn intern_literal(&mut self, term: &Term) -> Result<ValueId> {
        if !term.is_literal() {
            return Err(QuadError::invalid_input(format!(
                "expected a literal, got {} {}",
                term.kind_name(),
                term
            )));
        }
        Ok(self.intern(term))
    }

    /// Intern any term, returning the existing id if already present
    pub fn intern(&mut self, term: &Term) -> ValueId {
        if let Some(id) = self.ids.get(term) {
            return *id;
        }
        let id = ValueId::new(self.values.len() as u32);
        self.values.push(InternedValue::new(term.clone()));
        self.ids.insert(term.clone(), id);
        id
    }

    /// Look up a term without creating it
    pub fn lookup(&self, term: &Term) -> Option<ValueId> {
        self.ids.get(term).copied()
    }

    /// Look up a resource without creating it; literals never match
    pub fn lookup_resource(&self, term: &Term) -> Option<ValueId> {
        if term.is_resource() {
            self.lookup(term)
        } else {
            None
        }
    }

    /// Look up a literal without creating it; resources never match
    pub fn lookup_literal(&self, term: &Term) -> Option<ValueId> {
        if term.is_literal() {
            self.lookup(term)
        } else {
            None
        }
    }

    /// Get the interned value for an id
    ///
    /// # Panics
    /// Panics if `id` was not produced by this interner.
    pub fn value(&self, id: ValueId) -> &InternedValue {
        &self.values[id.index()]
    }

    /// Get the canonical term for an id
    pub fn term(&self, id: ValueId) -> &Term {
        self.value(id).term()
    }

    /// Statements referencing `id` in `position`
    pub fn refs(&self, id: ValueId, position: Position) -> &[StatementId] {
        self.value(id).refs(position)
    }

    /// Iterate over all interned resources
    pub fn resources(&self) -> impl Iterator<Item = (ValueId, &Term)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.term.is_resource())
            .map(|(i, v)| (ValueId::new(i as u32), &v.term))
    }

    pub(crate) fn link(&mut self, id: ValueId, position: Position, statement: StatementId) {
        self.values[id.index()].refs[position.slot()].push(statement);
    }

    /// Drop every reference to a statement in `removed` from the lists of
    /// the `affected` values
    ///
    /// Relative order of the surviving handles is preserved.
    pub(crate) fn unlink_all(
        &mut self,
        affected: &FxHashSet<(ValueId, Position)>,
        removed: &FxHashSet<StatementId>,
    ) {
        for (id, position) in affected {
            self.values[id.index()].refs[position.slot()].retain(|st| !removed.contains(st));
        }
    }
}
