//! Statement arena
//!
//! Every statement version lives in one slot of a growable table and is
//! addressed by a [`StatementId`]. Versions are appended, never mutated in
//! their terms or flag once visible, and leave the table only through
//! [`StatementArena::remove`], which the compaction pass calls under the
//! structural write lock. Freed slots are recycled.

use quadmem_core::{StatementId, ValueId, OPEN_SNAPSHOT};

/// One stored statement version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRecord {
    /// Interned subject
    pub subject: ValueId,
    /// Interned predicate
    pub predicate: ValueId,
    /// Interned object
    pub object: ValueId,
    /// Interned context, `None` for the default graph
    pub context: Option<ValueId>,
    /// Asserted (true) or inferred (false)
    pub explicit: bool,
    /// First snapshot this version is visible in
    pub since: u64,
    /// First snapshot this version is no longer visible in
    pub till: u64,
}

impl StatementRecord {
    /// Create an open-ended version starting at `since`
    pub fn new(
        subject: ValueId,
        predicate: ValueId,
        object: ValueId,
        context: Option<ValueId>,
        explicit: bool,
        since: u64,
    ) -> Self {
        Self {
            subject,
            predicate,
            object,
            context,
            explicit,
            since,
            till: OPEN_SNAPSHOT,
        }
    }

    /// Check whether this version is visible in `snapshot`
    #[inline]
    pub fn is_visible_at(&self, snapshot: u64) -> bool {
        self.since <= snapshot && snapshot < self.till
    }

    /// Check whether this version has the given terms
    #[inline]
    pub fn has_terms(
        &self,
        subject: ValueId,
        predicate: ValueId,
        object: ValueId,
        context: Option<ValueId>,
    ) -> bool {
        self.subject == subject
            && self.predicate == predicate
            && self.object == object
            && self.context == context
    }
}

/// Slot table of statement versions
#[derive(Debug, Default)]
pub struct StatementArena {
    slots: Vec<Option<StatementRecord>>,
    free: Vec<u32>,
    live: usize,
}

impl StatementArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions (visible or not)
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if the arena holds no versions
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots, including free ones
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store a version, reusing a free slot if one exists
    pub fn insert(&mut self, record: StatementRecord) -> StatementId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(record);
                StatementId::new(index)
            }
            None => {
                self.slots.push(Some(record));
                StatementId::new((self.slots.len() - 1) as u32)
            }
        }
    }

    /// Get a version by handle
    #[inline]
    pub fn get(&self, id: StatementId) -> Option<&StatementRecord> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Get a mutable version by handle
    #[inline]
    pub fn get_mut(&mut self, id: StatementId) -> Option<&mut StatementRecord> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Get the version stored in slot `index`, if the slot is occupied
    #[inline]
    pub fn slot(&self, index: usize) -> Option<(StatementId, &StatementRecord)> {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .map(|record| (StatementId::new(index as u32), record))
    }

    /// Free a slot, invalidating its handle
    pub fn remove(&mut self, id: StatementId) -> Option<StatementRecord> {
        let record = self.slots.get_mut(id.index())?.take()?;
        self.free.push(id.index() as u32);
        self.live -= 1;
        Some(record)
    }

    /// Iterate over occupied slots in slot order
    pub fn iter(&self) -> impl Iterator<Item = (StatementId, &StatementRecord)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (StatementId::new(i as u32), r)))
    }

    /// Iterate mutably over occupied slots
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (StatementId, &mut StatementRecord)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|r| (StatementId::new(i as u32), r)))
    }
}
