//! Cursors that keep compaction away
//!
//! A [`GuardedCursor`] pairs a storage cursor with a shared structural read
//! guard. While any guarded cursor is open the compaction pass cannot take
//! the write side of the structural lock, so the cursor's snapshot and its
//! candidate positions stay valid.

use std::sync::Arc;

use quadmem_core::Statement;
use quadmem_storage::StatementCursor;

use crate::lock::ReadGuard;

/// Statement cursor holding a structural read guard
#[derive(Debug)]
pub struct GuardedCursor {
    cursor: StatementCursor,
    guard: Option<Arc<ReadGuard>>,
}

impl GuardedCursor {
    /// Attach `guard` to `cursor` for the cursor's lifetime
    pub fn new(cursor: StatementCursor, guard: Arc<ReadGuard>) -> Self {
        let guard = if cursor.is_closed() { None } else { Some(guard) };
        Self { cursor, guard }
    }

    /// Snapshot the cursor reads
    pub fn snapshot(&self) -> u64 {
        self.cursor.snapshot()
    }

    /// Check if the cursor was closed or ran out
    pub fn is_closed(&self) -> bool {
        self.guard.is_none()
    }

    /// Stop the scan and give up the structural guard
    ///
    /// Closing twice is harmless.
    pub fn close(&mut self) {
        self.cursor.close();
        self.guard = None;
    }
}

impl Iterator for GuardedCursor {
    type Item = Statement;

    fn next(&mut self) -> Option<Statement> {
        let next = self.cursor.next();
        if next.is_none() {
            self.guard = None;
        }
        next
    }
}
