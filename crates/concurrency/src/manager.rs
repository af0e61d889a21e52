//! Transaction manager
//!
//! Hands out [`Transaction`]s one at a time. `begin` takes, in order:
//! 1. a read guard on the structural lock, so compaction cannot run while
//!    provisional entries exist
//! 2. the exclusive transaction lock, held until commit or rollback
//!
//! Both acquisitions block and can be interrupted by [`close`].
//!
//! [`close`]: TransactionManager::close

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use quadmem_core::{QuadError, Result};
use quadmem_storage::StatementStore;
use tracing::debug;

use crate::lock::{ExclusiveLockManager, LockTracker, ReadWriteLockManager};
use crate::transaction::{Transaction, TransactionObserver};

/// Alias of the exclusive transaction lock
pub const TXN_LOCK_ALIAS: &str = "txn";

/// Alias of the structural read/write lock
pub const STRUCTURAL_LOCK_ALIAS: &str = "statements";

/// Serializes transactions over one statement store
pub struct TransactionManager {
    store: Arc<StatementStore>,
    txn_lock: ExclusiveLockManager,
    structural: Arc<dyn ReadWriteLockManager>,
    observer: Option<Weak<dyn TransactionObserver>>,
    closed: Arc<AtomicBool>,
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("structural", &self.structural.policy())
            .field("active", &self.txn_lock.is_active())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl TransactionManager {
    /// Create a manager over `store`, sharing `structural` with compaction
    pub fn new(
        store: Arc<StatementStore>,
        structural: Arc<dyn ReadWriteLockManager>,
        tracker: Arc<LockTracker>,
    ) -> Self {
        Self {
            store,
            txn_lock: ExclusiveLockManager::new(TXN_LOCK_ALIAS, tracker),
            structural,
            observer: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Notify `observer` after every commit and rollback
    pub fn with_observer(mut self, observer: Weak<dyn TransactionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The statement store transactions write to
    pub fn store(&self) -> &Arc<StatementStore> {
        &self.store
    }

    /// The structural lock shared with readers and compaction
    pub fn structural_lock(&self) -> &Arc<dyn ReadWriteLockManager> {
        &self.structural
    }

    /// Check whether a transaction is in flight
    pub fn is_transaction_active(&self) -> bool {
        self.txn_lock.is_active()
    }

    /// Check whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Start a transaction, waiting for the current one to finish
    ///
    /// The structural read guard is held until the transaction ends. With a
    /// writer-preferring structural lock, the calling thread must not
    /// already hold another guard on it.
    ///
    /// # Errors
    /// - `ShutDown` if the manager is closed
    /// - `LockInterrupted` if the wait was interrupted
    pub fn begin(&self) -> Result<Transaction> {
        if self.is_closed() {
            return Err(QuadError::ShutDown);
        }
        let structural = self.structural.acquire_read()?;
        let exclusive = self.txn_lock.acquire()?;
        if self.is_closed() {
            return Err(QuadError::ShutDown);
        }
        let txn = Transaction::new(
            Arc::clone(&self.store),
            structural,
            exclusive,
            Arc::clone(&self.closed),
            self.observer.clone(),
        );
        debug!(target: "quadmem::txn", snapshot = txn.snapshot(), "Transaction started");
        Ok(txn)
    }

    /// Refuse new transactions and wake every blocked `begin`
    ///
    /// An open transaction can no longer write or commit; dropping it rolls
    /// it back.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.txn_lock.interrupt();
        self.structural.interrupt();
    }
}
