//! Concurrency layer for quadmem
//!
//! This crate implements snapshot MVCC on top of the statement store:
//! - Lock managers: exclusive transaction lock and read/write structural
//!   lock with reader- and writer-preferring policies
//! - Transaction: provisional adds/removes driven through the status state
//!   machine, then stamped with snapshot bounds on commit or rollback
//! - TransactionManager: one transaction at a time
//! - GuardedCursor: scans that hold compaction off
//!
//! Exactly one transaction runs at a time. Readers never take the
//! transaction lock; they only share the structural lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod lock;
pub mod manager;
pub mod status;
pub mod transaction;

pub use cursor::GuardedCursor;
pub use lock::{
    ExclusiveGuard, ExclusiveLockManager, GuardMode, LockError, LockPolicy, LockTracker,
    OpenGuard, ReadGuard, ReadPreferringLock, ReadWriteLockManager, WriteGuard,
    WritePreferringLock,
};
pub use manager::{TransactionManager, STRUCTURAL_LOCK_ALIAS, TXN_LOCK_ALIAS};
pub use transaction::{
    finalize_commit, finalize_rollback, CommitOutcome, RollbackOutcome, Transaction,
    TransactionObserver,
};
