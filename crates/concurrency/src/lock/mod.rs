//! Lock managers
//!
//! Two kinds of coordination sit above the store's memory-safety lock:
//!
//! - [`ExclusiveLockManager`]: one holder at a time. Serializes
//!   transactions from `begin` through commit or rollback.
//! - [`ReadWriteLockManager`]: shared readers or one writer. Scans and
//!   transactions read; compaction writes. Two policies implement it:
//!   [`ReadPreferringLock`] and [`WritePreferringLock`].
//!
//! Every acquisition returns an owned guard that releases on drop or on an
//! explicit `release`. Blocking acquisitions can be cut short with
//! `interrupt`, which makes every thread currently waiting on that manager
//! return [`LockError::Interrupted`]. Guards already handed out are not
//! affected.
//!
//! With tracking enabled, guards register in a shared [`LockTracker`] so
//! that leaked guards can be listed and logged.

mod exclusive;
mod guard;
mod read_pref;
mod tracker;
mod write_pref;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use quadmem_core::QuadError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use exclusive::ExclusiveLockManager;
pub use guard::{ExclusiveGuard, GuardMode, ReadGuard, WriteGuard};
pub use read_pref::ReadPreferringLock;
pub use tracker::{LockTracker, OpenGuard};
pub use write_pref::WritePreferringLock;

/// Errors from blocking lock acquisition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The waiting thread was interrupted before obtaining the lock
    #[error("interrupted while waiting for {alias} lock")]
    Interrupted {
        /// Alias of the lock manager
        alias: String,
    },
}

impl From<LockError> for QuadError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Interrupted { alias } => QuadError::LockInterrupted { lock: alias },
        }
    }
}

/// Shared-read / exclusive-write lock manager
pub trait ReadWriteLockManager: Send + Sync + fmt::Debug {
    /// Take a read guard if it is available without waiting
    fn try_read(&self) -> Option<ReadGuard>;

    /// Wait for a read guard
    fn acquire_read(&self) -> Result<ReadGuard, LockError>;

    /// Take the write guard if it is available without waiting
    fn try_write(&self) -> Option<WriteGuard>;

    /// Wait for the write guard
    fn acquire_write(&self) -> Result<WriteGuard, LockError>;

    /// Wake every blocked acquirer with [`LockError::Interrupted`]
    fn interrupt(&self);

    /// Check whether any guard is currently held
    fn is_active(&self) -> bool;

    /// Policy this manager implements
    fn policy(&self) -> LockPolicy;
}

/// Fairness policy of a read/write lock manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockPolicy {
    /// Readers only wait for an active writer
    #[default]
    ReadPreferring,
    /// A waiting writer blocks newly arriving readers
    WritePreferring,
}

impl LockPolicy {
    /// Build a manager implementing this policy
    pub fn build(
        self,
        alias: impl Into<String>,
        tracker: Arc<LockTracker>,
    ) -> Arc<dyn ReadWriteLockManager> {
        match self {
            LockPolicy::ReadPreferring => Arc::new(ReadPreferringLock::new(alias, tracker)),
            LockPolicy::WritePreferring => Arc::new(WritePreferringLock::new(alias, tracker)),
        }
    }

    /// Name used in configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            LockPolicy::ReadPreferring => "read-preferring",
            LockPolicy::WritePreferring => "write-preferring",
        }
    }
}

impl fmt::Display for LockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockPolicy {
    type Err = QuadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-preferring" => Ok(LockPolicy::ReadPreferring),
            "write-preferring" => Ok(LockPolicy::WritePreferring),
            other => Err(QuadError::invalid_input(format!(
                "unknown lock policy '{}', expected read-preferring or write-preferring",
                other
            ))),
        }
    }
}
