//! Owned lock guards
//!
//! Guards own an `Arc` to the lock core they came from, so they can be
//! moved across threads and outlive the borrow of the manager. A guard
//! releases exactly once: on [`release`](ReadGuard::release) or on drop,
//! whichever comes first.

use std::fmt;
use std::sync::Arc;

use super::tracker::TrackToken;

/// How a guard holds its lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardMode {
    /// Shared read access
    Read,
    /// Exclusive write access on a read/write lock
    Write,
    /// Sole holder of an exclusive lock
    Exclusive,
}

/// Lock core a guard gives back to
pub(crate) trait Unlock: Send + Sync {
    fn unlock(&self, mode: GuardMode);
}

struct Held {
    lock: Arc<dyn Unlock>,
    mode: GuardMode,
    alias: Arc<str>,
    token: Option<TrackToken>,
    released: bool,
}

impl Held {
    fn new(lock: Arc<dyn Unlock>, mode: GuardMode, alias: Arc<str>, token: Option<TrackToken>) -> Self {
        Self {
            lock,
            mode,
            alias,
            token,
            released: false,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.lock.unlock(self.mode);
            self.token = None;
        }
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Held {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("alias", &self.alias)
            .field("mode", &self.mode)
            .field("released", &self.released)
            .finish()
    }
}

macro_rules! guard_type {
    ($(#[$doc:meta])* $name:ident, $mode:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        #[must_use = "the lock is released as soon as the guard is dropped"]
        pub struct $name(Held);

        impl $name {
            pub(crate) fn new(
                lock: Arc<dyn Unlock>,
                alias: Arc<str>,
                token: Option<TrackToken>,
            ) -> Self {
                Self(Held::new(lock, $mode, alias, token))
            }

            /// Alias of the lock this guard holds
            pub fn alias(&self) -> &str {
                &self.0.alias
            }

            /// Release the lock now
            pub fn release(mut self) {
                self.0.release();
            }
        }
    };
}

guard_type!(
    /// Shared read access to a [`ReadWriteLockManager`](super::ReadWriteLockManager)
    ReadGuard,
    GuardMode::Read
);

guard_type!(
    /// Exclusive write access to a [`ReadWriteLockManager`](super::ReadWriteLockManager)
    WriteGuard,
    GuardMode::Write
);

guard_type!(
    /// Ownership of an [`ExclusiveLockManager`](super::ExclusiveLockManager)
    ExclusiveGuard,
    GuardMode::Exclusive
);
