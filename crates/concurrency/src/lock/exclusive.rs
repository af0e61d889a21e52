//! Exclusive lock manager
//!
//! At most one guard exists at a time. Waiters block on a condition
//! variable and are woken one by one as guards are released.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::guard::{ExclusiveGuard, GuardMode, Unlock};
use super::tracker::LockTracker;
use super::LockError;

#[derive(Debug, Default)]
struct ExclusiveState {
    held: bool,
    /// Bumped by `interrupt`; waiters that see it change give up
    epoch: u64,
}

#[derive(Debug)]
struct ExclusiveCore {
    state: Mutex<ExclusiveState>,
    released: Condvar,
}

impl Unlock for ExclusiveCore {
    fn unlock(&self, _mode: GuardMode) {
        let mut state = self.state.lock();
        state.held = false;
        drop(state);
        self.released.notify_one();
    }
}

/// Single-holder lock with interruptible waits
#[derive(Debug)]
pub struct ExclusiveLockManager {
    alias: Arc<str>,
    core: Arc<ExclusiveCore>,
    tracker: Arc<LockTracker>,
}

impl ExclusiveLockManager {
    /// Create a manager; `alias` names it in errors and in the tracker
    pub fn new(alias: impl Into<String>, tracker: Arc<LockTracker>) -> Self {
        Self {
            alias: Arc::from(alias.into()),
            core: Arc::new(ExclusiveCore {
                state: Mutex::new(ExclusiveState::default()),
                released: Condvar::new(),
            }),
            tracker,
        }
    }

    /// Alias of this manager
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Take the lock if nobody holds it
    pub fn try_acquire(&self) -> Option<ExclusiveGuard> {
        let mut state = self.core.state.lock();
        if state.held {
            return None;
        }
        state.held = true;
        drop(state);
        Some(self.guard())
    }

    /// Wait until the lock is free and take it
    ///
    /// # Errors
    /// [`LockError::Interrupted`] if [`interrupt`](Self::interrupt) is
    /// called while waiting.
    pub fn acquire(&self) -> Result<ExclusiveGuard, LockError> {
        let mut state = self.core.state.lock();
        let epoch = state.epoch;
        while state.held {
            self.core.released.wait(&mut state);
            if state.epoch != epoch {
                return Err(LockError::Interrupted {
                    alias: self.alias.to_string(),
                });
            }
        }
        state.held = true;
        drop(state);
        Ok(self.guard())
    }

    /// Wake every waiting `acquire` with an error
    pub fn interrupt(&self) {
        let mut state = self.core.state.lock();
        state.epoch = state.epoch.wrapping_add(1);
        drop(state);
        self.core.released.notify_all();
    }

    /// Check whether the lock is held
    pub fn is_active(&self) -> bool {
        self.core.state.lock().held
    }

    fn guard(&self) -> ExclusiveGuard {
        let token = self.tracker.register(&self.alias, GuardMode::Exclusive);
        ExclusiveGuard::new(self.core.clone(), Arc::clone(&self.alias), token)
    }
}
