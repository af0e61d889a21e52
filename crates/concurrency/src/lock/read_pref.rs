//! Reader-preferring read/write lock
//!
//! Readers only wait while a writer holds the lock. A writer waits until
//! there is neither a writer nor any reader, re-checking after every wake,
//! so a steady stream of readers can hold a writer off indefinitely.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::guard::{GuardMode, ReadGuard, Unlock, WriteGuard};
use super::tracker::LockTracker;
use super::{LockError, LockPolicy, ReadWriteLockManager};

#[derive(Debug, Default)]
struct State {
    readers: usize,
    writer: bool,
    epoch: u64,
}

#[derive(Debug)]
struct Core {
    state: Mutex<State>,
    changed: Condvar,
}

impl Unlock for Core {
    fn unlock(&self, mode: GuardMode) {
        let mut state = self.state.lock();
        match mode {
            GuardMode::Read => {
                state.readers -= 1;
                if state.readers > 0 {
                    return;
                }
            }
            _ => state.writer = false,
        }
        drop(state);
        self.changed.notify_all();
    }
}

/// Read/write lock manager favouring readers
#[derive(Debug)]
pub struct ReadPreferringLock {
    alias: Arc<str>,
    core: Arc<Core>,
    tracker: Arc<LockTracker>,
}

impl ReadPreferringLock {
    /// Create a manager; `alias` names it in errors and in the tracker
    pub fn new(alias: impl Into<String>, tracker: Arc<LockTracker>) -> Self {
        Self {
            alias: Arc::from(alias.into()),
            core: Arc::new(Core {
                state: Mutex::new(State::default()),
                changed: Condvar::new(),
            }),
            tracker,
        }
    }

    /// Number of read guards currently held
    pub fn readers(&self) -> usize {
        self.core.state.lock().readers
    }

    fn interrupted(&self) -> LockError {
        LockError::Interrupted {
            alias: self.alias.to_string(),
        }
    }

    fn read_guard(&self) -> ReadGuard {
        let token = self.tracker.register(&self.alias, GuardMode::Read);
        ReadGuard::new(self.core.clone(), Arc::clone(&self.alias), token)
    }

    fn write_guard(&self) -> WriteGuard {
        let token = self.tracker.register(&self.alias, GuardMode::Write);
        WriteGuard::new(self.core.clone(), Arc::clone(&self.alias), token)
    }
}

impl ReadWriteLockManager for ReadPreferringLock {
    fn try_read(&self) -> Option<ReadGuard> {
        let mut state = self.core.state.lock();
        if state.writer {
            return None;
        }
        state.readers += 1;
        drop(state);
        Some(self.read_guard())
    }

    fn acquire_read(&self) -> Result<ReadGuard, LockError> {
        let mut state = self.core.state.lock();
        let epoch = state.epoch;
        while state.writer {
            self.core.changed.wait(&mut state);
            if state.epoch != epoch {
                return Err(self.interrupted());
            }
        }
        state.readers += 1;
        drop(state);
        Ok(self.read_guard())
    }

    fn try_write(&self) -> Option<WriteGuard> {
        let mut state = self.core.state.lock();
        if state.writer || state.readers > 0 {
            return None;
        }
        state.writer = true;
        drop(state);
        Some(self.write_guard())
    }

    fn acquire_write(&self) -> Result<WriteGuard, LockError> {
        let mut state = self.core.state.lock();
        let epoch = state.epoch;
        while state.writer || state.readers > 0 {
            self.core.changed.wait(&mut state);
            if state.epoch != epoch {
                return Err(self.interrupted());
            }
        }
        state.writer = true;
        drop(state);
        Ok(self.write_guard())
    }

    fn interrupt(&self) {
        let mut state = self.core.state.lock();
        state.epoch = state.epoch.wrapping_add(1);
        drop(state);
        self.core.changed.notify_all();
    }

    fn is_active(&self) -> bool {
        let state = self.core.state.lock();
        state.writer || state.readers > 0
    }

    fn policy(&self) -> LockPolicy {
        LockPolicy::ReadPreferring
    }
}
