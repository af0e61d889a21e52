//! Writer-preferring read/write lock
//!
//! As soon as a writer starts waiting, newly arriving readers queue behind
//! it; readers that already hold the lock finish normally. This keeps a
//! writer from starving under constant read load.
//!
//! A thread that already holds a read guard must not ask for a second one
//! while a writer may be waiting: the second request blocks behind the
//! writer, which in turn waits for the first guard.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::guard::{GuardMode, ReadGuard, Unlock, WriteGuard};
use super::tracker::LockTracker;
use super::{LockError, LockPolicy, ReadWriteLockManager};

#[derive(Debug, Default)]
struct State {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
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

/// Read/write lock manager favouring writers
#[derive(Debug)]
pub struct WritePreferringLock {
    alias: Arc<str>,
    core: Arc<Core>,
    tracker: Arc<LockTracker>,
}

impl WritePreferringLock {
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

    /// Number of writers blocked in `acquire_write`
    pub fn waiting_writers(&self) -> usize {
        self.core.state.lock().waiting_writers
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

impl ReadWriteLockManager for WritePreferringLock {
    fn try_read(&self) -> Option<ReadGuard> {
        let mut state = self.core.state.lock();
        if state.writer || state.waiting_writers > 0 {
            return None;
        }
        state.readers += 1;
        drop(state);
        Some(self.read_guard())
    }

    fn acquire_read(&self) -> Result<ReadGuard, LockError> {
        let mut state = self.core.state.lock();
        let epoch = state.epoch;
        while state.writer || state.waiting_writers > 0 {
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
        state.waiting_writers += 1;
        while state.writer || state.readers > 0 {
            self.core.changed.wait(&mut state);
            if state.epoch != epoch {
                state.waiting_writers -= 1;
                drop(state);
                // Readers parked behind this writer may proceed now
                self.core.changed.notify_all();
                return Err(self.interrupted());
            }
        }
        state.waiting_writers -= 1;
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
        LockPolicy::WritePreferring
    }
}
