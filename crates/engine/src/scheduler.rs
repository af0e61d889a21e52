//! Debounced sync timer
//!
//! One `quadmem-sync` thread waits for a deadline. Every `schedule` pushes
//! the deadline out to `now + delay`; `cancel` clears it. When a deadline
//! passes the task runs once on the timer thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use quadmem_core::{QuadError, Result};

#[derive(Debug, Default)]
struct TimerState {
    deadline: Option<Instant>,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// Runs a task once the store has been quiet for `delay`
pub(crate) struct SyncScheduler {
    delay: Duration,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    /// Start the timer thread
    pub(crate) fn spawn<F>(delay: Duration, task: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("quadmem-sync".to_string())
            .spawn(move || timer_loop(&worker, task))
            .map_err(|e| QuadError::internal(format!("failed to spawn sync thread: {}", e)))?;
        Ok(Self {
            delay,
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Run the task `delay` from now, replacing any earlier deadline
    pub(crate) fn schedule(&self) {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return;
        }
        state.deadline = Some(Instant::now() + self.delay);
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Drop the pending deadline, if any
    pub(crate) fn cancel(&self) {
        self.shared.state.lock().deadline = None;
        self.shared.wake.notify_one();
    }

    #[cfg(test)]
    pub(crate) fn is_scheduled(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Stop the timer thread without running a pending task
    ///
    /// Safe to call from the timer thread itself; it is then not joined.
    pub(crate) fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.deadline = None;
        }
        self.shared.wake.notify_one();
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn timer_loop(shared: &Shared, task: impl Fn()) {
    loop {
        {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                match state.deadline {
                    None => shared.wake.wait(&mut state),
                    Some(deadline) if Instant::now() >= deadline => {
                        state.deadline = None;
                        break;
                    }
                    Some(deadline) => {
                        shared.wake.wait_until(&mut state, deadline);
                    }
                }
            }
        }
        task();
    }
}
