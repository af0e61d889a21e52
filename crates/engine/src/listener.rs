//! Commit notifications
//!
//! Listeners hear about every commit that changed what readers see. They
//! run on the committing thread after all locks are released, so a
//! listener may call back into the store.

use std::sync::Arc;

use parking_lot::RwLock;
use quadmem_core::StoreChange;

/// Receives a notification after every commit that changed the store
pub trait StoreChangeListener: Send + Sync {
    /// Called once per committing transaction
    fn store_changed(&self, change: &StoreChange);
}

impl<F> StoreChangeListener for F
where
    F: Fn(&StoreChange) + Send + Sync,
{
    fn store_changed(&self, change: &StoreChange) {
        self(change)
    }
}

/// Registered listeners
#[derive(Default)]
pub(crate) struct ChangeListeners {
    listeners: RwLock<Vec<Arc<dyn StoreChangeListener>>>,
}

impl ChangeListeners {
    pub(crate) fn add(&self, listener: Arc<dyn StoreChangeListener>) {
        self.listeners.write().push(listener);
    }

    /// Returns whether `listener` was registered
    pub(crate) fn remove(&self, listener: &Arc<dyn StoreChangeListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `change` to every listener
    ///
    /// The registry lock is not held while listeners run.
    pub(crate) fn notify(&self, change: &StoreChange) {
        if change.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.store_changed(change);
        }
    }
}
