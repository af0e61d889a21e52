//! Namespace prefix table
//!
//! Prefix → namespace IRI mappings kept alongside the statements. They are
//! not versioned and not part of any transaction: changes are visible to
//! every reader immediately.

use std::collections::BTreeMap;

use parking_lot::RwLock;

/// Thread-safe prefix table
#[derive(Debug, Default)]
pub struct NamespaceStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl NamespaceStore {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace bound to `prefix`
    pub fn get(&self, prefix: &str) -> Option<String> {
        self.entries.read().get(prefix).cloned()
    }

    /// Bind `prefix` to `namespace`, returning the previous binding
    pub fn set(&self, prefix: impl Into<String>, namespace: impl Into<String>) -> Option<String> {
        self.entries.write().insert(prefix.into(), namespace.into())
    }

    /// Remove the binding for `prefix`
    pub fn remove(&self, prefix: &str) -> Option<String> {
        self.entries.write().remove(prefix)
    }

    /// Remove every binding
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// All bindings, ordered by prefix
    pub fn list(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .iter()
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect()
    }

    /// Replace every binding at once (restore)
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (String, String)>) {
        *self.entries.write() = entries.into_iter().collect();
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if no prefix is bound
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
