//! Shared helpers for the root integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

pub use quadmem::{Quad, Statement, StatementPattern, Store, StoreConfig, Term};
use tempfile::TempDir;

/// Route store logs to the test harness output; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("quadmem=debug")
        .with_test_writer()
        .try_init();
}

/// IRI in the test namespace
pub fn ex(local: &str) -> Term {
    Term::iri(format!("http://example.org/{}", local))
}

/// Triple with IRI terms in the test namespace
pub fn triple(s: &str, p: &str, o: &str) -> Quad {
    Quad::triple(ex(s), ex(p), ex(o))
}

/// Quads of a scan, ignoring flags and version bookkeeping
pub fn quads<I: IntoIterator<Item = Statement>>(statements: I) -> BTreeSet<String> {
    statements
        .into_iter()
        .map(|st| st.quad.to_string())
        .collect()
}

/// Persistent store in a fresh temporary directory
pub struct TestStore {
    pub store: Arc<Store>,
    pub dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        init_tracing();
        let dir = TempDir::new().expect("tempdir");
        let store = Store::open_with_config(dir.path(), config).expect("open store");
        Self { store, dir }
    }

    /// Shut the store down and open the same directory again
    pub fn reopen(&mut self) {
        self.store.shutdown().expect("shutdown");
        self.store = Store::open(self.dir.path()).expect("reopen store");
    }
}
