//! quadmem - embeddable in-memory RDF quad store
//!
//! Statements are kept in memory and versioned by snapshot: every commit
//! publishes a new snapshot atomically, and readers keep seeing the snapshot
//! they started on. A store can optionally persist itself to a single data
//! file in a directory.
//!
//! # Quick Start
//!
//! ```ignore
//! use quadmem::{Quad, StatementPattern, Store, Term};
//!
//! let store = Store::in_memory()?;
//! let ex = |local: &str| Term::iri(format!("http://example.org/{}", local));
//!
//! store.transaction(|txn| {
//!     txn.add(&Quad::triple(ex("a"), ex("p"), ex("b")))?;
//!     Ok(())
//! })?;
//!
//! for statement in store.scan(&StatementPattern::any().with_subject(ex("a")))? {
//!     println!("{}", statement.quad);
//! }
//! ```
//!
//! # Architecture
//!
//! The [`Store`] facade lives in `quadmem-engine`; the layers below it
//! (storage, concurrency, durability) are available through the modules
//! re-exported here for callers that need the lower-level types.

pub use quadmem_engine::*;

/// Terms, statements and the error type
pub mod core {
    pub use quadmem_core::*;
}

/// Statement arena, interner and scan patterns
pub mod storage {
    pub use quadmem_storage::*;
}

/// Locks and the transaction manager
pub mod concurrency {
    pub use quadmem_concurrency::*;
}

/// Data file format
pub mod durability {
    pub use quadmem_durability::*;
}
