//! Store engine for quadmem
//!
//! This crate assembles the lower layers into the public [`Store`]:
//! - Store: transactions, scans, read views, namespaces, persistence
//! - StoreConfig: `quadmem.toml` settings
//! - Janitor: background compaction of obsolete versions
//! - SyncScheduler: debounced writes of the data file
//! - StoreChangeListener: commit notifications

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
mod janitor;
pub mod listener;
pub mod store;
mod scheduler;
pub mod view;

pub use config::{StoreConfig, SyncMode, CONFIG_FILE_NAME};
pub use listener::StoreChangeListener;
pub use store::{Store, LOCK_FILE_NAME};
pub use view::ReadView;

pub use quadmem_concurrency::{
    CommitOutcome, GuardedCursor, LockPolicy, OpenGuard, RollbackOutcome, Transaction,
};
pub use quadmem_core::{
    Literal, Quad, QuadError, Result, Statement, StoreChange, Term, INITIAL_SNAPSHOT,
};
pub use quadmem_durability::ImageInfo;
pub use quadmem_storage::{CompactionStats, StatementPattern};
