//! Storage layer for quadmem
//!
//! This crate implements the in-memory statement index:
//! - ValueInterner: one canonical id per term, with per-position
//!   back-references to the statements using it
//! - StatementArena: slot table of every statement version
//! - StoreState / StatementStore: arena + interner + pending statuses +
//!   snapshot counter behind a memory-safety `RwLock`
//! - StatementPattern / StatementCursor: planned, lazy pattern scans
//! - NamespaceStore: prefix table
//!
//! Nothing here decides *when* a writer may run; see `quadmem-concurrency`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod cursor;
pub mod interner;
pub mod namespace;
pub mod planner;
pub mod store;

pub use arena::{StatementArena, StatementRecord};
pub use cursor::StatementCursor;
pub use interner::{InternedValue, ValueInterner};
pub use namespace::NamespaceStore;
pub use planner::StatementPattern;
pub use store::{CompactionStats, StatementStore, StoreState};
