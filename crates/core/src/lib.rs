//! Core types for quadmem
//!
//! This crate defines the foundational types used throughout the system:
//! - Term / Literal: RDF values
//! - ValueId / StatementId: handles into the interner and statement arena
//! - Quad / Statement: owned tuples and stored statement versions
//! - TxnStatus / ReadMode: transaction bookkeeping shared by storage and concurrency
//! - StoreChange: commit notification payload
//! - QuadError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;
pub mod value;

pub use error::{QuadError, Result};
pub use types::{
    Position, Quad, ReadMode, Statement, StatementId, StoreChange, TxnStatus, ValueId,
    INITIAL_SNAPSHOT, OPEN_SNAPSHOT,
};
pub use value::{Literal, Term, RDF_LANG_STRING, XSD_STRING};
