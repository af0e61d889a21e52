//! Error types for quadmem
//!
//! This module defines the error type shared by every layer.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Lower layers keep their own narrow error enums (lock interruption, dump
//! file validation) and convert into [`QuadError`] at the crate boundary.

use std::io;
use thiserror::Error;

/// Result type alias for quadmem operations
pub type Result<T> = std::result::Result<T, QuadError>;

/// Error types for the quad store
#[derive(Debug, Error)]
pub enum QuadError {
    /// I/O error (data file, lock file, config file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Persisted data failed validation
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Caller supplied an argument the store cannot accept
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store has been shut down
    #[error("Store has been shut down")]
    ShutDown,

    /// The store's data directory is locked by another process
    #[error("Store is read-only: {0}")]
    ReadOnly(String),

    /// A transactional operation was attempted without an active transaction
    #[error("Transaction not active: {0}")]
    TransactionNotActive(String),

    /// A thread blocked on a lock was interrupted
    #[error("Interrupted while waiting for {lock} lock")]
    LockInterrupted {
        /// Alias of the lock manager that was being waited on
        lock: String,
    },

    /// Internal invariant violated
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuadError {
    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        QuadError::InvalidInput(msg.into())
    }

    /// Create a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        QuadError::Corruption(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        QuadError::Internal(msg.into())
    }

    /// Check whether retrying the same call could succeed
    ///
    /// Only lock interruption is transient; usage errors and persisted data
    /// problems fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuadError::LockInterrupted { .. })
    }
}
