//! Data file errors

use std::io;

use quadmem_core::QuadError;
use thiserror::Error;

use crate::format::ImageHeaderError;

/// Errors from reading or writing the data file
#[derive(Debug, Error)]
pub enum ImageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File too small to hold a header and footer
    #[error("Data file too small: {size} bytes")]
    FileTooSmall {
        /// Actual file size
        size: u64,
    },

    /// Header failed validation
    #[error("Invalid header: {0}")]
    Header(#[from] ImageHeaderError),

    /// Body length in the header disagrees with the file size
    #[error("Body length mismatch: header says {expected} bytes, file holds {actual}")]
    LengthMismatch {
        /// Length recorded in the header
        expected: u64,
        /// Length available in the file
        actual: u64,
    },

    /// Footer checksum mismatch
    #[error("CRC mismatch: stored {stored:08x}, computed {computed:08x}")]
    CrcMismatch {
        /// CRC stored in the footer
        stored: u32,
        /// CRC computed over header and body
        computed: u32,
    },

    /// Body could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<ImageError> for QuadError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::Io(io) => QuadError::Io(io),
            ImageError::Encode(msg) | ImageError::Decode(msg) => QuadError::Serialization(msg),
            other => QuadError::Corruption(other.to_string()),
        }
    }
}
