//! Store image file format
//!
//! The whole store is dumped into a single file, `quadmem.data`, rewritten
//! in full on every sync.
//!
//! # File Structure
//!
//! ```text
//! +------------------+ 0
//! | ImageHeader      | 32 bytes
//! +------------------+ 32
//! | Body             | header.body_len bytes (MessagePack)
//! +------------------+
//! | Footer CRC32     | 4 bytes, over header + body
//! +------------------+
//! ```
//!
//! All integers are little-endian.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};

/// Magic bytes: "QMSF"
pub const IMAGE_MAGIC: [u8; 4] = *b"QMSF";

/// Image format version for forward compatibility
pub const IMAGE_FORMAT_VERSION: u32 = 1;

/// Image header size in bytes
pub const IMAGE_HEADER_SIZE: usize = 32;

/// Footer size in bytes
pub const IMAGE_FOOTER_SIZE: usize = 4;

/// Name of the data file inside the data directory
pub const DATA_FILE_NAME: &str = "quadmem.data";

/// Name of the temporary file a sync writes before renaming
pub const SYNC_FILE_NAME: &str = "quadmem.sync";

/// Path of the data file in `dir`
pub fn data_path(dir: &Path) -> PathBuf {
    dir.join(DATA_FILE_NAME)
}

/// Path of the temporary sync file in `dir`
pub fn sync_path(dir: &Path) -> PathBuf {
    dir.join(SYNC_FILE_NAME)
}

/// Image header (32 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    /// Magic bytes: "QMSF"
    pub magic: [u8; 4],
    /// Format version
    pub format_version: u32,
    /// Creation timestamp (microseconds since epoch)
    pub created_at: u64,
    /// Snapshot the image was taken at
    pub snapshot: u64,
    /// Length of the body in bytes
    pub body_len: u64,
}

impl ImageHeader {
    /// Create a header for the current format version
    pub fn new(snapshot: u64, created_at: u64, body_len: u64) -> Self {
        Self {
            magic: IMAGE_MAGIC,
            format_version: IMAGE_FORMAT_VERSION,
            created_at,
            snapshot,
            body_len,
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; IMAGE_HEADER_SIZE] {
        let mut bytes = [0u8; IMAGE_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        LittleEndian::write_u32(&mut bytes[4..8], self.format_version);
        LittleEndian::write_u64(&mut bytes[8..16], self.created_at);
        LittleEndian::write_u64(&mut bytes[16..24], self.snapshot);
        LittleEndian::write_u64(&mut bytes[24..32], self.body_len);
        bytes
    }

    /// Parse header from bytes
    pub fn from_bytes(bytes: &[u8; IMAGE_HEADER_SIZE]) -> Self {
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            format_version: LittleEndian::read_u32(&bytes[4..8]),
            created_at: LittleEndian::read_u64(&bytes[8..16]),
            snapshot: LittleEndian::read_u64(&bytes[16..24]),
            body_len: LittleEndian::read_u64(&bytes[24..32]),
        }
    }

    /// Read a header from a stream
    pub fn read_from(input: &mut impl Read) -> io::Result<Self> {
        let mut bytes = [0u8; IMAGE_HEADER_SIZE];
        input.read_exact(&mut bytes)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Validate the header
    pub fn validate(&self) -> Result<(), ImageHeaderError> {
        if self.magic != IMAGE_MAGIC {
            return Err(ImageHeaderError::InvalidMagic {
                expected: IMAGE_MAGIC,
                actual: self.magic,
            });
        }
        if self.format_version > IMAGE_FORMAT_VERSION {
            return Err(ImageHeaderError::UnsupportedVersion {
                version: self.format_version,
                max_supported: IMAGE_FORMAT_VERSION,
            });
        }
        Ok(())
    }
}

/// Errors that can occur when validating an image header
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageHeaderError {
    /// Invalid magic bytes
    #[error("Invalid magic bytes: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// Expected magic bytes
        expected: [u8; 4],
        /// Actual magic bytes found
        actual: [u8; 4],
    },
    /// Unsupported format version
    #[error("Unsupported image version {version}, max supported is {max_supported}")]
    UnsupportedVersion {
        /// Version found in the file
        version: u32,
        /// Maximum supported version
        max_supported: u32,
    },
}
