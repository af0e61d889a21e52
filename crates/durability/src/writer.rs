//! Crash-safe data file writer
//!
//! Uses the write-fsync-rename pattern:
//! 1. Write header, body and footer CRC to `quadmem.sync`
//! 2. fsync the sync file
//! 3. Atomic rename to `quadmem.data`
//! 4. fsync the data directory
//!
//! Either the previous data file or the complete new one is visible after a
//! crash, never a partial write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::ImageError;
use crate::format::{data_path, sync_path, ImageHeader};
use crate::image::StoreImage;

/// Writes store images into a data directory
#[derive(Debug, Clone)]
pub struct ImageWriter {
    dir: PathBuf,
}

impl ImageWriter {
    /// Create a writer for `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace the data file with `image`, taken at `snapshot`
    pub fn write(&self, snapshot: u64, image: &StoreImage) -> Result<ImageInfo, ImageError> {
        let body = image.encode()?;
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();
        let header = ImageHeader::new(snapshot, created_at, body.len() as u64);
        let header_bytes = header.to_bytes();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header_bytes);
        hasher.update(&body);
        let crc = hasher.finalize();

        let temp_path = sync_path(&self.dir);
        let final_path = data_path(&self.dir);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&header_bytes)?;
        file.write_all(&body)?;
        file.write_all(&crc.to_le_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &final_path)?;
        File::open(&self.dir)?.sync_all()?;

        debug!(
            target: "quadmem::durability",
            snapshot,
            statements = image.len(),
            bytes = body.len(),
            "Wrote data file"
        );

        Ok(ImageInfo {
            snapshot,
            created_at,
            statements: image.len(),
            path: final_path,
            crc,
        })
    }

    /// Remove a sync file left behind by an interrupted write
    ///
    /// Returns whether a file was removed.
    pub fn cleanup_sync_file(&self) -> io::Result<bool> {
        match fs::remove_file(sync_path(&self.dir)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Information about a written data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Snapshot the image was taken at
    pub snapshot: u64,
    /// Creation timestamp (microseconds since epoch)
    pub created_at: u64,
    /// Number of statements written
    pub statements: usize,
    /// Path of the data file
    pub path: PathBuf,
    /// Footer CRC32
    pub crc: u32,
}
