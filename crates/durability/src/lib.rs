//! Durability layer for quadmem
//!
//! A persistent store keeps one data file holding every statement visible
//! at the last synced snapshot, plus the namespace table:
//! - format: header layout, constants and file names
//! - image: the serialized body (`StoreImage`)
//! - writer: crash-safe write-fsync-rename of a new image
//! - reader: validation and decoding on restore
//!
//! There is no log: whatever was committed after the last sync is lost on
//! a crash.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod format;
pub mod image;
pub mod reader;
pub mod writer;

pub use error::ImageError;
pub use format::{
    data_path, sync_path, ImageHeader, ImageHeaderError, DATA_FILE_NAME, IMAGE_FORMAT_VERSION,
    IMAGE_MAGIC, SYNC_FILE_NAME,
};
pub use image::{ImageStatement, StoreImage};
pub use reader::{decode_file, read_image, LoadedImage};
pub use writer::{ImageInfo, ImageWriter};
