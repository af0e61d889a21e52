//! Data file reader for restore
//!
//! Loads and validates `quadmem.data`: magic, format version, body length
//! and footer CRC are all checked before the body is decoded.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::warn;

use crate::error::ImageError;
use crate::format::{data_path, ImageHeader, IMAGE_FOOTER_SIZE, IMAGE_HEADER_SIZE};
use crate::image::StoreImage;

/// A validated, decoded data file
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// File header
    pub header: ImageHeader,
    /// Decoded contents
    pub image: StoreImage,
    /// Footer CRC32
    pub crc: u32,
}

impl LoadedImage {
    /// Snapshot the image was taken at
    pub fn snapshot(&self) -> u64 {
        self.header.snapshot
    }

    /// Creation timestamp
    pub fn created_at(&self) -> u64 {
        self.header.created_at
    }
}

/// Read the data file in `dir`
///
/// Returns `Ok(None)` when there is no data file or it is empty.
pub fn read_image(dir: &Path) -> Result<Option<LoadedImage>, ImageError> {
    let path = data_path(dir);
    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let size = file.metadata()?.len();
    if size == 0 {
        warn!(
            target: "quadmem::durability",
            path = %path.display(),
            "Ignoring empty data file"
        );
        return Ok(None);
    }

    let mut bytes = Vec::with_capacity(size as usize);
    file.read_to_end(&mut bytes)?;
    decode_file(&bytes).map(Some)
}

/// Validate and decode the raw bytes of a data file
pub fn decode_file(bytes: &[u8]) -> Result<LoadedImage, ImageError> {
    let size = bytes.len() as u64;
    if bytes.len() < IMAGE_HEADER_SIZE + IMAGE_FOOTER_SIZE {
        return Err(ImageError::FileTooSmall { size });
    }

    let mut header_bytes = [0u8; IMAGE_HEADER_SIZE];
    header_bytes.copy_from_slice(&bytes[..IMAGE_HEADER_SIZE]);
    let header = ImageHeader::from_bytes(&header_bytes);
    header.validate()?;

    let available = size - (IMAGE_HEADER_SIZE + IMAGE_FOOTER_SIZE) as u64;
    if header.body_len != available {
        return Err(ImageError::LengthMismatch {
            expected: header.body_len,
            actual: available,
        });
    }

    let footer_start = bytes.len() - IMAGE_FOOTER_SIZE;
    let mut footer = [0u8; IMAGE_FOOTER_SIZE];
    footer.copy_from_slice(&bytes[footer_start..]);
    let stored = u32::from_le_bytes(footer);
    let computed = crc32fast::hash(&bytes[..footer_start]);
    if stored != computed {
        return Err(ImageError::CrcMismatch { stored, computed });
    }

    let image = StoreImage::decode(&bytes[IMAGE_HEADER_SIZE..footer_start])?;
    Ok(LoadedImage {
        header,
        image,
        crc: stored,
    })
}
