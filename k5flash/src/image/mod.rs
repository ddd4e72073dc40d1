//! Firmware images.
//!
//! The bootloader takes a raw binary, transferred in fixed 256-byte pages.
//! Page index and page count travel as u16 fields, which caps the image
//! size at 65535 pages.

use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Bytes per programmed page.
pub const PAGE_SIZE: usize = 256;

/// Largest image the page counter can address.
pub const MAX_IMAGE_SIZE: usize = u16::MAX as usize * PAGE_SIZE;

/// A raw firmware image ready to be programmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    /// Load an image from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading firmware image from: {}", path.display());

        let data = fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Wrap raw image bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidImage("empty file".into()));
        }

        if data.len() > MAX_IMAGE_SIZE {
            return Err(Error::InvalidImage(format!(
                "{} bytes exceeds the {MAX_IMAGE_SIZE}-byte limit",
                data.len()
            )));
        }

        Ok(Self { data })
    }

    /// Image size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: empty images are rejected on construction.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of pages needed to transfer the image.
    #[allow(clippy::cast_possible_truncation)]
    pub fn page_count(&self) -> u16 {
        // Safe cast: size is capped at MAX_IMAGE_SIZE
        self.data.len().div_ceil(PAGE_SIZE) as u16
    }

    /// Contents of page `index`, zero padded past the end of the image.
    pub fn page(&self, index: u16) -> [u8; PAGE_SIZE] {
        let mut page = [0u8; PAGE_SIZE];

        let start = usize::from(index) * PAGE_SIZE;
        if start < self.data.len() {
            let end = (start + PAGE_SIZE).min(self.data.len());
            page[..end - start].copy_from_slice(&self.data[start..end]);
        }

        page
    }
}
