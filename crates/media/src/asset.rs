//! Uploaded media assets

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::MediaError;

/// Image extensions accepted for upload
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Video extensions accepted for upload
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// Kind of media, decided by the declared extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a bare extension (case-insensitive, without the dot)
    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Classify a filename, failing with `UnsupportedFormat` naming the extension
    pub fn from_filename(filename: &str) -> Result<(Self, String), MediaError> {
        let extension = extension_of(filename);
        match MediaKind::from_extension(&extension) {
            Some(kind) => Ok((kind, extension)),
            None if extension.is_empty() => Err(MediaError::UnsupportedFormat(format!(
                "'{}' has no extension",
                filename
            ))),
            None => Err(MediaError::UnsupportedFormat(format!(".{}", extension))),
        }
    }
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Raw uploaded bytes with their validated extension.
///
/// An asset can only be built for a recognized extension, so everything
/// downstream may assume the format check already happened.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    filename: String,
    extension: String,
    kind: MediaKind,
    bytes: Vec<u8>,
}

impl MediaAsset {
    /// Validate the declared filename and wrap the bytes
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, MediaError> {
        let filename = filename.into();
        let (kind, extension) = MediaKind::from_filename(&filename)?;

        Ok(Self {
            filename,
            extension,
            kind,
            bytes,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Lowercase extension without the dot
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}
