//! Upload form guard
//!
//! Validates the two image inputs before anything leaves the client,
//! prepares inline previews and drives the submit control through
//! submission and back-navigation.

pub mod field;
pub mod form;

#[cfg(feature = "http")]
pub mod client;

pub use field::{PreviewState, UploadField};
pub use form::{SubmitControl, SubmitOutcome, UploadForm};

#[cfg(feature = "http")]
pub use client::{SubmitReceipt, UploadClient};

use crate::{Error, Result};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

/// What the guard accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadLimits {
    /// Largest accepted file, inclusive
    pub max_bytes: u64,
    /// Accepted MIME types
    pub accepted_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 5 * MIB,
            accepted_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
        }
    }
}

impl UploadLimits {
    /// Type check first, then size; a file of exactly `max_bytes` passes
    pub fn check(&self, file: &SelectedFile) -> std::result::Result<(), FieldError> {
        if !self.accepts(&file.mime) {
            return Err(FieldError::UnsupportedType {
                found: file.mime.clone(),
                expected: self.type_label(),
            });
        }
        if file.size > self.max_bytes {
            return Err(FieldError::TooLarge {
                size: file.size,
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }

    pub fn accepts(&self, mime: &str) -> bool {
        self.accepted_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(mime.trim()))
    }

    /// Human label for the accepted set, e.g. `JPEG or PNG`
    pub fn type_label(&self) -> String {
        let names: Vec<String> = self
            .accepted_types
            .iter()
            .map(|t| t.rsplit('/').next().unwrap_or(t).to_ascii_uppercase())
            .collect();
        match names.split_last() {
            None => String::new(),
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
        }
    }
}

/// Field-scoped validation failure; `Display` is the text shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("This field is required")]
    Required,

    #[error("Please upload a {expected} image")]
    UnsupportedType { found: String, expected: String },

    #[error("Image must be smaller than {}", megabytes(.max_bytes))]
    TooLarge { size: u64, max_bytes: u64 },

    #[error("Error loading image preview")]
    PreviewFailed,
}

fn megabytes(bytes: &u64) -> String {
    if bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{:.1}MB", *bytes as f64 / MIB as f64)
    }
}

#[derive(Debug, Clone)]
enum FileSource {
    Disk(PathBuf),
    Memory(Arc<[u8]>),
}

/// A file picked for one of the inputs
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub size: u64,
    source: FileSource,
}

impl SelectedFile {
    /// Describe a file on disk; the MIME type is sniffed from its first
    /// bytes and falls back to the extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)
            .map_err(|e| Error::LoadError(format!("{}: {}", path.display(), e)))?
            .len();

        let mut head = Vec::with_capacity(16);
        std::fs::File::open(path)?
            .take(16)
            .read_to_end(&mut head)?;

        let mime = image::guess_format(&head)
            .ok()
            .or_else(|| ImageFormat::from_path(path).ok())
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            mime,
            size,
            source: FileSource::Disk(path.to_path_buf()),
        })
    }

    /// An in-memory file with a caller-declared MIME type
    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes.into()),
        }
    }

    /// Read the whole file
    pub async fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Disk(path) => tokio::fs::read(path)
                .await
                .map_err(|e| Error::LoadError(format!("{}: {}", path.display(), e))),
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            FileSource::Disk(p) => Some(p),
            FileSource::Memory(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(mime: &str, size: usize) -> SelectedFile {
        SelectedFile::from_bytes("a", mime, vec![0u8; size])
    }

    #[test]
    fn rejects_unaccepted_types() {
        let limits = UploadLimits::default();
        for mime in ["image/gif", "application/pdf", "text/plain", ""] {
            let err = limits.check(&file(mime, 10)).unwrap_err();
            assert_eq!(err.to_string(), "Please upload a JPEG or PNG image");
        }
        assert!(limits.check(&file("IMAGE/PNG", 10)).is_ok());
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        let limits = UploadLimits {
            max_bytes: 1000,
            ..Default::default()
        };
        assert!(limits.check(&file("image/jpeg", 1000)).is_ok());
        let err = limits.check(&file("image/jpeg", 1001)).unwrap_err();
        assert!(matches!(err, FieldError::TooLarge { size: 1001, .. }));
    }

    #[test]
    fn too_large_message_uses_megabytes() {
        let err = FieldError::TooLarge {
            size: 6 * MIB,
            max_bytes: 5 * MIB,
        };
        assert_eq!(err.to_string(), "Image must be smaller than 5MB");
        let err = FieldError::TooLarge {
            size: 0,
            max_bytes: 3 * MIB / 2,
        };
        assert_eq!(err.to_string(), "Image must be smaller than 1.5MB");
    }

    #[test]
    fn type_label_lists_subtypes() {
        let limits = UploadLimits {
            accepted_types: vec!["image/png".into(), "image/webp".into(), "image/jpeg".into()],
            ..Default::default()
        };
        assert_eq!(limits.type_label(), "PNG, WEBP or JPEG");
    }

    #[test]
    fn from_path_sniffs_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        image::RgbImage::new(2, 2).save_with_format(&path, ImageFormat::Png).unwrap();

        let f = SelectedFile::from_path(&path).unwrap();
        assert_eq!(f.mime, "image/png");
        assert_eq!(f.name, "upload.bin");
        assert_eq!(f.size, std::fs::metadata(&path).unwrap().len());
    }
}
