//! External asset storage
//!
//! Records reference their header image by canonical URL. When an admin
//! uploads a binary file, it is pushed to the external host and the host's
//! secure URL is what gets persisted; when they paste an external URL, that
//! string is stored literally. Deletion of hosted assets is best-effort
//! only and never blocks record deletion.

pub mod hosted;

pub use hosted::{public_id_from_url, AssetHost, AssetHostConfig};

use async_trait::async_trait;

use crate::types::{DarshanError, ErrorMap, Result};

/// 50MB cap applied to every upload (images and video alike)
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// MIME types accepted for district and panchayat header images
pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// MIME types accepted for media item uploads (images plus video)
pub const MEDIA_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "video/mp4",
    "video/webm",
];

/// A binary file received from a submission
#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Size and type limits applied before any network call
#[derive(Debug, Clone, Copy)]
pub struct UploadConstraints {
    pub max_size_bytes: u64,
    pub allowed_mime_types: &'static [&'static str],
}

impl UploadConstraints {
    pub const fn images() -> Self {
        Self {
            max_size_bytes: MAX_UPLOAD_BYTES,
            allowed_mime_types: IMAGE_MIME_TYPES,
        }
    }

    pub const fn media() -> Self {
        Self {
            max_size_bytes: MAX_UPLOAD_BYTES,
            allowed_mime_types: MEDIA_MIME_TYPES,
        }
    }
}

/// Check an upload against its constraints. Runs before any network call;
/// a rejected file never leaves the process.
pub fn check_constraints(upload: &AssetUpload, constraints: &UploadConstraints) -> Result<()> {
    let mut errors = ErrorMap::new();

    if upload.bytes.len() as u64 > constraints.max_size_bytes {
        errors.insert(
            "headerImage".to_string(),
            format!(
                "File exceeds the {}MB limit",
                constraints.max_size_bytes / (1024 * 1024)
            ),
        );
    }

    if !constraints
        .allowed_mime_types
        .iter()
        .any(|m| *m == upload.content_type)
    {
        errors.insert(
            "headerImage".to_string(),
            format!("Unsupported file type '{}'", upload.content_type),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DarshanError::Validation(errors))
    }
}

/// Outcome of a best-effort asset deletion. Never an `Err`: callers log the
/// failure and carry on with record deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The host confirmed removal
    Deleted,
    /// The URL is not a managed asset (user-pasted external URL)
    Skipped(String),
    /// The host call failed or the URL could not be parsed
    Failed(String),
}

/// Seam between the ingest pipeline and the external host. Swappable so the
/// pipeline can be exercised without network access.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload a binary under `folder`, returning the host's canonical URL.
    /// Constraint violations are rejected before any network call; remote
    /// failures abort the surrounding create/update.
    async fn upload(
        &self,
        file: &AssetUpload,
        folder: &str,
        constraints: &UploadConstraints,
    ) -> Result<String>;

    /// Best-effort removal of a previously stored asset by its URL
    async fn delete(&self, url: &str) -> DeleteOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_of(size: usize, mime: &str) -> AssetUpload {
        AssetUpload {
            bytes: vec![0u8; size],
            filename: "photo.jpg".to_string(),
            content_type: mime.to_string(),
        }
    }

    #[test]
    fn test_oversize_rejected_before_upload() {
        // 60MB file against the 50MB cap
        let upload = upload_of(60 * 1024 * 1024, "image/jpeg");
        let err = check_constraints(&upload, &UploadConstraints::images()).unwrap_err();
        match err {
            DarshanError::Validation(map) => {
                assert!(map["headerImage"].contains("50MB"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_size_at_limit_allowed() {
        let upload = upload_of(MAX_UPLOAD_BYTES as usize, "image/png");
        assert!(check_constraints(&upload, &UploadConstraints::images()).is_ok());
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let upload = upload_of(1024, "application/pdf");
        let err = check_constraints(&upload, &UploadConstraints::images()).unwrap_err();
        match err {
            DarshanError::Validation(map) => {
                assert!(map["headerImage"].contains("application/pdf"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_video_allowed_for_media_only() {
        let upload = upload_of(1024, "video/mp4");
        assert!(check_constraints(&upload, &UploadConstraints::images()).is_err());
        assert!(check_constraints(&upload, &UploadConstraints::media()).is_ok());
    }
}
