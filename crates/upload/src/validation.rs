//! Client-side checks mirroring what the upload endpoint enforces, so a
//! doomed upload is refused before the user spends time placing it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm"];

pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 100 * 1024 * 1024;

/// Opaque handle to a user-selected file; the bytes stay with the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// Host-side blob key.
    pub blob: u64,
    pub name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: MAX_IMAGE_BYTES,
            max_video_bytes: MAX_VIDEO_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported file type {name:?}; allowed: {allowed}")]
    UnsupportedType { name: String, allowed: String },

    #[error("{name:?} is empty")]
    Empty { name: String },

    #[error("{name:?} is too large ({size_bytes} bytes); maximum for {kind} is {max_mb} MB")]
    TooLarge {
        name: String,
        kind: &'static str,
        size_bytes: u64,
        max_mb: u64,
    },
}

fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn media_kind(name: &str) -> Option<MediaKind> {
    let ext = extension(name)?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Checks extension and size before a review starts.
///
/// Stricter than the persistence API: zero-byte files are refused here even
/// though the server would store them.
pub fn validate_file(file: &FileHandle, limits: &UploadLimits) -> Result<MediaKind, ValidationError> {
    let Some(kind) = media_kind(&file.name) else {
        let allowed = IMAGE_EXTENSIONS
            .iter()
            .chain(VIDEO_EXTENSIONS)
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ValidationError::UnsupportedType {
            name: file.name.clone(),
            allowed,
        });
    };

    if file.size_bytes == 0 {
        return Err(ValidationError::Empty {
            name: file.name.clone(),
        });
    }

    let (max, label) = match kind {
        MediaKind::Image => (limits.max_image_bytes, "images"),
        MediaKind::Video => (limits.max_video_bytes, "videos"),
    };
    if file.size_bytes > max {
        return Err(ValidationError::TooLarge {
            name: file.name.clone(),
            kind: label,
            size_bytes: file.size_bytes,
            max_mb: max / (1024 * 1024),
        });
    }

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::{FileHandle, MediaKind, UploadLimits, ValidationError, media_kind, validate_file};

    fn file(name: &str, size_bytes: u64) -> FileHandle {
        FileHandle {
            blob: 1,
            name: name.to_string(),
            size_bytes,
            mime_type: None,
        }
    }

    #[test]
    fn classifies_extensions_case_insensitively() {
        assert_eq!(media_kind("IMG_0001.JPG"), Some(MediaKind::Image));
        assert_eq!(media_kind("clip.webm"), Some(MediaKind::Video));
        assert_eq!(media_kind("notes.txt"), None);
        assert_eq!(media_kind("jpg"), None);
        assert_eq!(media_kind(".jpg"), None);
    }

    #[test]
    fn enforces_per_kind_size_limits() {
        let limits = UploadLimits::default();
        assert_eq!(
            validate_file(&file("a.jpg", 10 * 1024 * 1024), &limits),
            Ok(MediaKind::Image)
        );
        assert!(matches!(
            validate_file(&file("a.jpg", 10 * 1024 * 1024 + 1), &limits),
            Err(ValidationError::TooLarge { max_mb: 10, .. })
        ));
        assert_eq!(
            validate_file(&file("a.mov", 50 * 1024 * 1024), &limits),
            Ok(MediaKind::Video)
        );
    }

    #[test]
    fn rejects_empty_and_unknown_files() {
        let limits = UploadLimits::default();
        assert!(matches!(
            validate_file(&file("a.png", 0), &limits),
            Err(ValidationError::Empty { .. })
        ));
        let err = validate_file(&file("a.gif", 10), &limits).expect_err("gif");
        assert!(err.to_string().contains(".webp"));
    }
}
