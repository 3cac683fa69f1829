use std::path::Path;

use axum::body::Bytes;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::AppError;

/// 5 MB upload limit for post images
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// Uploaded images live under `<media_dir>/posts/`.
const POSTS_DIR: &str = "posts";

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A file part from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Detect the image format from its leading bytes; returns the extension
/// to store it under.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

/// Returns the extension for a valid upload, or the form error to show.
pub fn validate_image(upload: &Upload) -> Result<&'static str, String> {
    if upload.bytes.len() > MAX_IMAGE_SIZE {
        return Err(format!(
            "The file '{}' is too large; the limit is {} MB.",
            upload.file_name,
            MAX_IMAGE_SIZE / (1024 * 1024)
        ));
    }
    sniff_image(&upload.bytes).ok_or_else(|| INVALID_IMAGE.to_string())
}

/// Write an image to disk; returns its path relative to the media root.
pub async fn save_image(media_dir: &Path, ext: &str, bytes: &[u8]) -> Result<String, AppError> {
    let dir = media_dir.join(POSTS_DIR);
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        error!("Failed to create media directory {}: {}", dir.display(), e);
        AppError::Internal(e.into())
    })?;

    let relative = format!("{}/{}.{}", POSTS_DIR, Uuid::new_v4(), ext);
    let file_path = media_dir.join(&relative);
    let mut file = tokio::fs::File::create(&file_path).await.map_err(|e| {
        error!("Failed to create file {}: {}", file_path.display(), e);
        AppError::Internal(e.into())
    })?;
    file.write_all(bytes).await.map_err(|e| {
        error!("Failed to write file {}: {}", file_path.display(), e);
        AppError::Internal(e.into())
    })?;
    file.flush().await.map_err(|e| AppError::Internal(e.into()))?;

    Ok(relative)
}

/// Best effort; a leftover file is only wasted space.
pub async fn remove_image(media_dir: &Path, relative: &str) {
    if relative.contains("..") {
        warn!("Refusing to remove suspicious media path '{}'", relative);
        return;
    }
    let file_path = media_dir.join(relative);
    if let Err(e) = tokio::fs::remove_file(&file_path).await {
        warn!("Failed to remove old image {}: {}", file_path.display(), e);
    }
}

#[cfg(test)]
pub(crate) const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\
\xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0C\x0A\x00\x3B";
