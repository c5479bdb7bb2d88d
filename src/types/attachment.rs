use std::path::Path;

use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported image media types.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,

    #[serde(rename = "image/png")]
    Png,

    #[serde(rename = "image/gif")]
    Gif,

    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMediaType {
    /// The MIME type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
            ImageMediaType::Gif => "image/gif",
            ImageMediaType::Webp => "image/webp",
        }
    }

    /// Determine the media type from a file extension, ignoring case.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageMediaType::Jpeg),
            "png" => Some(ImageMediaType::Png),
            "gif" => Some(ImageMediaType::Gif),
            "webp" => Some(ImageMediaType::Webp),
            _ => None,
        }
    }
}

/// A binary image the user attaches to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// What kind of image the bytes hold.
    pub media_type: ImageMediaType,

    /// The raw image bytes.
    pub data: Bytes,
}

impl Attachment {
    /// Create a new attachment from raw bytes.
    pub fn new(media_type: ImageMediaType, data: impl Into<Bytes>) -> Self {
        Self {
            media_type,
            data: data.into(),
        }
    }

    /// Read an attachment from disk.
    ///
    /// The media type is determined from the file extension.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let media_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageMediaType::from_extension)
            .ok_or_else(|| {
                Error::validation(
                    format!(
                        "unsupported attachment {}: must be jpeg, png, gif, or webp",
                        path.display()
                    ),
                    Some("attachment".to_string()),
                )
            })?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        Ok(Self::new(media_type, data))
    }

    /// Encode the attachment as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{};base64,{}", self.media_type.as_str(), payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri() {
        let attachment = Attachment::new(ImageMediaType::Png, &b"Hello World"[..]);
        assert_eq!(
            attachment.to_data_uri(),
            "data:image/png;base64,SGVsbG8gV29ybGQ="
        );
    }

    #[test]
    fn extensions() {
        assert_eq!(
            ImageMediaType::from_extension("JPG"),
            Some(ImageMediaType::Jpeg)
        );
        assert_eq!(
            ImageMediaType::from_extension("webp"),
            Some(ImageMediaType::Webp)
        );
        assert_eq!(ImageMediaType::from_extension("pdf"), None);
    }

    #[tokio::test]
    async fn from_path_rejects_unknown_extension() {
        let err = Attachment::from_path("notes.txt").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn from_path_reads_file() {
        let path = std::env::temp_dir().join(format!("chatterbox-{}.gif", std::process::id()));
        tokio::fs::write(&path, b"GIF89a").await.unwrap();
        let attachment = Attachment::from_path(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();
        assert_eq!(attachment.media_type, ImageMediaType::Gif);
        assert_eq!(attachment.data, Bytes::from_static(b"GIF89a"));
    }
}
