use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use std::path::{Path, PathBuf};

use crate::error::AttachmentError;
use crate::llm::InlineData;

/// Largest file accepted for upload, inclusive.
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Check size and media type of a candidate file.
pub fn validate(mime_type: &str, size: u64) -> Result<(), AttachmentError> {
    if size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge {
            size,
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    if !(mime_type.starts_with("image/") || mime_type == "application/pdf") {
        return Err(AttachmentError::UnsupportedType(mime_type.to_string()));
    }
    Ok(())
}

/// A validated file waiting to be sent with the next message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    path: PathBuf,
    mime_type: String,
    size: u64,
}

impl PendingAttachment {
    /// Inspect a file on disk; the media type is inferred from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(AttachmentError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )));
        }

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        validate(&mime_type, metadata.len())?;

        Ok(Self {
            path: path.to_path_buf(),
            mime_type,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Read the file and encode it for inline transfer.
    pub async fn encode(&self) -> Result<InlineData, AttachmentError> {
        let bytes = tokio::fs::read(&self.path).await?;
        // The file may have changed since it was selected.
        validate(&self.mime_type, bytes.len() as u64)?;
        Ok(InlineData {
            mime_type: self.mime_type.clone(),
            data: BASE64_STANDARD.encode(bytes),
        })
    }
}
