use std::path::Path;

use bytes::Bytes;
use thiserror::Error;

/// 5 MiB upload ceiling.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: [&str; 4] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// A resume selected for upload.
#[derive(Clone, PartialEq)]
pub struct ResumeFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl std::fmt::Debug for ResumeFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.size())
            .finish()
    }
}

impl ResumeFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, deriving its MIME type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resume_upload".to_string());
        let content_type = content_type_for_name(&name);
        Ok(Self::new(name, content_type, Bytes::from(bytes)))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please upload a PDF, DOC, DOCX, or TXT file")]
    UnsupportedType { content_type: String },

    #[error("File size must be less than 5MB")]
    TooLarge { size: u64 },
}

/// The one validation rule set for every way a file can enter the system.
/// Pure: it never mutates the file and always yields the same verdict for it.
pub fn validate(file: &ResumeFile) -> Result<(), ValidationError> {
    if !ALLOWED_CONTENT_TYPES.contains(&file.content_type.as_str()) {
        return Err(ValidationError::UnsupportedType {
            content_type: file.content_type.clone(),
        });
    }
    if file.size() > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge { size: file.size() });
    }
    Ok(())
}

/// MIME type a browser would report for the file name's extension.
pub fn content_type_for_name(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
