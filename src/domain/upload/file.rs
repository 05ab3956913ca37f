// src/domain/upload/file.rs
use crate::domain::errors::{DomainError, DomainResult};
use bytes::Bytes;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ALLOWED_TYPES: [&str; 4] =
    ["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// A receipt document selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub allowed_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| (*t).to_owned()).collect(),
        }
    }
}

impl UploadLimits {
    /// Collects every violated rule into one validation error.
    pub fn check(&self, file: &UploadFile) -> DomainResult<()> {
        let mut problems = Vec::new();
        if file.size() > self.max_file_size {
            problems.push(format!(
                "File size exceeds {}MB limit",
                self.max_file_size / 1024 / 1024
            ));
        }
        if !self.allows(&file.content_type) {
            problems.push(format!("Invalid file type. Allowed: {}", self.allowed_extensions()));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(problems.join(", ")))
        }
    }

    pub fn allows(&self, content_type: &str) -> bool {
        self.allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type.trim()))
    }

    fn allowed_extensions(&self) -> String {
        self.allowed_types
            .iter()
            .map(|mime| match mime.as_str() {
                "image/jpeg" => ".jpg, .jpeg",
                "image/jpg" => ".jpg",
                "image/png" => ".png",
                "application/pdf" => ".pdf",
                other => other,
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Best-effort MIME type from a file name's extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
