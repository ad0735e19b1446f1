//! Upload stage
//!
//! Collects a statement file plus metadata and submits it exactly once.
//! Size and type violations are rejected client-side before any network
//! request is attempted.

use crate::api::{ImportApi, UploadRequest};
use crate::error::{AppError, Result};
use tracing::info;

const MIB: u64 = 1024 * 1024;

/// Supported statement file types with per-type size caps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Pdf,
    Text,
}

impl FileKind {
    /// Detect the kind from the file extension
    pub fn from_file_name(name: &str) -> Option<FileKind> {
        let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") => Some(FileKind::Csv),
            Some("pdf") => Some(FileKind::Pdf),
            Some("txt") => Some(FileKind::Text),
            _ => None,
        }
    }

    /// Maximum accepted upload size. PDFs get the largest bound since
    /// scanned statements run big.
    pub fn max_bytes(&self) -> u64 {
        match self {
            FileKind::Pdf => 20 * MIB,
            FileKind::Csv => 10 * MIB,
            FileKind::Text => 5 * MIB,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Csv => "CSV",
            FileKind::Pdf => "PDF",
            FileKind::Text => "text",
        }
    }
}

/// Upload stage of the import wizard
pub struct UploadStage;

impl UploadStage {
    /// Client-side validation, run before submission is attempted
    pub fn validate(request: &UploadRequest) -> Result<FileKind> {
        if request.account_id <= 0 {
            return Err(AppError::Validation(
                "A destination account must be selected".to_string(),
            ));
        }
        if request.bytes.is_empty() {
            return Err(AppError::Validation("File is empty".to_string()));
        }

        let kind = FileKind::from_file_name(&request.file_name).ok_or_else(|| {
            AppError::Validation(format!(
                "Unsupported file type: '{}' (expected .csv, .pdf or .txt)",
                request.file_name
            ))
        })?;

        let size = request.bytes.len() as u64;
        if size > kind.max_bytes() {
            return Err(AppError::Validation(format!(
                "File exceeds the {} MiB limit for {} files",
                kind.max_bytes() / MIB,
                kind.label()
            )));
        }

        Ok(kind)
    }

    /// Validate and submit, returning the created job id
    pub async fn submit(api: &dyn ImportApi, request: UploadRequest) -> Result<i64> {
        let kind = Self::validate(&request)?;
        info!(
            "Uploading {} statement {} ({} bytes)",
            kind.label(),
            request.file_name,
            request.bytes.len()
        );

        let receipt = api.upload(request).await?;
        info!("Upload accepted, job {}", receipt.id);
        Ok(receipt.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(file_name: &str, size: usize) -> UploadRequest {
        UploadRequest::new(file_name, vec![0u8; size], 7)
    }

    #[test]
    fn detects_kind_from_extension() {
        assert_eq!(FileKind::from_file_name("a.CSV"), Some(FileKind::Csv));
        assert_eq!(
            FileKind::from_file_name("statement.pdf"),
            Some(FileKind::Pdf)
        );
        assert_eq!(FileKind::from_file_name("dump.txt"), Some(FileKind::Text));
        assert_eq!(FileKind::from_file_name("archive.zip"), None);
        assert_eq!(FileKind::from_file_name("noextension"), None);
    }

    #[test]
    fn oversized_pdf_is_rejected() {
        let err = UploadStage::validate(&request("statement.pdf", 25 * 1024 * 1024)).unwrap_err();
        match err {
            AppError::Validation(message) => assert!(message.contains("20 MiB")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn pdf_cap_is_larger_than_text_cap() {
        assert!(FileKind::Pdf.max_bytes() > FileKind::Text.max_bytes());
        // 15 MiB passes as PDF but would fail as text
        assert!(UploadStage::validate(&request("a.pdf", 15 * 1024 * 1024)).is_ok());
        assert!(UploadStage::validate(&request("a.txt", 15 * 1024 * 1024)).is_err());
    }

    #[test]
    fn missing_account_and_empty_file_are_rejected() {
        let mut r = request("a.csv", 100);
        r.account_id = 0;
        assert!(UploadStage::validate(&r).is_err());

        assert!(UploadStage::validate(&request("a.csv", 0)).is_err());
    }
}
