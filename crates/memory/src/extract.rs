//! Plain-text extraction for uploaded documents.
//!
//! PDFs go through `pdf-extract`; text formats must be valid UTF-8.
//! Anything else is reported as unsupported so the caller can store the file
//! without indexing it.

use std::path::Path;

use ragbridge_core::error::StorageError;

pub const MIME_PDF: &str = "application/pdf";

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "html", "htm", "xml", "log"];

/// Document formats the index can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

/// Decide how to read an upload from its declared content type, its file
/// extension, and finally its leading bytes.
pub fn detect_kind(file_name: &str, content_type: Option<&str>, bytes: &[u8]) -> Option<DocumentKind> {
    let content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase());
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    if content_type.as_deref() == Some(MIME_PDF)
        || extension.as_deref() == Some("pdf")
        || bytes.starts_with(b"%PDF-")
    {
        return Some(DocumentKind::Pdf);
    }

    let declared_text = content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("text/") || ct == "application/json");
    let known_extension = extension
        .as_deref()
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext));

    if declared_text || known_extension || std::str::from_utf8(bytes).is_ok() {
        return Some(DocumentKind::Text);
    }

    None
}

/// Extract plain UTF-8 text from an upload.
pub fn extract_text(
    file_name: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<String, StorageError> {
    match detect_kind(file_name, content_type, bytes) {
        Some(DocumentKind::Pdf) => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| StorageError::Extraction {
                file: file_name.to_string(),
                reason: e.to_string(),
            })
        }
        Some(DocumentKind::Text) => {
            String::from_utf8(bytes.to_vec()).map_err(|e| StorageError::Extraction {
                file: file_name.to_string(),
                reason: format!("not valid UTF-8: {e}"),
            })
        }
        None => Err(StorageError::UnsupportedContentType(
            content_type.unwrap_or("application/octet-stream").to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_by_type_extension_or_magic() {
        assert_eq!(detect_kind("a.bin", Some("application/pdf"), b""), Some(DocumentKind::Pdf));
        assert_eq!(detect_kind("manual.PDF", None, b""), Some(DocumentKind::Pdf));
        assert_eq!(detect_kind("upload", None, b"%PDF-1.7\n"), Some(DocumentKind::Pdf));
    }

    #[test]
    fn detects_text() {
        assert_eq!(
            detect_kind("notes", Some("text/plain; charset=utf-8"), b"hi"),
            Some(DocumentKind::Text)
        );
        assert_eq!(detect_kind("faq.md", None, b"# FAQ"), Some(DocumentKind::Text));
        assert_eq!(detect_kind("blob", None, "olá".as_bytes()), Some(DocumentKind::Text));
    }

    #[test]
    fn binary_is_unsupported() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0xff, 0xfe];
        assert_eq!(detect_kind("logo.png", Some("image/png"), &png), None);
        let err = extract_text("logo.png", Some("image/png"), &png).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedContentType(ref ct) if ct == "image/png"));
    }

    #[test]
    fn extracts_utf8_text() {
        let text = extract_text("guide.txt", Some("text/plain"), "Potência: 40 W".as_bytes()).unwrap();
        assert_eq!(text, "Potência: 40 W");
    }

    #[test]
    fn invalid_utf8_declared_as_text_is_extraction_error() {
        let err = extract_text("bad.txt", Some("text/plain"), &[0xff, 0xfe, 0xfd]).unwrap_err();
        assert!(matches!(err, StorageError::Extraction { ref file, .. } if file == "bad.txt"));
    }

    #[test]
    fn corrupt_pdf_is_extraction_error() {
        let err = extract_text("broken.pdf", None, b"%PDF-1.4 garbage").unwrap_err();
        assert!(matches!(err, StorageError::Extraction { .. }));
    }
}
