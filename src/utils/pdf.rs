// Thin PDF helpers over the `pdf-extract` crate.

use anyhow::Context;
use std::path::Path;

/// Extracts text from a PDF on disk, one string per page in page order.
pub fn extract_pages(path: &Path) -> anyhow::Result<Vec<String>> {
    let pages = pdf_extract::extract_text_by_pages(path).with_context(|| {
        format!(
            "failed to extract text from PDF {} using pdf-extract",
            path.display()
        )
    })?;
    Ok(pages)
}

/// Returns true if given content-type or head indicates a PDF file.
/// - Content-Type: application/pdf (case-insensitive, substring match)
/// - Magic bytes: %PDF-
pub fn is_pdf(content_type: Option<&str>, head: &[u8]) -> bool {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    ct.contains("application/pdf") || head.starts_with(b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::{extract_pages, is_pdf};

    #[test]
    fn detects_pdf_by_content_type_or_magic() {
        assert!(is_pdf(Some("Application/PDF"), b""));
        assert!(is_pdf(Some("application/pdf; qs=0.001"), b"<html>"));
        assert!(is_pdf(None, b"%PDF-1.7\n%\xe2\xe3"));
        assert!(is_pdf(Some("binary/octet-stream"), b"%PDF-1.4"));
        assert!(!is_pdf(Some("text/html"), b"<!doctype html>"));
        assert!(!is_pdf(None, b""));
    }

    #[test]
    fn extracting_garbage_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"definitely not a pdf").unwrap();
        assert!(extract_pages(file.path()).is_err());
    }
}
