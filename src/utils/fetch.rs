use reqwest::Client;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::utils::pdf::is_pdf;

// Firefox ESR User-Agent string to reduce server-side variance
pub const FIREFOX_UA: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:115.0) Gecko/20100101 Firefox/115.0";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Menus are a few pages; anything far larger is not the menu.
pub const PDF_LIMIT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("response is not a PDF (content type: {content_type})")]
    NotPdf { content_type: String },

    #[error("PDF of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("failed to write temporary file: {0}")]
    Io(#[from] std::io::Error),
}

/// A downloaded menu held in a temporary file. The file is removed when this value
/// is dropped, whichever way the caller leaves its scope.
#[derive(Debug)]
pub struct FetchedMenu {
    file: NamedTempFile,
    size: usize,
}

impl FetchedMenu {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

pub struct MenuFetcher {
    client: Client,
}

impl MenuFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(FIREFOX_UA)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Downloads `url` into a temporary file, refusing anything that is not a PDF.
    pub async fn fetch(&self, url: &url::Url) -> Result<FetchedMenu, FetchError> {
        info!(target: "menu_fetch", url = %url, "Starting HTTP fetch");

        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            warn!(target: "menu_fetch", url = %url, "HTTP transport error: {}", e);
            FetchError::Request(e)
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!(target: "menu_fetch", url = %url, status = status, "HTTP non-success status");
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|s| s.to_string());

        let body = response.bytes().await?;
        info!(target: "menu_fetch", url = %url, size = body.len(), ct = ?content_type, "HTTP fetch completed");

        store_pdf(&body, content_type.as_deref())
    }
}

/// Validates a downloaded body and writes it to a fresh temporary file.
pub fn store_pdf(body: &[u8], content_type: Option<&str>) -> Result<FetchedMenu, FetchError> {
    let head = &body[..body.len().min(512)];
    if !is_pdf(content_type, head) {
        return Err(FetchError::NotPdf {
            content_type: content_type.unwrap_or("unknown").to_string(),
        });
    }

    if body.len() > PDF_LIMIT_BYTES {
        return Err(FetchError::TooLarge {
            size: body.len(),
            limit: PDF_LIMIT_BYTES,
        });
    }

    let mut file = tempfile::Builder::new()
        .prefix("menu-")
        .suffix(".pdf")
        .tempfile()?;
    file.write_all(body)?;
    file.flush()?;

    Ok(FetchedMenu {
        file,
        size: body.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_pdf_to_temp_file_and_removes_it_on_drop() {
        let body = b"%PDF-1.4\nfake menu body";
        let menu = store_pdf(body, Some("application/pdf")).unwrap();
        let path = menu.path().to_path_buf();

        assert_eq!(menu.size(), body.len());
        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert!(path.to_string_lossy().ends_with(".pdf"));

        drop(menu);
        assert!(!path.exists());
    }

    #[test]
    fn temp_file_is_removed_on_early_return() {
        fn inspect_then_fail(path_out: &mut std::path::PathBuf) -> Result<(), FetchError> {
            let menu = store_pdf(b"%PDF-1.5", None)?;
            *path_out = menu.path().to_path_buf();
            Err(FetchError::Status {
                status: 500,
                url: "https://example.com".to_string(),
            })
        }

        let mut path = std::path::PathBuf::new();
        assert!(inspect_then_fail(&mut path).is_err());
        assert!(!path.as_os_str().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn refuses_html_bodies() {
        let err = store_pdf(b"<html>closed today</html>", Some("text/html")).unwrap_err();
        match err {
            FetchError::NotPdf { content_type } => assert_eq!(content_type, "text/html"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn builds_client() {
        assert!(MenuFetcher::new().is_ok());
    }
}
