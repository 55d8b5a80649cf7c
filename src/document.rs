//! Document intake: normalise a user-supplied file, URL, or byte buffer
//! into an [`ExamDocument`].
//!
//! ## Why sniff magic bytes?
//!
//! Browsers and shells lie about MIME types; the first bytes of the file do
//! not. Classifying from content means a PNG renamed to `.pdf` still takes
//! the raster path, and unsupported formats are rejected with a clear error
//! before any decoder or the recognition service ever sees them.

use crate::error::MathScanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Content classification of an accepted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DocumentKind {
    Jpeg,
    Png,
    Webp,
    Pdf,
}

impl DocumentKind {
    /// The MIME type sent to the recognition service.
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentKind::Jpeg => "image/jpeg",
            DocumentKind::Png => "image/png",
            DocumentKind::Webp => "image/webp",
            DocumentKind::Pdf => "application/pdf",
        }
    }

    /// Whether the document has multiple renderable pages.
    pub fn is_paged(self) -> bool {
        matches!(self, DocumentKind::Pdf)
    }
}

/// An accepted exam document: raw bytes plus their content classification.
///
/// Immutable once accepted. The bytes are reference-counted so page
/// rendering can move a handle onto a blocking thread without copying the
/// whole file.
#[derive(Debug, Clone)]
pub struct ExamDocument {
    bytes: Arc<Vec<u8>>,
    kind: DocumentKind,
}

impl ExamDocument {
    /// Accept a byte buffer, classifying it by magic bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MathScanError> {
        let kind = sniff_kind(&bytes)?;
        debug!("Accepted {} document ({} bytes)", kind.mime_type(), bytes.len());
        Ok(Self {
            bytes: Arc::new(bytes),
            kind,
        })
    }

    /// Read and accept a local file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MathScanError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MathScanError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => MathScanError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => MathScanError::Internal(format!("read '{}': {}", path.display(), e)),
        })?;
        Self::from_bytes(bytes)
    }

    /// Resolve a user-supplied path or HTTP(S) URL to a document.
    ///
    /// URLs are downloaded into memory with the given timeout; everything
    /// else is treated as a local path.
    pub async fn resolve(input: &str, timeout_secs: u64) -> Result<Self, MathScanError> {
        if is_url(input) {
            let bytes = download_url(input, timeout_secs).await?;
            Self::from_bytes(bytes)
        } else {
            Self::from_path(input)
        }
    }

    /// Raw document bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the document bytes, for blocking render tasks.
    pub(crate) fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    /// Content classification.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// The document bytes as base64, as the recognition service expects.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes.as_slice())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Classify a byte buffer by its magic bytes.
fn sniff_kind(bytes: &[u8]) -> Result<DocumentKind, MathScanError> {
    if bytes.len() < 12 {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(MathScanError::UnsupportedFileType { magic });
    }
    if &bytes[..4] == b"%PDF" {
        return Ok(DocumentKind::Pdf);
    }
    if &bytes[..4] == b"\x89PNG" {
        return Ok(DocumentKind::Png);
    }
    if bytes[..3] == [0xFF, 0xD8, 0xFF] {
        return Ok(DocumentKind::Jpeg);
    }
    if &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Ok(DocumentKind::Webp);
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[..4]);
    Err(MathScanError::UnsupportedFileType { magic })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, MathScanError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| MathScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            MathScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            MathScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(MathScanError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MathScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        use image::{Rgba, RgbaImage};
        let img = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([0, 0, 0, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn sniffs_png() {
        let doc = ExamDocument::from_bytes(png_bytes()).unwrap();
        assert_eq!(doc.kind(), DocumentKind::Png);
        assert!(!doc.kind().is_paged());
        assert_eq!(doc.kind().mime_type(), "image/png");
    }

    #[test]
    fn sniffs_pdf_header() {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        let doc = ExamDocument::from_bytes(bytes).unwrap();
        assert_eq!(doc.kind(), DocumentKind::Pdf);
        assert!(doc.kind().is_paged());
    }

    #[test]
    fn sniffs_jpeg_header() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&[0u8; 16]);
        assert_eq!(
            ExamDocument::from_bytes(bytes).unwrap().kind(),
            DocumentKind::Jpeg
        );
    }

    #[test]
    fn rejects_unsupported() {
        let bytes = b"GIF89a-some-more-bytes".to_vec();
        match ExamDocument::from_bytes(bytes) {
            Err(MathScanError::UnsupportedFileType { magic }) => {
                assert_eq!(&magic, b"GIF8");
            }
            other => panic!("expected UnsupportedFileType, got {:?}", other.map(|d| d.kind())),
        }
    }

    #[test]
    fn rejects_tiny_buffer() {
        assert!(matches!(
            ExamDocument::from_bytes(vec![1, 2, 3]),
            Err(MathScanError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn base64_round_trips() {
        let doc = ExamDocument::from_bytes(png_bytes()).unwrap();
        let decoded = STANDARD.decode(doc.to_base64()).unwrap();
        assert_eq!(decoded, doc.bytes());
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/exam.pdf"));
        assert!(is_url("http://example.com/exam.png"));
        assert!(!is_url("/tmp/exam.pdf"));
        assert!(!is_url("exam.jpg"));
        assert!(!is_url(""));
    }

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(
            ExamDocument::from_path("/definitely/not/here.png"),
            Err(MathScanError::FileNotFound { .. })
        ));
    }
}
