//! Error types for the mathscan library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MathScanError`] — **Fatal**: the operation cannot proceed at all
//!   (unreadable file, unsupported format, provider not configured,
//!   recognition call exhausted its retries). Returned as
//!   `Err(MathScanError)` from the top-level entry points.
//!
//! * [`CropError`] — **Non-fatal**: a single step of the cropping flow
//!   failed (page render glitch, a selection below the minimum size, an
//!   encode failure) but the session itself is still healthy. The caller
//!   can redraw, skip, navigate elsewhere, or retry without losing any
//!   previously resolved crop or the recognised text.
//!
//! The separation lets a host application keep the crop modal open across
//! individual failures: nothing in the cropping flow ever tears down the
//! document or the resolved-crop map.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mathscan library.
///
/// Failures local to one crop attempt use [`CropError`] instead and leave
/// the session resumable.
#[derive(Debug, Error)]
pub enum MathScanError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a supported image format nor a PDF.
    #[error("Unsupported file type\nFirst bytes: {magic:?}\nSupported: JPEG, PNG, WebP, PDF.")]
    UnsupportedFileType { magic: [u8; 4] },

    /// The document could not be decoded at all (truncated image, broken PDF header).
    #[error("Document is corrupt: {detail}")]
    CorruptDocument { detail: String },

    // ── Recognition service errors ────────────────────────────────────────
    /// The configured vision provider is not initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The recognition call failed after all retries.
    ///
    /// The document and any resolved crops are untouched, so the caller may
    /// retry without re-uploading.
    #[error("Recognition failed after {retries} retries: {detail}")]
    RecognitionFailed { retries: u32, detail: String },

    // ── Clipboard errors ──────────────────────────────────────────────────
    /// Both the rich write and the plain-text fallback write failed.
    #[error("Clipboard write failed: {detail}")]
    ClipboardWriteFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error inside the cropping flow.
///
/// None of these abort the crop session: the resolved-crop map and the
/// current marker index stay exactly as they were.
#[derive(Debug, Clone, Error)]
pub enum CropError {
    /// The confirmed rectangle is below the minimum size threshold.
    ///
    /// No crop resource is created and the session does not advance; the
    /// user redraws the selection.
    #[error("Selection {width:.0}×{height:.0}px is below the {min:.0}px minimum")]
    TooSmallSelection { width: f32, height: f32, min: f32 },

    /// There is no confirmed selection to crop.
    #[error("No selection to crop")]
    NoSelection,

    /// Page rasterisation failed.
    ///
    /// Cropping on this page is blocked until the user navigates elsewhere
    /// or retries; other pages are unaffected.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Encoding the cropped pixels into an image resource failed.
    #[error("Crop encoding failed: {detail}")]
    EncodeFailed { detail: String },

    /// The session is not positioned on a marker (not started, or complete).
    #[error("No active marker")]
    NoActiveMarker,
}
