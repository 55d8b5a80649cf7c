//! # mathscan
//!
//! Digitise photographed math exams: recognise the text with a vision
//! model, crop each referenced figure from the source image, and emit a
//! paste-ready document with the figures embedded.
//!
//! ## Why this crate?
//!
//! OCR tools read the words on an exam sheet but drop its figures —
//! geometry diagrams, function graphs, tables of variation. Instead this
//! crate has the vision model emit an inline `[[CHÈN_HÌNH]]` marker
//! wherever a figure belongs, then walks the user through cropping the
//! matching region from the source page for each marker. Reassembly
//! replaces every marker with its crop, so the output pastes into Word
//! with text and figures interleaved exactly as on paper.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo / PDF
//!  │
//!  ├─ 1. Document   resolve local file or URL, sniff the format
//!  ├─ 2. Recognise  vision model → transcript with figure markers
//!  ├─ 3. Scan       clean the transcript, locate every marker
//!  ├─ 4. Crop       interactive session: one region per marker
//!  ├─ 5. Reassemble preview text + rich clipboard payload
//!  └─ 6. Deliver    clipboard (HTML + plain fallback) or files
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mathscan::{
//!     recognize, CropSession, ExamDocument, ResolvedCropMap, ScanConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ScanConfig::default();
//!     let document = ExamDocument::resolve("exam.jpg", config.download_timeout_secs).await?;
//!     let recognition = recognize(&document, &config).await?;
//!
//!     let mut crops = ResolvedCropMap::new();
//!     let mut session = CropSession::new(&document, recognition.marker_count(), &mut crops, &config);
//!     session.start().await?;
//!     // ... drive pointer_down/move/up + confirm_current() per marker ...
//!
//!     let preview = mathscan::preview_text(&recognition.cleaned_text, &crops);
//!     println!("{preview}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mathscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mathscan = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod clipboard;
pub mod config;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod reassemble;
pub mod recognize;
pub mod resource;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use clipboard::write_payload;
pub use config::{ScanConfig, ScanConfigBuilder};
pub use document::{DocumentKind, ExamDocument};
pub use error::{CropError, MathScanError};
pub use pipeline::scanner::{scan, ScanOutcome, FIGURE_MARKER};
pub use pipeline::selector::{RegionSelector, SelectRect, SelectionState, SourceRect};
pub use pipeline::source::{Page, PageProvider};
pub use reassemble::{clipboard_payload, preview_text, ClipboardPayload};
pub use recognize::{recognize, Recognition};
pub use resource::{CropResource, ResolvedCropMap};
pub use session::{CropSession, SessionState};
