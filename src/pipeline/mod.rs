//! Pipeline stages for the crop-and-reconcile flow.
//!
//! Each submodule implements exactly one transformation step, so every
//! stage is independently testable and a backend can be swapped (e.g. a
//! different rasteriser) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! recognition text ──▶ scanner ──▶ marker list
//!                                      │
//! document ──▶ source ──▶ page ──▶ selector ──▶ crop resource
//!                                      │
//!                          (session controller drives both)
//! ```
//!
//! 1. [`scanner`]  — clean the recognition output and locate every figure
//!    marker by byte offset
//! 2. [`source`]   — uniform raster-page access over an image or a PDF;
//!    PDF pages render in `spawn_blocking` because pdfium is not async-safe
//! 3. [`selector`] — the drag-rectangle state machine, the display-space →
//!    source-space transform, and the actual pixel crop + PNG encode

pub mod scanner;
pub mod selector;
pub mod source;
