//! Clipboard boundary: write the multi-representation payload.
//!
//! The rich write carries both the HTML body and the plain-text alternate
//! in one clipboard item, so Word-like targets paste text with embedded
//! images while plain editors get the transcript. If the rich write is
//! unavailable or fails, the plain text is written alone — losing the
//! images must never lose the copy operation itself.

use crate::error::MathScanError;
use crate::reassemble::ClipboardPayload;
use tracing::{debug, warn};

/// Write the payload to the system clipboard.
///
/// Tries the rich (HTML + plain alternate) write first and falls back to
/// a plain-text-only write. Only a failure of both is an error.
pub fn write_payload(payload: &ClipboardPayload) -> Result<(), MathScanError> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| MathScanError::ClipboardWriteFailed {
            detail: format!("clipboard unavailable: {}", e),
        })?;

    match clipboard.set_html(&payload.html, Some(&payload.plain)) {
        Ok(()) => {
            debug!(
                "Clipboard: rich write ({} bytes html, {} bytes plain)",
                payload.html.len(),
                payload.plain.len()
            );
            Ok(())
        }
        Err(e) => {
            warn!("Rich clipboard write failed, falling back to plain text: {}", e);
            clipboard
                .set_text(&payload.plain)
                .map_err(|e2| MathScanError::ClipboardWriteFailed {
                    detail: format!("rich write: {}; plain fallback: {}", e, e2),
                })
        }
    }
}
