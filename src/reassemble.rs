//! Document reassembly: merge the cleaned transcript with resolved crops.
//!
//! Two output modes derive from the same inputs, replacing each marker
//! occurrence in left-to-right order with a counter that matches the
//! marker's ordinal index:
//!
//! * **Preview** — Markdown for an on-screen render: resolved markers
//!   become inline images (data URIs), unresolved ones a bracketed
//!   stand-in. Raw marker tokens never survive.
//! * **Clipboard** — a rich HTML body with embedded images next to the
//!   text, plus the cleaned transcript unchanged as the plain-text
//!   fallback for paste targets that cannot accept rich content.

use crate::pipeline::scanner::FIGURE_MARKER;
use crate::resource::ResolvedCropMap;

/// Build the preview text: markers replaced by images or stand-ins.
///
/// The `${ … }$` Word-oriented math delimiters are relaxed to plain `$`
/// so a Markdown+KaTeX preview surface renders the formulae; the raw
/// transcript (and the clipboard plain text) keep the original form.
pub fn preview_text(cleaned: &str, crops: &ResolvedCropMap) -> String {
    let mut out = String::with_capacity(cleaned.len());
    for (index, part) in cleaned.split(FIGURE_MARKER).enumerate() {
        if index > 0 {
            let marker = index - 1;
            match crops.get(marker) {
                Some(resource) => {
                    out.push_str(&format!(
                        "\n![Hình {}]({})\n",
                        marker + 1,
                        resource.data_uri()
                    ));
                }
                None => {
                    out.push_str(&format!("\n**[Vị trí hình ảnh số {}]**\n", marker + 1));
                }
            }
        }
        out.push_str(part);
    }
    out.replace("${", "$").replace("}$", "$")
}

/// A multi-representation clipboard payload.
#[derive(Debug, Clone)]
pub struct ClipboardPayload {
    /// Rich HTML with embedded images, for Word-like targets.
    pub html: String,
    /// The cleaned transcript unchanged, for targets without rich paste.
    pub plain: String,
}

/// Build the clipboard payload from the cleaned transcript and crop map.
///
/// The HTML is line-oriented: every non-empty transcript line becomes a
/// `<p>`, with its text HTML-escaped. A resolved marker is replaced by an
/// embedded `<img>` (data URI, fixed display width); an unresolved marker
/// by a bold inline stand-in.
pub fn clipboard_payload(
    cleaned: &str,
    crops: &ResolvedCropMap,
    image_width: u32,
) -> ClipboardPayload {
    let mut html = String::from(
        "<html><body><style>img { max-width: 100%; height: auto; display: block; margin: 10px 0; }</style>",
    );

    let mut marker_counter = 0usize;
    for line in cleaned.split('\n') {
        let mut line_html = String::new();
        if line.contains(FIGURE_MARKER) {
            let parts: Vec<&str> = line.split(FIGURE_MARKER).collect();
            for (i, part) in parts.iter().enumerate() {
                line_html.push_str(&escape_html(part));
                if i + 1 < parts.len() {
                    match crops.get(marker_counter) {
                        Some(resource) => {
                            line_html.push_str(&format!(
                                "<br/><img src=\"{}\" alt=\"Image\" width=\"{}\" /><br/>",
                                resource.data_uri(),
                                image_width
                            ));
                        }
                        None => {
                            line_html.push_str(" <b>[Hình ảnh]</b> ");
                        }
                    }
                    marker_counter += 1;
                }
            }
        } else {
            line_html = escape_html(line);
        }

        if !line_html.trim().is_empty() {
            html.push_str("<p>");
            html.push_str(&line_html);
            html.push_str("</p>");
        }
    }

    html.push_str("</body></html>");

    ClipboardPayload {
        html,
        plain: cleaned.to_string(),
    }
}

/// Escape text for inclusion in HTML.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::CropResource;

    fn map_with(indices: &[usize]) -> ResolvedCropMap {
        let mut map = ResolvedCropMap::new();
        for &i in indices {
            map.insert(i, CropResource::new(b"\x89PNGfake".to_vec(), 20, 10));
        }
        map
    }

    #[test]
    fn preview_mixes_images_and_standins() {
        let cleaned = format!("Câu 1 {FIGURE_MARKER} a\nCâu 2 {FIGURE_MARKER} b");
        let out = preview_text(&cleaned, &map_with(&[0]));
        assert!(out.contains("![Hình 1](data:image/png;base64,"));
        assert!(out.contains("**[Vị trí hình ảnh số 2]**"));
        assert!(!out.contains(FIGURE_MARKER));
    }

    #[test]
    fn preview_relaxes_math_delimiters() {
        let out = preview_text("Giải ${ x^2 = 1 }$.", &ResolvedCropMap::new());
        assert_eq!(out, "Giải $ x^2 = 1 $.");
    }

    #[test]
    fn preview_without_markers_is_text_only() {
        let out = preview_text("không có hình", &map_with(&[0]));
        assert_eq!(out, "không có hình");
    }

    #[test]
    fn clipboard_embeds_resolved_crop() {
        let cleaned = format!("Câu 1 {FIGURE_MARKER} xong");
        let payload = clipboard_payload(&cleaned, &map_with(&[0]), 300);
        assert_eq!(payload.html.matches("<img").count(), 1);
        assert!(payload.html.contains("width=\"300\""));
        assert!(payload.html.contains("data:image/png;base64,"));
        assert!(!payload.html.contains(FIGURE_MARKER));
        assert_eq!(payload.plain, cleaned);
    }

    #[test]
    fn clipboard_unresolved_marker_is_bold_standin() {
        let cleaned = format!("Câu 1 {FIGURE_MARKER} xong");
        let payload = clipboard_payload(&cleaned, &ResolvedCropMap::new(), 300);
        assert!(payload.html.contains("<b>[Hình ảnh]</b>"));
        assert!(!payload.html.contains("<img"));
        assert!(!payload.html.contains(FIGURE_MARKER));
    }

    #[test]
    fn clipboard_escapes_text() {
        let payload = clipboard_payload("x < 1 && y > 2", &ResolvedCropMap::new(), 300);
        assert!(payload.html.contains("x &lt; 1 &amp;&amp; y &gt; 2"));
    }

    #[test]
    fn clipboard_skips_blank_lines() {
        let payload = clipboard_payload("a\n\n\nb", &ResolvedCropMap::new(), 300);
        assert_eq!(payload.html.matches("<p>").count(), 2);
    }

    #[test]
    fn clipboard_counts_markers_across_lines() {
        let cleaned = format!("a {FIGURE_MARKER}\nb {FIGURE_MARKER}");
        let payload = clipboard_payload(&cleaned, &map_with(&[1]), 300);
        // Marker 0 unresolved, marker 1 resolved: one stand-in, one image.
        assert_eq!(payload.html.matches("<img").count(), 1);
        assert_eq!(payload.html.matches("<b>[Hình ảnh]</b>").count(), 1);
    }

    #[test]
    fn marker_ordinals_follow_text_order() {
        let cleaned = format!("{FIGURE_MARKER}{FIGURE_MARKER}");
        let mut map = ResolvedCropMap::new();
        map.insert(0, CropResource::new(b"first".to_vec(), 1, 1));
        let out = preview_text(&cleaned, &map);
        // The resolved image comes first, the stand-in second.
        let img_at = out.find("![Hình 1]").unwrap();
        let standin_at = out.find("[Vị trí hình ảnh số 2]").unwrap();
        assert!(img_at < standin_at);
    }
}
