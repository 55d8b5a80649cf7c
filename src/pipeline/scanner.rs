//! Placeholder scanning: deterministic cleanup of recognition output and
//! location of figure markers.
//!
//! ## Why is cleanup necessary?
//!
//! Even a well-prompted vision model occasionally introduces artefacts that
//! are *semantically correct* from the model's perspective but break the
//! Word-paste workflow:
//!
//! - Wrapping the whole transcript in ` ``` ` fences despite the prompt
//! - Backtick-quoting the `${ … }$` math delimiters it was told not to quote
//! - Bolding question labels with `**` which Word copies as literal asterisks
//!
//! The rules here are cheap, deterministic string/regex passes that fix
//! those quirks without touching content, in the spirit of keeping the
//! prompt focused on *what to transcribe* rather than formatting
//! edge-cases. Each rule is a pure `&str → String` function and the whole
//! pipeline is idempotent: cleaning already-clean text changes nothing.
//!
//! After cleanup, every occurrence of the figure marker token is located by
//! byte offset. Marker identity is purely positional — the ordinal of the
//! occurrence — so the count must be recomputed from scratch whenever the
//! upstream text changes.

use once_cell::sync::Lazy;
use regex::Regex;

/// The literal token the recognition service inserts where a figure,
/// graph, or variation table appears in the source image.
pub const FIGURE_MARKER: &str = "[[CHÈN_HÌNH]]";

/// Result of scanning recognition output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// The transcript after cleanup, with marker tokens still in place.
    pub cleaned_text: String,
    /// Byte offset of each marker occurrence in `cleaned_text`, in order
    /// of appearance. The length of this list is the marker count.
    pub marker_positions: Vec<usize>,
}

impl ScanOutcome {
    /// Number of figure markers in the cleaned text.
    pub fn marker_count(&self) -> usize {
        self.marker_positions.len()
    }
}

/// Clean the raw recognition output and locate every figure marker.
pub fn scan(text: &str) -> ScanOutcome {
    let cleaned_text = clean_text(text);
    let marker_positions = find_markers(&cleaned_text);
    ScanOutcome {
        cleaned_text,
        marker_positions,
    }
}

/// Apply all cleanup rules in order.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip code-fence lines the model wrapped the output in
/// 3. Unwrap backtick-quoted math delimiters (`` `${ `` → `${`, `` }$` `` → `}$`)
/// 4. Strip `**` bold markers
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    let s = unwrap_math_delimiters(&s);
    strip_bold_markers(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip code fences ────────────────────────────────────────────

static RE_FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^```[a-z]*\n").unwrap());
static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)```$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let s = RE_FENCE_OPEN.replace_all(input, "");
    RE_FENCE_CLOSE.replace_all(&s, "").to_string()
}

// ── Rule 3: Unwrap backtick-quoted math delimiters ───────────────────────
//
// The prompt asks for `${ formula }$` but models intermittently quote the
// delimiters as inline code. Word-side converters then see the backticks
// as literal text and the formula is lost.

static RE_TICK_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`\s*\$\{").unwrap());
static RE_TICK_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\$\s*`").unwrap());

fn unwrap_math_delimiters(input: &str) -> String {
    let s = RE_TICK_OPEN.replace_all(input, "${");
    RE_TICK_CLOSE.replace_all(&s, "}$").to_string()
}

// ── Rule 4: Strip bold markers ───────────────────────────────────────────

fn strip_bold_markers(input: &str) -> String {
    input.replace("**", "")
}

/// Byte offsets of every marker occurrence, in order of appearance.
fn find_markers(text: &str) -> Vec<usize> {
    text.match_indices(FIGURE_MARKER).map(|(i, _)| i).collect()
}
