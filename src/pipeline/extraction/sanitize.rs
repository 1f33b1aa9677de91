use std::sync::LazyLock;

use regex::Regex;

/// Default per-document character cap.
pub const DEFAULT_DOCUMENT_CHAR_CAP: usize = 12_000;

/// Inserted between head and tail when text is elided.
pub const ELISION_MARKER: &str = "\n...\n";

static BLANK_LINE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static HORIZONTAL_WS_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

/// Collapse 3+ newlines to 2, runs of spaces/tabs to one space, then trim.
pub fn normalize_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = BLANK_LINE_RUNS.replace_all(&text, "\n\n");
    let text = HORIZONTAL_WS_RUNS.replace_all(&text, " ");
    text.trim().to_string()
}

/// Elide the middle of `text` when it exceeds `cap` characters.
///
/// Keeps `cap / 2` characters from each end, so the result is at most
/// `cap + ELISION_MARKER.len()` characters. Returns `(text, truncated)`.
pub fn cap_text(text: &str, cap: usize) -> (String, bool) {
    let total = text.chars().count();
    if total <= cap {
        return (text.to_string(), false);
    }

    let half = cap / 2;
    let head_end = text
        .char_indices()
        .nth(half)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let tail_start = text
        .char_indices()
        .nth(total - half)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    tracing::debug!(
        original_chars = total,
        cap,
        "Text over cap, eliding middle"
    );

    let mut capped = String::with_capacity(head_end + ELISION_MARKER.len() + (text.len() - tail_start));
    capped.push_str(&text[..head_end]);
    capped.push_str(ELISION_MARKER);
    capped.push_str(&text[tail_start..]);
    (capped, true)
}
