//! Utility functions for text normalization and length handling.
//!
//! - Element text normalization (trim every fragment, optional line breaks)
//! - Character-based truncation for log previews and the digest limit
//! - Recipient list parsing

use itertools::Itertools;
use scraper::ElementRef;

/// Collect the text of an element the way the pages are meant to be read.
///
/// Every text fragment is trimmed and empty fragments are dropped. Fragments
/// are joined with `"\n"` when `line_breaks` is set, so a `<br>` between two
/// lines survives as a newline, and with nothing otherwise.
///
/// # Examples
///
/// ```ignore
/// // <h3> 社長が語る<br>次の一手 </h3>
/// assert_eq!(element_text(h3, true), "社長が語る\n次の一手");
/// assert_eq!(element_text(h3, false), "社長が語る次の一手");
/// ```
pub fn element_text(element: ElementRef<'_>, line_breaks: bool) -> String {
    let separator = if line_breaks { "\n" } else { "" };
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .join(separator)
}

/// Keep at most `max` characters of `s`.
///
/// Counts Unicode scalar values rather than bytes, so multi-byte text is never
/// split inside a character.
pub fn take_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the characters left out.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        format!("{}…(+{} chars)", take_chars(s, max), total - max)
    }
}

/// Split a comma-separated recipient list.
///
/// Whitespace around each ID is trimmed, blank entries are dropped and
/// duplicates are removed while keeping the first occurrence.
pub fn parse_recipients<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .flat_map(|s| s.as_ref().split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}
