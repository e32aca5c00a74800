//! Digest formatting.
//!
//! Turns the ordered `(label, record)` pairs of one run into the single text
//! message that is pushed to recipients:
//!
//! ```text
//! 今日のテレビ番組情報です！ (2026-10-19)
//!
//! ===============
//! ## WBS ##  10月19日(月)
//!
//! 番組の見どころ
//! 円安はどこまで進むのか。
//!
//! https://www.tv-tokyo.co.jp/wbs/
//! ...
//! ```
//!
//! Blocks are built as separate values and joined once. The result never
//! exceeds [`MAX_CHARS`] characters, the LINE text message limit.

use crate::models::SourceRecord;
use crate::utils::take_chars;
use chrono::NaiveDate;
use itertools::Itertools;

/// Upper bound on the digest length, in characters.
pub const MAX_CHARS: usize = 5000;

/// Characters kept from an over-long digest before the marker is appended.
pub const TRUNCATE_AT: usize = 4990;

/// Appended to a truncated digest; exactly `MAX_CHARS - TRUNCATE_AT` characters.
pub const TRUNCATION_MARKER: &str = "\n\n…(文字数制限)";

/// Line separating source blocks.
pub const SEPARATOR: &str = "===============";

/// First line of every digest.
pub fn header(date: NaiveDate) -> String {
    format!("今日のテレビ番組情報です！ ({})", date.format("%Y-%m-%d"))
}

/// Format one source as a titled block, leading blank line included.
pub fn format_block(label: &str, record: &SourceRecord) -> String {
    format!(
        "\n\n{SEPARATOR}\n## {label} ##  {}\n\n{}\n\n{}",
        record.date, record.body, record.url
    )
}

/// Cut `message` to the digest limit, marking the cut.
pub fn truncate(message: String) -> String {
    if message.chars().count() <= MAX_CHARS {
        return message;
    }
    let mut out = take_chars(&message, TRUNCATE_AT).to_string();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Build the digest from a header and records in their fixed order.
///
/// Identical inputs always produce identical output.
pub fn build(header: &str, records: &[(String, SourceRecord)]) -> String {
    let blocks = records
        .iter()
        .map(|(label, record)| format_block(label, record))
        .collect::<Vec<_>>();
    let message = std::iter::once(header.to_string()).chain(blocks).join("");
    truncate(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, date: &str, body: &str) -> (String, SourceRecord) {
        (
            name.to_string(),
            SourceRecord::new(name, date, body, format!("https://example.com/{name}/")),
        )
    }

    #[test]
    fn test_marker_fills_the_gap() {
        assert_eq!(TRUNCATION_MARKER.chars().count(), MAX_CHARS - TRUNCATE_AT);
    }

    #[test]
    fn test_header_format() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(header(d), "今日のテレビ番組情報です！ (2026-10-19)");
    }

    #[test]
    fn test_block_layout() {
        let (label, r) = record("WBS", "10月19日(月)", "見どころ");
        assert_eq!(
            format_block(&label, &r),
            "\n\n===============\n## WBS ##  10月19日(月)\n\n見どころ\n\nhttps://example.com/WBS/"
        );
    }

    #[test]
    fn test_build_is_plain_concatenation_under_limit() {
        let records = vec![record("A", "d1", "b1"), record("B", "d2", "b2")];
        let out = build("H", &records);
        let expected = format!(
            "H{}{}",
            format_block("A", &records[0].1),
            format_block("B", &records[1].1)
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_build_is_deterministic() {
        let records = vec![record("A", "d1", "b1"), record("B", "d2", "b2")];
        assert_eq!(build("H", &records), build("H", &records));
    }

    #[test]
    fn test_build_keeps_given_order() {
        let records = vec![record("Z", "d", "b"), record("A", "d", "b")];
        let out = build("H", &records);
        assert!(out.find("## Z ##").unwrap() < out.find("## A ##").unwrap());
    }

    #[test]
    fn test_build_truncates_long_digest() {
        let records: Vec<_> = (0..8)
            .map(|i| record(&format!("S{i}"), "日付", &"長".repeat(1000)))
            .collect();
        let out = build("H", &records);
        assert_eq!(out.chars().count(), MAX_CHARS);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_boundary() {
        let exact = "a".repeat(MAX_CHARS);
        assert_eq!(truncate(exact.clone()), exact);

        let over = "あ".repeat(MAX_CHARS + 1);
        let out = truncate(over);
        assert_eq!(out.chars().count(), MAX_CHARS);
        assert!(out.starts_with(&"あ".repeat(TRUNCATE_AT)));
    }

    #[test]
    fn test_build_with_no_records_is_header() {
        assert_eq!(build("H", &[]), "H");
    }
}
