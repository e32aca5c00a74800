//! Data models for extracted previews.
//!
//! - [`SourceRecord`]: the normalized preview extracted from one programme page
//! - Placeholder constants used when a page does not yield a preview
//!
//! A record is built once per source per run and never mutated afterwards.

/// Date shown when a preview could not be located.
pub const UNKNOWN_DATE: &str = "日付不明";

/// Body shown when the container node anchoring a preview is absent.
pub const SECTION_NOT_FOUND: &str = "次回予告セクションが見つかりませんでした。";

/// Body shown when the container exists but holds no usable date/detail.
pub const DETAIL_NOT_FOUND: &str = "放送日や詳細情報が見つかりませんでした。";

/// Date shown when extraction failed with an error.
pub const ERROR_DATE: &str = "取得エラー";

/// A normalized "next episode" preview for one source.
///
/// # Fields
///
/// * `source_name` - The label of the source this record came from
/// * `date` - Broadcast date line, or a placeholder
/// * `body` - Title and description text, or a placeholder
/// * `url` - The page the preview was scraped from
/// * `placeholder` - Set by the placeholder constructors only; a real preview
///   whose date fell back to text such as [`UNKNOWN_DATE`] stays `false`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub source_name: String,
    pub date: String,
    pub body: String,
    pub url: String,
    pub placeholder: bool,
}

impl SourceRecord {
    pub fn new(
        source_name: impl Into<String>,
        date: impl Into<String>,
        body: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            date: date.into(),
            body: body.into(),
            url: url.into(),
            placeholder: false,
        }
    }

    fn placeholder(mut self) -> Self {
        self.placeholder = true;
        self
    }

    /// Record for a page whose preview container is missing.
    pub fn section_not_found(source_name: &str, url: &str) -> Self {
        Self::new(source_name, UNKNOWN_DATE, SECTION_NOT_FOUND, url).placeholder()
    }

    /// Record for a container that lacks the date/detail paragraphs.
    pub fn detail_not_found(source_name: &str, url: &str) -> Self {
        Self::new(source_name, UNKNOWN_DATE, DETAIL_NOT_FOUND, url).placeholder()
    }

    /// Record carrying an error description in place of the preview.
    pub fn failed(source_name: &str, url: &str, error: &dyn std::fmt::Display) -> Self {
        Self::new(
            source_name,
            ERROR_DATE,
            format!("{source_name}の処理中にエラーが発生: {error}"),
            url,
        )
        .placeholder()
    }

    /// Whether this record stands in for a preview that was not extracted.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}
