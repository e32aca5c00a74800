//! Error types for configuration, page fetching, extraction and delivery.
//!
//! Only [`ConfigError`] is allowed to end a run, and only at start-up. Every
//! other error is recovered where it happens: extraction errors become
//! placeholder text in the digest and delivery errors are logged.

use thiserror::Error;

/// Start-up configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("required setting {0} is not set")]
    Missing(&'static str),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid source list: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The source list parsed but describes something unusable.
    #[error("invalid source {label:?}: {reason}")]
    Invalid { label: String, reason: String },
}

/// Failures while retrieving a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The awaited element never appeared.
    #[error("timed out after {secs}s waiting for {selector:?}")]
    Timeout { selector: String, secs: u64 },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with HTTP {status}")]
    Status { status: u16, url: String },

    #[error("browserless error (status {status}): {message}")]
    Browserless { status: u16, message: String },

    #[error("invalid wait selector {0:?}")]
    Selector(String),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    /// Whether the awaited element never appeared. Request-level timeouts
    /// are transport failures and do not count.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

/// Tagged reasons an extraction produced no record.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The container node anchoring the preview is absent.
    #[error("section not found")]
    SectionNotFound,

    /// The container exists but holds too few usable paragraphs.
    #[error("broadcast date or detail not found")]
    DetailNotFound,

    #[error("missing {0} node")]
    MissingField(&'static str),

    #[error("invalid selector {0:?}")]
    Selector(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Push API delivery failures.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push API error (status {status}): {message}")]
    Api { status: u16, message: String },
}
