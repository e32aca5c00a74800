//! Declarative descriptions of the programme pages to scrape.
//!
//! Every source is a [`SourceSpec`]: where the page lives, how long to wait
//! for it, whether to retry, and a [`Descriptor`] telling the generic
//! extraction routine in [`crate::scrapers`] which nodes hold the preview.
//!
//! The built-in list lives in `sources.yaml` next to this module and can be
//! replaced at runtime with `--sources <file>`. The order of the list is the
//! order of blocks in the digest.

use crate::error::ConfigError;
use scraper::Selector;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

const BUILTIN_SOURCES: &str = include_str!("sources.yaml");

/// Matches an element by tag, optional class and optional exact text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeQuery {
    pub tag: String,
    #[serde(default)]
    pub class: Option<String>,
    /// Exact trimmed text the element must carry (used for headings).
    #[serde(default)]
    pub text: Option<String>,
}

impl NodeQuery {
    /// CSS form of the tag/class part of the query.
    pub fn css(&self) -> String {
        match &self.class {
            Some(class) => format!("{}.{}", self.tag, class),
            None => self.tag.clone(),
        }
    }
}

/// How the container node anchoring a preview is located.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    /// First element matching `node`.
    Node { node: NodeQuery },
    /// A heading, then its nearest ancestor matching `parent`.
    HeadingParent { heading: NodeQuery, parent: NodeQuery },
    /// A heading, then its first following sibling matching `sibling`
    /// that contains a paragraph.
    HeadingSibling { heading: NodeQuery, sibling: NodeQuery },
}

/// How a single field is read out of the container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldRule {
    /// Text of `node`, optionally looked up inside `within` first.
    Child {
        #[serde(default)]
        within: Option<NodeQuery>,
        node: NodeQuery,
        /// Join text fragments with newlines so `<br>` survives.
        #[serde(default)]
        line_breaks: bool,
        /// Used when a node is missing; without it the field is required.
        #[serde(default)]
        fallback: Option<String>,
    },
    /// The n-th non-empty paragraph of the container.
    Paragraph { index: usize },
    /// Constant text, for pages that publish no usable field.
    Fixed { text: String },
}

/// Appends a guest line only when both sub-nodes are present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuestRule {
    pub company: NodeQuery,
    pub name: NodeQuery,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Descriptor {
    pub anchor: Anchor,
    pub date: FieldRule,
    #[serde(default)]
    pub title: Option<FieldRule>,
    #[serde(default)]
    pub body: Option<FieldRule>,
    #[serde(default)]
    pub guest: Option<GuestRule>,
    /// Fewer non-empty paragraphs than this means "detail not found".
    #[serde(default)]
    pub min_paragraphs: usize,
}

/// What a wait-for-element timeout means for a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// The preview is considered absent: a "section not found" record.
    #[default]
    TreatAsAbsent,
    /// The timeout is reported as an error placeholder.
    TreatAsError,
}

/// Bounded fixed-delay retry around the page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

/// One programme page and how to read its preview.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub label: String,
    pub url: String,
    /// CSS selector that must be present before the page counts as loaded.
    #[serde(default)]
    pub wait_for: Option<String>,
    #[serde(default)]
    pub on_timeout: TimeoutPolicy,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    pub extract: Descriptor,
}

/// The eight built-in sources in digest order.
pub fn builtin() -> Result<Vec<SourceSpec>, ConfigError> {
    parse_sources(BUILTIN_SOURCES)
}

/// Load a source list from a YAML file, or the built-in list when `path` is `None`.
#[instrument(level = "info")]
pub fn load(path: Option<&str>) -> Result<Vec<SourceSpec>, ConfigError> {
    let sources = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_string(),
                source,
            })?;
            parse_sources(&raw)?
        }
        None => builtin()?,
    };
    info!(count = sources.len(), custom = path.is_some(), "Loaded source list");
    Ok(sources)
}

/// Parse and validate a YAML source list.
pub fn parse_sources(raw: &str) -> Result<Vec<SourceSpec>, ConfigError> {
    let sources: Vec<SourceSpec> = serde_yaml::from_str(raw)?;
    let mut seen = HashSet::new();
    for spec in &sources {
        validate(spec)?;
        if !seen.insert(spec.label.as_str()) {
            return Err(invalid(spec, "duplicate label"));
        }
        debug!(label = %spec.label, url = %spec.url, "Validated source");
    }
    Ok(sources)
}

fn invalid(spec: &SourceSpec, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        label: spec.label.clone(),
        reason: reason.into(),
    }
}

fn validate(spec: &SourceSpec) -> Result<(), ConfigError> {
    if spec.label.trim().is_empty() {
        return Err(invalid(spec, "label is empty"));
    }
    let url = Url::parse(&spec.url).map_err(|e| invalid(spec, format!("bad url: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(spec, format!("unsupported scheme {}", url.scheme())));
    }
    if let Some(retry) = spec.retry {
        if retry.max_attempts == 0 {
            return Err(invalid(spec, "retry.max_attempts must be at least 1"));
        }
    }
    if let Some(selector) = &spec.wait_for {
        check_selector(spec, selector)?;
    }

    let d = &spec.extract;
    if d.title.is_none() && d.body.is_none() {
        return Err(invalid(spec, "needs a title or body rule"));
    }

    let mut queries: Vec<&NodeQuery> = Vec::new();
    match &d.anchor {
        Anchor::Node { node } => queries.push(node),
        Anchor::HeadingParent { heading, parent } => queries.extend([heading, parent]),
        Anchor::HeadingSibling { heading, sibling } => queries.extend([heading, sibling]),
    }
    for rule in [Some(&d.date), d.title.as_ref(), d.body.as_ref()].into_iter().flatten() {
        if let FieldRule::Child { within, node, .. } = rule {
            queries.extend(within.iter());
            queries.push(node);
        }
    }
    if let Some(guest) = &d.guest {
        queries.extend([&guest.company, &guest.name]);
    }
    for q in queries {
        check_selector(spec, &q.css())?;
    }
    Ok(())
}

fn check_selector(spec: &SourceSpec, css: &str) -> Result<(), ConfigError> {
    Selector::parse(css)
        .map(|_| ())
        .map_err(|e| invalid(spec, format!("bad selector {css:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sources_parse_in_order() {
        let sources = builtin().unwrap();
        let labels: Vec<&str> = sources.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "WBS",
                "モーサテ",
                "昼サテ",
                "カンブリア宮殿",
                "ガイアの夜明け",
                "知られざるガリバー",
                "ブレイクスルー",
                "マネーのまなび",
            ]
        );
    }

    #[test]
    fn test_only_money_source_retries() {
        let sources = builtin().unwrap();
        let retrying: Vec<&SourceSpec> = sources.iter().filter(|s| s.retry.is_some()).collect();
        assert_eq!(retrying.len(), 1);
        assert_eq!(retrying[0].label, "マネーのまなび");
        assert_eq!(
            retrying[0].retry,
            Some(RetryPolicy {
                max_attempts: 3,
                backoff_secs: 3
            })
        );
        assert_eq!(retrying[0].wait_for.as_deref(), Some("div.next-program"));
    }

    #[test]
    fn test_gulliver_anchor_is_heading_parent() {
        let sources = builtin().unwrap();
        let gulliver = sources.iter().find(|s| s.label == "知られざるガリバー").unwrap();
        match &gulliver.extract.anchor {
            Anchor::HeadingParent { heading, parent } => {
                assert_eq!(heading.text.as_deref(), Some("次回予告"));
                assert_eq!(parent.css(), "div.tbcms_official-contents__block");
            }
            other => panic!("unexpected anchor {other:?}"),
        }
        assert_eq!(gulliver.extract.min_paragraphs, 2);
    }

    #[test]
    fn test_node_query_css() {
        let q = NodeQuery {
            tag: "span".to_string(),
            class: Some("date".to_string()),
            text: None,
        };
        assert_eq!(q.css(), "span.date");
        let bare = NodeQuery {
            tag: "p".to_string(),
            class: None,
            text: None,
        };
        assert_eq!(bare.css(), "p");
    }

    #[test]
    fn test_rejects_bad_url() {
        let yaml = r#"
- label: X
  url: ftp://example.com/
  extract:
    anchor: { kind: node, node: { tag: div } }
    date: { kind: fixed, text: today }
    body: { kind: paragraph, index: 0 }
"#;
        let err = parse_sources(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn test_rejects_duplicate_labels() {
        let yaml = r#"
- label: X
  url: https://example.com/a
  extract:
    anchor: { kind: node, node: { tag: div } }
    date: { kind: fixed, text: today }
    body: { kind: paragraph, index: 0 }
- label: X
  url: https://example.com/b
  extract:
    anchor: { kind: node, node: { tag: div } }
    date: { kind: fixed, text: today }
    body: { kind: paragraph, index: 0 }
"#;
        let err = parse_sources(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate label"));
    }

    #[test]
    fn test_rejects_zero_attempts_and_missing_body() {
        let zero = r#"
- label: X
  url: https://example.com/a
  retry: { max_attempts: 0, backoff_secs: 1 }
  extract:
    anchor: { kind: node, node: { tag: div } }
    date: { kind: fixed, text: today }
    body: { kind: paragraph, index: 0 }
"#;
        assert!(parse_sources(zero).is_err());

        let no_body = r#"
- label: X
  url: https://example.com/a
  extract:
    anchor: { kind: node, node: { tag: div } }
    date: { kind: fixed, text: today }
"#;
        assert!(parse_sources(no_body).unwrap_err().to_string().contains("title or body"));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let yaml = r#"
- label: X
  url: https://example.com/a
  colour: blue
  extract:
    anchor: { kind: node, node: { tag: div } }
    date: { kind: fixed, text: today }
    body: { kind: paragraph, index: 0 }
"#;
        assert!(matches!(parse_sources(yaml).unwrap_err(), ConfigError::Yaml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.yaml");
        std::fs::write(
            &path,
            r#"
- label: Only
  url: https://example.com/only
  on_timeout: treat_as_error
  extract:
    anchor: { kind: node, node: { tag: main } }
    date: { kind: paragraph, index: 0 }
    body: { kind: paragraph, index: 1 }
"#,
        )
        .unwrap();
        let sources = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].on_timeout, TimeoutPolicy::TreatAsError);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Some("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
