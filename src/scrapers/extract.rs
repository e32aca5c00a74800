//! Generic descriptor-driven extraction.
//!
//! One routine reads every programme page. The [`Descriptor`] of a source
//! says where its container is and which children hold the date, title and
//! body; this module only knows how to walk those instructions over a parsed
//! document. The document is never mutated.

use crate::error::ExtractError;
use crate::models::SourceRecord;
use crate::sources::{Anchor, Descriptor, FieldRule, GuestRule, NodeQuery, SourceSpec};
use crate::utils::element_text;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

fn selector(q: &NodeQuery) -> Result<Selector, ExtractError> {
    let css = q.css();
    Selector::parse(&css).map_err(|_| ExtractError::Selector(css.clone()))
}

/// Tag, class and text predicate of `q` against a single element.
fn matches(el: ElementRef<'_>, q: &NodeQuery) -> bool {
    let value = el.value();
    if value.name() != q.tag {
        return false;
    }
    if let Some(class) = &q.class {
        if !value.classes().any(|c| c == class.as_str()) {
            return false;
        }
    }
    match &q.text {
        Some(text) => element_text(el, false) == *text,
        None => true,
    }
}

/// First descendant of `scope` satisfying `q`.
fn find<'a>(scope: ElementRef<'a>, q: &NodeQuery) -> Result<Option<ElementRef<'a>>, ExtractError> {
    let sel = selector(q)?;
    Ok(scope.select(&sel).find(|el| matches(*el, q)))
}

fn locate_container<'a>(doc: &'a Html, anchor: &Anchor) -> Result<Option<ElementRef<'a>>, ExtractError> {
    let root = doc.root_element();
    match anchor {
        Anchor::Node { node } => find(root, node),
        Anchor::HeadingParent { heading, parent } => {
            let Some(h) = find(root, heading)? else {
                return Ok(None);
            };
            Ok(h.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| matches(*a, parent)))
        }
        Anchor::HeadingSibling { heading, sibling } => {
            let Some(h) = find(root, heading)? else {
                return Ok(None);
            };
            let next = h
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|s| matches(*s, sibling));
            Ok(next.filter(|s| s.select(&PARAGRAPH).next().is_some()))
        }
    }
}

/// Non-empty paragraph texts of the container, in document order.
fn paragraphs(container: ElementRef<'_>) -> Vec<String> {
    container
        .select(&PARAGRAPH)
        .map(|p| element_text(p, false))
        .filter(|t| !t.is_empty())
        .collect()
}

fn read_field(
    container: ElementRef<'_>,
    paras: &[String],
    rule: &FieldRule,
    field: &'static str,
) -> Result<String, ExtractError> {
    match rule {
        FieldRule::Fixed { text } => Ok(text.clone()),
        FieldRule::Paragraph { index } => paras
            .get(*index)
            .cloned()
            .ok_or(ExtractError::DetailNotFound),
        FieldRule::Child {
            within,
            node,
            line_breaks,
            fallback,
        } => {
            let scope = match within {
                Some(w) => find(container, w)?,
                None => Some(container),
            };
            let found = match scope {
                Some(scope) => find(scope, node)?,
                None => None,
            };
            match (found, fallback) {
                (Some(el), _) => Ok(element_text(el, *line_breaks)),
                (None, Some(fallback)) => Ok(fallback.clone()),
                (None, None) => Err(ExtractError::MissingField(field)),
            }
        }
    }
}

/// Guest line, present only when both company and name are on the page.
fn read_guest(container: ElementRef<'_>, rule: &GuestRule) -> Result<Option<String>, ExtractError> {
    let company = find(container, &rule.company)?;
    let name = find(container, &rule.name)?;
    Ok(match (company, name) {
        (Some(company), Some(name)) => Some(format!(
            "{}{} {}",
            rule.prefix,
            element_text(company, false),
            element_text(name, false)
        )),
        _ => None,
    })
}

fn extract_fields(doc: &Html, d: &Descriptor) -> Result<(String, String), ExtractError> {
    let container = locate_container(doc, &d.anchor)?.ok_or(ExtractError::SectionNotFound)?;

    let paras = paragraphs(container);
    if paras.len() < d.min_paragraphs {
        debug!(found = paras.len(), required = d.min_paragraphs, "Too few paragraphs");
        return Err(ExtractError::DetailNotFound);
    }

    let date = read_field(container, &paras, &d.date, "date")?;
    let title = d
        .title
        .as_ref()
        .map(|rule| read_field(container, &paras, rule, "title"))
        .transpose()?;
    let body = d
        .body
        .as_ref()
        .map(|rule| read_field(container, &paras, rule, "body"))
        .transpose()?;
    let guest = match &d.guest {
        Some(rule) => read_guest(container, rule)?,
        None => None,
    };

    let text = [title, body, guest]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .join("\n");
    Ok((date, text))
}

/// Extract the preview of `spec` from a parsed page.
///
/// Returns a tagged [`ExtractError`] instead of a record when the page does not
/// have the expected shape; see [`super::into_record`] for how each tag is
/// rendered.
#[instrument(level = "debug", skip_all, fields(source = %spec.label))]
pub fn extract(doc: &Html, spec: &SourceSpec) -> Result<SourceRecord, ExtractError> {
    let (date, body) = extract_fields(doc, &spec.extract)?;
    Ok(SourceRecord::new(&spec.label, date, body, &spec.url))
}
