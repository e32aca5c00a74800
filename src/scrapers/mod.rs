//! Programme page scrapers.
//!
//! Every source goes through the same two-phase pattern:
//!
//! 1. **Fetching**: retrieve the page through a [`fetch::PageFetcher`],
//!    optionally waiting for an element and retrying transient failures
//! 2. **Extraction**: walk the source's descriptor over the parsed page
//!    ([`extract::extract`])
//!
//! The outcome of both phases is folded into a [`SourceRecord`] by
//! [`into_record`], so a broken page never stops the other sources.
//!
//! # Outcomes
//!
//! | Outcome | Date | Body |
//! |---------|------|------|
//! | Preview found | page date | title / body / guest lines |
//! | Container absent | [`UNKNOWN_DATE`] | [`SECTION_NOT_FOUND`] |
//! | Too few paragraphs | [`UNKNOWN_DATE`] | [`DETAIL_NOT_FOUND`] |
//! | Wait timed out, `treat_as_absent` | [`UNKNOWN_DATE`] | [`SECTION_NOT_FOUND`] |
//! | Any other error | [`ERROR_DATE`] | error description |
//!
//! [`UNKNOWN_DATE`]: crate::models::UNKNOWN_DATE
//! [`SECTION_NOT_FOUND`]: crate::models::SECTION_NOT_FOUND
//! [`DETAIL_NOT_FOUND`]: crate::models::DETAIL_NOT_FOUND
//! [`ERROR_DATE`]: crate::models::ERROR_DATE

pub mod extract;
pub mod fetch;

use crate::error::ExtractError;
use crate::models::SourceRecord;
use crate::sources::{SourceSpec, TimeoutPolicy};
use fetch::{PageFetcher, RetryFetch};
use scraper::Html;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Render an extraction outcome as a record. Never fails.
pub fn into_record(spec: &SourceSpec, outcome: Result<SourceRecord, ExtractError>) -> SourceRecord {
    let label = spec.label.as_str();
    let url = spec.url.as_str();
    match outcome {
        Ok(record) => record,
        Err(ExtractError::SectionNotFound) => {
            warn!(source = label, "Preview section not found");
            SourceRecord::section_not_found(label, url)
        }
        Err(ExtractError::DetailNotFound) => {
            warn!(source = label, "Broadcast date or detail not found");
            SourceRecord::detail_not_found(label, url)
        }
        Err(ExtractError::Fetch(e))
            if e.is_timeout() && spec.on_timeout == TimeoutPolicy::TreatAsAbsent =>
        {
            warn!(source = label, error = %e, "Wait timed out; treating preview as absent");
            SourceRecord::section_not_found(label, url)
        }
        Err(e) => {
            warn!(source = label, error = %e, "Extraction failed");
            SourceRecord::failed(label, url, &e)
        }
    }
}

async fn fetch_and_extract<F: PageFetcher>(
    fetcher: &F,
    spec: &SourceSpec,
    timeout: Duration,
) -> Result<SourceRecord, ExtractError> {
    let html = fetcher
        .fetch(&spec.url, spec.wait_for.as_deref(), timeout)
        .await?;
    let doc = Html::parse_document(&html);
    extract::extract(&doc, spec)
}

/// Fetch and extract one source, applying its retry and timeout policies.
#[instrument(level = "info", skip_all, fields(source = %spec.label, url = %spec.url))]
pub async fn scrape<F: PageFetcher>(fetcher: &F, spec: &SourceSpec, timeout: Duration) -> SourceRecord {
    let outcome = match spec.retry {
        Some(policy) => {
            let retrying = RetryFetch::new(
                fetcher,
                policy.max_attempts,
                Duration::from_secs(policy.backoff_secs),
            );
            fetch_and_extract(&retrying, spec, timeout).await
        }
        None => fetch_and_extract(fetcher, spec, timeout).await,
    };
    let record = into_record(spec, outcome);
    info!(date = %record.date, placeholder = record.is_placeholder(), "Scraped source");
    record
}

/// Scrape every source in order with one fetcher session.
///
/// The fetcher is taken by value and dropped before returning, so the session
/// is released before anything is delivered.
pub async fn scrape_all<F: PageFetcher>(
    fetcher: F,
    sources: &[SourceSpec],
    timeout: Duration,
) -> Vec<(String, SourceRecord)> {
    let mut records = Vec::with_capacity(sources.len());
    for spec in sources {
        let record = scrape(&fetcher, spec, timeout).await;
        records.push((spec.label.clone(), record));
    }
    drop(fetcher);
    records
}
