//! One digest run: scrape every source, release the fetcher, build, deliver.

use crate::digest;
use crate::models::SourceRecord;
use crate::notify::{Delivery, LineNotifier, PushTransport};
use crate::scrapers::{fetch::PageFetcher, scrape_all};
use crate::sources::SourceSpec;
use std::time::Duration;
use tracing::{info, instrument};

/// Result of a run, for logging and tests.
#[derive(Debug)]
pub struct RunSummary {
    pub records: Vec<(String, SourceRecord)>,
    pub digest: String,
    pub delivery: Delivery,
}

impl RunSummary {
    pub fn placeholders(&self) -> usize {
        self.records.iter().filter(|(_, r)| r.is_placeholder()).count()
    }
}

/// Run every source through `fetcher` and deliver the digest once.
///
/// The fetcher is consumed and released before delivery. Nothing here fails:
/// broken sources become placeholder blocks and delivery problems are logged.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn run<F, T>(
    fetcher: F,
    sources: &[SourceSpec],
    timeout: Duration,
    header: &str,
    notifier: &LineNotifier<T>,
) -> RunSummary
where
    F: PageFetcher,
    T: PushTransport,
{
    let records = scrape_all(fetcher, sources, timeout).await;

    let digest = digest::build(header, &records);
    info!(
        chars = digest.chars().count(),
        blocks = records.len(),
        "Digest built"
    );

    let delivery = notifier.send(&digest).await;
    let summary = RunSummary {
        records,
        digest,
        delivery,
    };
    info!(
        placeholders = summary.placeholders(),
        delivery = ?summary.delivery,
        "Run finished"
    );
    summary
}
