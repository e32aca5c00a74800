//! # TV Preview Digest
//!
//! Scrapes the "next episode" previews of a fixed list of TV Tokyo business
//! programmes and pushes one digest message to LINE users.
//!
//! ## Usage
//!
//! ```sh
//! CHANNEL_ACCESS_TOKEN=... YOUR_USER_ID=Uxxxx,Uyyyy tv_preview_digest
//! ```
//!
//! ## Architecture
//!
//! A single sequential pass:
//! 1. **Fetching**: one fetcher session retrieves each programme page in order
//! 2. **Extraction**: a declarative descriptor per source is walked over the page
//! 3. **Digest**: records are formatted into blocks and capped at 5000 characters
//! 4. **Delivery**: the digest is pushed once, after the fetcher is released
//!
//! Per-source failures become placeholder text and delivery failures are
//! logged; the process exits 0 unless start-up configuration is invalid.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod digest;
mod error;
mod models;
mod notify;
mod pipeline;
mod scrapers;
mod sources;
mod utils;

use cli::Cli;
use error::ConfigError;
use notify::{HttpTransport, LineNotifier};
use scrapers::fetch::{BrowserlessFetcher, HttpFetcher};
use utils::parse_recipients;

/// Upper bound on a single push API request.
const PUSH_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("tv_preview_digest starting up");

    let args = Cli::parse();
    debug!(?args.sources, ?args.browserless_url, timeout_secs = args.timeout_secs, "Parsed CLI arguments");

    // ---- Credentials ----
    let token = args.channel_access_token.clone().unwrap_or_default();
    let recipients = parse_recipients(&args.user_ids);
    let mut missing = Vec::new();
    if token.trim().is_empty() {
        missing.push(ConfigError::Missing("CHANNEL_ACCESS_TOKEN"));
    }
    if recipients.is_empty() {
        missing.push(ConfigError::Missing("YOUR_USER_ID"));
    }
    for e in &missing {
        error!(error = %e, "Missing credentials");
    }
    if let Some(first) = missing.into_iter().next() {
        if args.require_credentials {
            return Err(first.into());
        }
        warn!("Continuing with delivery disabled");
    }

    // ---- Sources ----
    let sources = match sources::load(args.sources.as_deref()) {
        Ok(sources) => sources,
        Err(e) => {
            error!(error = %e, "Failed to load source list");
            return Err(e.into());
        }
    };

    let transport = HttpTransport::new(Duration::from_secs(PUSH_TIMEOUT_SECS))?;
    let notifier = LineNotifier::new(token.trim(), recipients, transport)
        .with_api_base(&args.line_api_base)
        .with_dry_run(args.dry_run);
    let header = digest::header(Local::now().date_naive());
    let timeout = Duration::from_secs(args.timeout_secs);
    // Leave headroom over the wait bound for the request itself
    let request_timeout = timeout + Duration::from_secs(10);

    // ---- Run ----
    let summary = match args.browserless_url.as_deref() {
        Some(base) => {
            info!(%base, "Rendering pages through Browserless");
            let fetcher =
                BrowserlessFetcher::new(base, args.browserless_token.as_deref(), request_timeout)?;
            pipeline::run(fetcher, &sources, timeout, &header, &notifier).await
        }
        None => {
            let fetcher = HttpFetcher::new(request_timeout)?;
            pipeline::run(fetcher, &sources, timeout, &header, &notifier).await
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        sources = summary.records.len(),
        placeholders = summary.placeholders(),
        delivery = ?summary.delivery,
        "Execution complete"
    );
    Ok(())
}
