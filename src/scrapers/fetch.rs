//! Page retrieval with wait-for-element and bounded retry.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: core trait, "give me the HTML for this URL"
//! - [`HttpFetcher`]: plain HTTP GET, re-polling until a wait selector shows up
//! - [`BrowserlessFetcher`]: renders the page through a Browserless `/content`
//!   endpoint, which does the waiting server-side
//! - [`RetryFetch`]: decorator adding fixed-delay retries to any fetcher
//!
//! # Retry Strategy
//!
//! - At most `max_attempts` attempts in total
//! - Fixed back-off between attempts
//! - A timeout is never retried: it means the content is absent

use crate::error::FetchError;
use scraper::{Html, Selector};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Retrieves HTML for a URL.
///
/// Implementors must honour `wait_for`: when given, the returned HTML contains
/// at least one element matching it, or the call fails with
/// [`FetchError::Timeout`] once `timeout` has elapsed.
pub trait PageFetcher {
    async fn fetch(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<String, FetchError>;
}

impl<F: PageFetcher> PageFetcher for &F {
    async fn fetch(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        (**self).fetch(url, wait_for, timeout).await
    }
}

fn wait_selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|_| FetchError::Selector(css.to_string()))
}

/// Whether `html` contains an element matching `selector`.
pub fn contains_selector(html: &str, selector: &Selector) -> bool {
    Html::parse_document(html).select(selector).next().is_some()
}

/// Fetches pages with a plain HTTP client.
///
/// Pages that fill in their preview late are re-requested every
/// `poll_interval` until the wait selector matches.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    poll_interval: Duration,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            poll_interval: Duration::from_secs(2),
        })
    }

    /// Delay between re-requests while waiting for the selector.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.text().await?)
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "info", skip(self, timeout), fields(timeout_secs = timeout.as_secs()))]
    async fn fetch(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let Some(css) = wait_for else {
            return self.get(url).await;
        };
        let selector = wait_selector(css)?;
        let t0 = Instant::now();
        loop {
            let body = self.get(url).await?;
            if contains_selector(&body, &selector) {
                debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "Wait selector matched");
                return Ok(body);
            }
            if t0.elapsed() + self.poll_interval >= timeout {
                return Err(FetchError::Timeout {
                    selector: css.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            sleep(self.poll_interval).await;
        }
    }
}

/// Fetches fully rendered pages through a Browserless `/content` endpoint.
pub struct BrowserlessFetcher {
    client: reqwest::Client,
    base_url: String,
    endpoint: Url,
    has_token: bool,
}

impl fmt::Debug for BrowserlessFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserlessFetcher")
            .field("base_url", &self.base_url)
            .field("token", &self.has_token.then_some("***"))
            .finish()
    }
}

impl BrowserlessFetcher {
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let mut endpoint = Url::parse(&format!("{base_url}/content"))?;
        if let Some(token) = token {
            endpoint.query_pairs_mut().append_pair("token", token);
        }
        Ok(Self {
            client,
            base_url,
            endpoint,
            has_token: token.is_some(),
        })
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

/// Request body for the Browserless `/content` API.
pub fn browserless_body(url: &str, wait_for: Option<&str>, timeout: Duration) -> serde_json::Value {
    let timeout_ms = timeout.as_millis() as u64;
    let mut body = serde_json::json!({
        "url": url,
        "gotoOptions": { "timeout": timeout_ms },
    });
    if let Some(selector) = wait_for {
        body["waitForSelector"] = serde_json::json!({
            "selector": selector,
            "timeout": timeout_ms,
        });
    }
    body
}

impl PageFetcher for BrowserlessFetcher {
    #[instrument(level = "info", skip(self, timeout), fields(timeout_secs = timeout.as_secs()))]
    async fn fetch(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        if let Some(css) = wait_for {
            wait_selector(css)?;
        }
        let resp = self
            .client
            .post(self.endpoint())
            .json(&browserless_body(url, wait_for, timeout))
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::REQUEST_TIMEOUT {
            return Err(FetchError::Timeout {
                selector: wait_for.unwrap_or_default().to_string(),
                secs: timeout.as_secs(),
            });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            // Browserless reports a selector that never appeared as a 4xx/5xx with this text
            if wait_for.is_some() && message.contains("Timeout") {
                return Err(FetchError::Timeout {
                    selector: wait_for.unwrap_or_default().to_string(),
                    secs: timeout.as_secs(),
                });
            }
            return Err(FetchError::Browserless {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.text().await?)
    }
}

/// Decorator that retries failed fetches with a fixed back-off.
///
/// A [`FetchError::Timeout`] ends the loop immediately: a selector that never
/// appeared is treated as missing content, not a transient failure.
pub struct RetryFetch<F> {
    inner: F,
    max_attempts: u32,
    backoff: Duration,
}

impl<F> RetryFetch<F>
where
    F: PageFetcher,
{
    /// Wrap `inner`, making at most `max_attempts` attempts (at least one).
    pub fn new(inner: F, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

impl<F> fmt::Debug for RetryFetch<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl<F> PageFetcher for RetryFetch<F>
where
    F: PageFetcher,
{
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(
        &self,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.inner.fetch(url, wait_for, timeout).await {
                Ok(body) => {
                    if attempt > 1 {
                        info!(attempt, "fetch succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(e) if e.is_timeout() => {
                    warn!(attempt, error = %e, "fetch timed out; not retrying");
                    return Err(e);
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        delay = ?self.backoff,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(self.backoff).await;
                }
            }
        }
    }
}
