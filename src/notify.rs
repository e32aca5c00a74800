//! LINE Messaging API delivery.
//!
//! The digest goes out in a single request: `push` for one recipient,
//! `multicast` for several. Delivery never fails the run. Missing credentials
//! turn delivery into an echo on stdout, and transport or API errors are
//! logged and reported through [`Delivery`].

use crate::error::NotifyError;
use crate::utils::truncate_for_log;
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Default LINE API host.
pub const LINE_API_BASE: &str = "https://api.line.me";

/// Sends an authenticated JSON request to the push API.
pub trait PushTransport {
    async fn post(&self, url: &str, token: &str, body: &Value) -> Result<(), NotifyError>;
}

/// `reqwest`-backed transport. Every request is bounded by `request_timeout`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }
}

impl PushTransport for HttpTransport {
    async fn post(&self, url: &str, token: &str, body: &Value) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// What happened to a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Nothing was sent; the message was echoed instead.
    Skipped,
    Sent { recipients: usize },
    Failed,
}

/// Delivers text messages to a fixed recipient set.
pub struct LineNotifier<T> {
    token: String,
    recipients: Vec<String>,
    api_base: String,
    dry_run: bool,
    transport: T,
}

impl<T> fmt::Debug for LineNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineNotifier")
            .field("recipients", &self.recipients.len())
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl<T: PushTransport> LineNotifier<T> {
    pub fn new(token: impl Into<String>, recipients: Vec<String>, transport: T) -> Self {
        Self {
            token: token.into(),
            recipients,
            api_base: LINE_API_BASE.to_string(),
            dry_run: false,
            transport,
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether `send` would reach the network.
    pub fn enabled(&self) -> bool {
        !self.dry_run && !self.token.is_empty() && !self.recipients.is_empty()
    }

    /// Endpoint and body for the current recipient set.
    pub fn request(&self, message: &str) -> (String, Value) {
        let messages = json!([{ "type": "text", "text": message }]);
        match self.recipients.as_slice() {
            [one] => (
                format!("{}/v2/bot/message/push", self.api_base),
                json!({ "to": one, "messages": messages }),
            ),
            many => (
                format!("{}/v2/bot/message/multicast", self.api_base),
                json!({ "to": many, "messages": messages }),
            ),
        }
    }

    /// Deliver `message`. Never returns an error.
    #[instrument(level = "info", skip_all, fields(chars = message.chars().count(), recipients = self.recipients.len()))]
    pub async fn send(&self, message: &str) -> Delivery {
        if !self.enabled() {
            warn!(
                dry_run = self.dry_run,
                has_token = !self.token.is_empty(),
                "Delivery disabled; echoing digest to stdout"
            );
            println!("{message}");
            return Delivery::Skipped;
        }

        let (url, body) = self.request(message);
        match self.transport.post(&url, &self.token, &body).await {
            Ok(()) => {
                info!(%url, "Digest delivered");
                Delivery::Sent {
                    recipients: self.recipients.len(),
                }
            }
            Err(e) => {
                error!(
                    %url,
                    error = %truncate_for_log(&e.to_string(), 300),
                    "Digest delivery failed"
                );
                Delivery::Failed
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Records every request; answers with `status` when set.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub requests: RefCell<Vec<(String, String, Value)>>,
        pub status: Option<u16>,
    }

    impl RecordingTransport {
        pub fn failing(status: u16) -> Self {
            Self {
                status: Some(status),
                ..Self::default()
            }
        }
    }

    impl PushTransport for RecordingTransport {
        async fn post(&self, url: &str, token: &str, body: &Value) -> Result<(), NotifyError> {
            self.requests
                .borrow_mut()
                .push((url.to_string(), token.to_string(), body.clone()));
            match self.status {
                Some(status) => Err(NotifyError::Api {
                    status,
                    message: "{\"message\":\"Authentication failed\"}".to_string(),
                }),
                None => Ok(()),
            }
        }
    }
}
