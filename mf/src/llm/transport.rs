//! HTTP transport shared by the provider clients
//!
//! JSON POST with bounded exponential backoff on transient statuses.

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::LlmError;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Default wait when a 429 carries no usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub(super) struct HttpTransport {
    http: Client,
    timeout: Duration,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpTransport {
    pub(super) fn new(timeout_ms: u64, max_retries: u32) -> Result<Self, LlmError> {
        debug!(%timeout_ms, %max_retries, "HttpTransport::new: called");
        let timeout = Duration::from_millis(timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;
        Ok(Self {
            http,
            timeout,
            max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// POST `body` to `url` and decode the JSON reply
    ///
    /// Errors that [`LlmError::is_retryable`] accepts are retried up to
    /// `max_retries` times, waiting the provider's retry-after when given and
    /// an exponential backoff otherwise. With `max_retries == 0` every failure
    /// is final.
    pub(super) async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &serde_json::Value,
    ) -> Result<T, LlmError> {
        debug!(%url, "post_json: called");
        let mut attempt = 0;
        loop {
            match self.send_once(url, headers, body).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    let wait = err
                        .retry_after()
                        .unwrap_or_else(|| self.initial_backoff * 2u32.pow(attempt));
                    attempt += 1;
                    warn!(attempt, wait_ms = wait.as_millis() as u64, error = %err, "post_json: retrying after transient error");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &serde_json::Value,
    ) -> Result<T, LlmError> {
        let mut builder = self.http.post(url).header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }

        let response = builder.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                debug!("send_once: request timed out");
                LlmError::Timeout(self.timeout)
            } else {
                debug!(error = %e, "send_once: network error");
                LlmError::Network(e)
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            debug!("send_once: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "send_once: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        let text = response.text().await?;
        debug!(len = text.len(), "send_once: success");
        Ok(serde_json::from_str(&text)?)
    }
}
