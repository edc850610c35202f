use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// Retry behaviour shared by the Bison and Supabase clients.
///
/// Rate-limited requests (429) wait for `Retry-After` when the server sends
/// one, otherwise for the exponential backoff. Server errors and transport
/// failures back off exponentially. Other statuses are returned as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// At least one retry is always allowed.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
            max_delay,
        }
    }

    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Sends the request built by `build`, retrying per the policy.
    ///
    /// Once retries are exhausted the last 429/5xx response is returned so the
    /// caller can report its status and body.
    pub async fn send<F>(&self, label: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let delay = match build().send().await {
                Ok(resp) if attempt < self.max_retries && is_retryable_status(resp.status()) => {
                    let retry_after = if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                        parse_retry_after(resp.headers(), Utc::now())
                    } else {
                        None
                    };
                    let delay = retry_after.unwrap_or_else(|| self.backoff(attempt));
                    tracing::warn!(
                        "{} returned {}, retrying in {:?} (attempt {}/{})",
                        label,
                        resp.status(),
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                    delay
                }
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "{} failed: {}, retrying in {:?} (attempt {}/{})",
                        label,
                        e,
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                    delay
                }
                Err(e) => return Err(e).with_context(|| format!("Failed to send {}", label)),
            };
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(30))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Reads `Retry-After` as delay-seconds or as an HTTP date. Dates in the past
/// mean "retry now".
pub fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
