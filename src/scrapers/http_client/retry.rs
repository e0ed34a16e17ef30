//! Retry policy shared by the fetch backends.
//!
//! Transient failures back off exponentially (`min(2^n, 60)` seconds after
//! failed attempt `n`). A `Retry-After` value replaces the backoff, capped
//! at five minutes. Client errors other than 429 are never retried.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{HarvestError, Result};

pub const MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per URL, including the first.
    pub max_attempts: u32,
    pub max_backoff: Duration,
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_backoff: MAX_BACKOFF,
            max_retry_after: MAX_RETRY_AFTER,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Backoff after failed attempt `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt.min(32));
        Duration::from_secs(secs).min(self.max_backoff)
    }

    /// Wait before the next attempt after `err`.
    pub fn wait_for(&self, err: &HarvestError, attempt: u32) -> Duration {
        match err {
            HarvestError::RateLimited {
                retry_after: Some(wait),
                ..
            } => (*wait).min(self.max_retry_after),
            _ => self.backoff_delay(attempt),
        }
    }
}

/// Parse a `Retry-After` value: delta seconds or an HTTP-date.
///
/// Dates in the past yield zero. The result is not capped here.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs.max(0.0)).ok();
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((when - now).to_std().unwrap_or(Duration::ZERO))
}

/// Map an HTTP status to the retry taxonomy. `Ok(())` for success.
pub fn classify(status: u16, retry_after: Option<Duration>, url: &str) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        429 => Err(HarvestError::RateLimited {
            url: url.to_string(),
            retry_after,
        }),
        500..=599 if retry_after.is_some() => Err(HarvestError::RateLimited {
            url: url.to_string(),
            retry_after,
        }),
        500..=599 => Err(HarvestError::Transient {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
        }),
        _ => Err(HarvestError::ClientError {
            status,
            url: url.to_string(),
        }),
    }
}

/// Run `attempt_fn` until it succeeds, fails fatally, or the attempt budget
/// is spent. Exhaustion yields [`HarvestError::Unreachable`], carrying the
/// capped `Retry-After` of the last attempt so the caller can hold off.
pub async fn run_with_retries<T, F, Fut>(policy: &RetryPolicy, url: &str, mut attempt_fn: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut retry_after = None;
    for attempt in 1..=attempts {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                if attempt == attempts {
                    warn!("Giving up on {} after {} attempts: {}", url, attempt, err);
                    retry_after = err.server_wait().map(|w| w.min(policy.max_retry_after));
                    break;
                }
                let wait = policy.wait_for(&err, attempt);
                warn!(
                    "{} (attempt {}/{}), retrying in {:?}",
                    err, attempt, attempts, wait
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
    Err(HarvestError::Unreachable {
        url: url.to_string(),
        attempts,
        retry_after,
    })
}
