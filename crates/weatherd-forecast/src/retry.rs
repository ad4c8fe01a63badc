//! Retry policy for api.weather.gov requests.
//!
//! Retried:
//! - network failures (connect, timeout, reset, body read)
//! - 429 Too Many Requests and 503 Service Unavailable, honouring `Retry-After`
//!
//! Not retried:
//! - any other non-200 status
//! - a 200 whose body does not decode

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use std::time::Duration;

/// Default retry configuration
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after every retried attempt
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Local backoff after `retries` retried attempts: `initial * 2^retries`.
    pub fn backoff(&self, retries: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retries))
    }
}

/// How a response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 200: decode the body
    Success,
    /// 429 / 503: wait and try again
    Retry,
    /// Anything else: give up with the body as diagnostics
    Fail,
}

pub fn classify_status(status: StatusCode) -> RetryDecision {
    match status {
        StatusCode::OK => RetryDecision::Success,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => RetryDecision::Retry,
        _ => RetryDecision::Fail,
    }
}

/// Per-attempt result driving the retry loop.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Done(T),
    RetryAfter(Duration, E),
    Failed(E),
}

/// Parse a `Retry-After` value into a positive delay.
///
/// Accepts delta-seconds or an HTTP date (IMF-fixdate, RFC 850, asctime).
/// Zero, past dates and garbage yield `None` so the caller falls back to its
/// own backoff.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<u64>() {
        return (secs > 0).then(|| Duration::from_secs(secs));
    }

    let at = parse_http_date(value)?;
    (at - now).to_std().ok().filter(|d| !d.is_zero())
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }

    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
