use std::time::Duration;

use chrono::{DateTime, Utc};

const MAX_BACKOFF_EXPONENT: u32 = 10;
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

pub fn is_retryable_github_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// GitHub answers secondary rate limits with 403 plus `retry-after`.
pub fn is_rate_limited_forbidden(status: u16, retry_after_ms: Option<u64>) -> bool {
    status == 403 && retry_after_ms.is_some()
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Statuses GitHub answers before applying a write: throttling only.
pub fn is_unapplied_github_status(status: u16, retry_after_ms: Option<u64>) -> bool {
    status == 429 || is_rate_limited_forbidden(status, retry_after_ms)
}

/// A failed connect never reached GitHub; timeouts and other request errors
/// may have.
pub fn is_unapplied_transport_error(error: &reqwest::Error) -> bool {
    error.is_connect()
}

/// Parses `retry-after` as delta-seconds or an HTTP date, in milliseconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let raw = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds.saturating_mul(1_000));
    }
    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at
        .signed_duration_since(Utc::now())
        .num_milliseconds();
    if delay_ms <= 0 {
        return Some(0);
    }
    u64::try_from(delay_ms).ok()
}

/// Exponential backoff from `base_delay_ms`, raised to `retry-after` when the
/// server asks for more, and capped at [`MAX_RETRY_DELAY_MS`].
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after_ms: Option<u64>) -> Duration {
    let exponent = u32::try_from(attempt.saturating_sub(1))
        .unwrap_or(MAX_BACKOFF_EXPONENT)
        .min(MAX_BACKOFF_EXPONENT);
    let backoff_ms = base_delay_ms.saturating_mul(1_u64 << exponent);
    let delay_ms = match retry_after_ms {
        Some(retry_after_ms) => backoff_ms.max(retry_after_ms),
        None => backoff_ms,
    };
    Duration::from_millis(delay_ms.min(MAX_RETRY_DELAY_MS))
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}
