use std::time::{Duration, SystemTime};

use http::header::RETRY_AFTER;

pub(crate) const RETRY_BACKOFF_BASE_MS: u64 = 100;
pub(crate) const RETRY_BACKOFF_MAX_MS: u64 = 1_000;
pub(crate) const RETRY_AFTER_MAX_SECS: u64 = 30;
const RETRY_NETWORK_FAST_SECOND_MS: u64 = 10;

/// When and how long to wait before re-sending a request.
///
/// Only statuses that signal temporary overload and connection-level
/// failures are retried; everything else goes straight to the decoder.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub(crate) fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Delay before retrying a response with `status`, or `None` to hand
    /// the response on as-is.
    pub(crate) fn status_delay(
        &self,
        status: http::StatusCode,
        headers: &http::HeaderMap,
        attempt: u32,
    ) -> Option<Duration> {
        (attempt < self.max_attempts && should_retry_status(status))
            .then(|| retry_delay(headers, attempt))
    }

    /// Delay before retrying after a connection-level failure.
    pub(crate) fn network_delay(&self, message: &str, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts && should_retry_network_message(message))
            .then(|| retry_network_delay(message, attempt))
    }
}

#[inline]
pub(crate) fn should_retry_status(status: http::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 503 | 529)
}

#[inline]
pub(crate) fn should_retry_network_message(message: &str) -> bool {
    const NEEDLES: [&[u8]; 9] = [
        b"timed out",
        b"timeout",
        b"connection reset",
        b"connection aborted",
        b"broken pipe",
        b"http2 error",
        b"connection refused",
        b"unexpected eof",
        b"error sending request",
    ];
    let haystack = message.as_bytes();
    NEEDLES
        .iter()
        .any(|needle| contains_ascii_case_insensitive(haystack, needle))
}

#[inline]
fn retry_network_delay(message: &str, attempt: u32) -> Duration {
    if has_fast_retry_signature(message) {
        return if attempt == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(RETRY_NETWORK_FAST_SECOND_MS)
        };
    }
    retry_backoff_delay(attempt)
}

// A dropped keep-alive connection is usually fine on a fresh one.
#[inline]
fn has_fast_retry_signature(message: &str) -> bool {
    const FAST_RETRY_NEEDLES: [&[u8]; 4] = [
        b"connection reset",
        b"connection aborted",
        b"broken pipe",
        b"unexpected eof",
    ];
    let haystack = message.as_bytes();
    FAST_RETRY_NEEDLES
        .iter()
        .any(|needle| contains_ascii_case_insensitive(haystack, needle))
}

#[inline]
fn contains_ascii_case_insensitive(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if haystack.len() < needle.len() {
        return false;
    }

    haystack.windows(needle.len()).any(|window| {
        window
            .iter()
            .zip(needle.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

#[inline]
pub(crate) fn retry_backoff_delay(attempt: u32) -> Duration {
    let shift = attempt.min(10);
    let multiplier = 1_u64 << shift;
    Duration::from_millis(
        RETRY_BACKOFF_BASE_MS
            .saturating_mul(multiplier)
            .min(RETRY_BACKOFF_MAX_MS),
    )
}

#[inline]
fn retry_delay(headers: &http::HeaderMap, attempt: u32) -> Duration {
    parse_retry_after_delay(headers).unwrap_or_else(|| retry_backoff_delay(attempt))
}

/// `Retry-After` as delta-seconds or an HTTP date, capped.
pub(crate) fn parse_retry_after_delay(headers: &http::HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds.min(RETRY_AFTER_MAX_SECS)));
    }

    let target = httpdate::parse_http_date(raw).ok()?;
    let delay = target.duration_since(SystemTime::now()).unwrap_or_default();
    Some(delay.min(Duration::from_secs(RETRY_AFTER_MAX_SECS)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue, StatusCode};

    #[test]
    fn test_retriable_statuses() {
        assert!(should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(should_retry_status(StatusCode::from_u16(529).unwrap()));
        assert!(!should_retry_status(StatusCode::BAD_REQUEST));
        assert!(!should_retry_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_status_delay_respects_attempt_budget() {
        let policy = RetryPolicy::new(2);
        let headers = HeaderMap::new();
        assert_eq!(
            policy.status_delay(StatusCode::TOO_MANY_REQUESTS, &headers, 0),
            Some(retry_backoff_delay(0))
        );
        assert!(policy
            .status_delay(StatusCode::TOO_MANY_REQUESTS, &headers, 2)
            .is_none());
        assert!(policy.status_delay(StatusCode::OK, &headers, 0).is_none());
        assert!(RetryPolicy::new(0)
            .status_delay(StatusCode::SERVICE_UNAVAILABLE, &headers, 0)
            .is_none());
    }

    #[test]
    fn test_retry_after_seconds_is_capped() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after_delay(&headers), Some(Duration::from_secs(5)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3600"));
        assert_eq!(
            parse_retry_after_delay(&headers),
            Some(Duration::from_secs(RETRY_AFTER_MAX_SECS))
        );
    }

    #[test]
    fn test_retry_after_http_date() {
        let target = SystemTime::now() + Duration::from_secs(2);
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_str(&httpdate::fmt_http_date(target)).unwrap(),
        );
        let delay = parse_retry_after_delay(&headers).unwrap();
        assert!(delay <= Duration::from_secs(RETRY_AFTER_MAX_SECS));
    }

    #[test]
    fn test_retry_after_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert!(parse_retry_after_delay(&headers).is_none());
    }

    #[test]
    fn test_network_delay() {
        let policy = RetryPolicy::new(2);
        assert_eq!(
            policy.network_delay("connection reset by peer", 0),
            Some(Duration::ZERO)
        );
        assert_eq!(
            policy.network_delay("unexpected EOF during handshake", 1),
            Some(Duration::from_millis(RETRY_NETWORK_FAST_SECOND_MS))
        );
        assert_eq!(
            policy.network_delay("operation timed out", 0),
            Some(retry_backoff_delay(0))
        );
        assert!(policy.network_delay("invalid certificate", 0).is_none());
        assert!(policy.network_delay("connection reset", 2).is_none());
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(retry_backoff_delay(0), Duration::from_millis(100));
        assert_eq!(retry_backoff_delay(2), Duration::from_millis(400));
        assert_eq!(
            retry_backoff_delay(8),
            Duration::from_millis(RETRY_BACKOFF_MAX_MS)
        );
    }
}
