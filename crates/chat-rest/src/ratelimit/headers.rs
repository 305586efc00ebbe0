//! Rate limit metadata carried by REST responses

use std::collections::HashMap;
use std::time::Duration;

pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RESET: &str = "x-ratelimit-reset";
pub const HEADER_RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const HEADER_BUCKET: &str = "x-ratelimit-bucket";
pub const HEADER_GLOBAL: &str = "x-ratelimit-global";
pub const HEADER_RETRY_AFTER: &str = "retry-after";
pub const HEADER_DATE: &str = "date";

/// Parsed rate limit headers; keys of the source map must be lowercase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Absolute reset time in server milliseconds since the Unix epoch
    pub reset_at_ms: Option<i64>,
    pub reset_after: Option<Duration>,
    pub bucket: Option<String>,
    pub global: bool,
    pub retry_after: Option<Duration>,
    /// Server clock in milliseconds since the Unix epoch
    pub date_ms: Option<i64>,
}

impl RateLimitHeaders {
    pub fn parse(headers: &HashMap<String, String>) -> Self {
        let get = |name: &str| headers.get(name).map(|v| v.trim());

        Self {
            limit: get(HEADER_LIMIT).and_then(|v| v.parse().ok()),
            remaining: get(HEADER_REMAINING).and_then(|v| v.parse().ok()),
            reset_at_ms: get(HEADER_RESET)
                .and_then(|v| v.parse::<f64>().ok())
                .map(|secs| (secs * 1000.0).round() as i64),
            reset_after: get(HEADER_RESET_AFTER).and_then(parse_seconds),
            bucket: get(HEADER_BUCKET).map(str::to_string),
            global: get(HEADER_GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            retry_after: get(HEADER_RETRY_AFTER).and_then(parse_seconds),
            date_ms: get(HEADER_DATE)
                .and_then(|v| chrono::DateTime::parse_from_rfc2822(v).ok())
                .map(|d| d.timestamp_millis()),
        }
    }

    /// Whether the response carried any bucket information at all
    pub fn is_empty(&self) -> bool {
        self.remaining.is_none() && self.reset_at_ms.is_none() && self.reset_after.is_none()
    }
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}
