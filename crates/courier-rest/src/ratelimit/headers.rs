//! Quota header parsing

use crate::http::HttpResponse;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

pub const REMAINING: &str = "x-ratelimit-remaining";
pub const LIMIT: &str = "x-ratelimit-limit";
pub const RESET: &str = "x-ratelimit-reset";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const BUCKET: &str = "x-ratelimit-bucket";
pub const RETRY_AFTER: &str = "retry-after";

/// Longest wait any quota header is trusted to ask for
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Body the server sends along with a 429
#[derive(Debug, Default, Deserialize)]
struct RateLimitedBody {
    /// Seconds, fractional
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

/// Quota information carried by one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    /// Absolute reset, epoch seconds
    pub reset: Option<f64>,
    /// Relative reset, seconds from now
    pub reset_after: Option<f64>,
    pub global: bool,
    pub bucket: Option<String>,
    /// Seconds to wait after a 429
    pub retry_after: Option<f64>,
}

fn header<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .map(|wait| wait.min(MAX_WAIT))
}

impl RateLimitHeaders {
    /// Read the quota headers, plus the JSON body of a 429
    pub fn from_response(response: &HttpResponse) -> Self {
        let mut parsed = Self::from_headers(&response.headers);

        if response.status == StatusCode::TOO_MANY_REQUESTS {
            match serde_json::from_slice::<RateLimitedBody>(&response.body) {
                Ok(body) => {
                    parsed.retry_after = body.retry_after.or(parsed.retry_after);
                    parsed.global |= body.global;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "429 without a readable body, using headers only");
                }
            }
        }
        parsed
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: header(headers, REMAINING),
            limit: header(headers, LIMIT),
            reset: header(headers, RESET),
            reset_after: header(headers, RESET_AFTER),
            global: header::<String>(headers, GLOBAL)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            bucket: header(headers, BUCKET),
            retry_after: header(headers, RETRY_AFTER),
        }
    }

    /// Time to wait after a 429, falling back to the bucket reset
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
            .or(self.reset_after)
            .and_then(seconds)
    }

    /// Relative reset as a duration
    pub fn reset_after(&self) -> Option<Duration> {
        self.reset_after.and_then(seconds)
    }

    /// Absolute reset converted to a duration from `now_epoch_ms`
    pub fn reset_from(&self, now_epoch_ms: i64) -> Option<Duration> {
        let reset = self.reset.filter(|r| r.is_finite())?;
        // Float to int casts saturate
        let reset_ms = (reset * 1000.0) as i64;
        let wait = Duration::from_millis(reset_ms.saturating_sub(now_epoch_ms).max(0) as u64);
        Some(wait.min(MAX_WAIT))
    }

    /// Whether the response carried any bucket information at all
    pub fn has_bucket_info(&self) -> bool {
        self.remaining.is_some() || self.reset.is_some() || self.reset_after.is_some()
    }
}
