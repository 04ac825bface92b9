//! Rate-limit bucket store
//!
//! Counters are kept per [`BucketKey`]. The client decrements its own copy
//! before every send and overwrites it with the server's view after every
//! response, so any drift is corrected by the next reply.

use super::RateLimitHeaders;
use crate::route::Method;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Fallback wait for a 429 that carries no timing at all
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Identity of a rate-limit bucket: verb, route template and major parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    method: Method,
    template: &'static str,
    major: String,
}

impl BucketKey {
    #[must_use]
    pub fn new(method: Method, template: &'static str, major: impl Into<String>) -> Self {
        Self {
            method,
            template,
            major: major.into(),
        }
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub const fn template(&self) -> &'static str {
        self.template
    }

    #[must_use]
    pub fn major(&self) -> &str {
        &self.major
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.method, self.template, self.major)
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    remaining: u32,
    limit: u32,
    reset_at: Option<Instant>,
}

impl Bucket {
    /// Refill if the window has rolled over
    fn refresh(&mut self, now: Instant) {
        if self.reset_at.is_some_and(|reset| reset <= now) {
            self.remaining = self.limit;
            self.reset_at = None;
        }
    }
}

/// Remaining-request counters for every bucket seen so far
#[derive(Debug)]
pub struct RateLimitBucketStore {
    buckets: Mutex<HashMap<BucketKey, Bucket>>,
    global_reset: Mutex<Option<Instant>>,
    relative: bool,
}

impl RateLimitBucketStore {
    /// `relative` reads `X-RateLimit-Reset-After` instead of the absolute
    /// `X-RateLimit-Reset`, which sidesteps clock skew with the server
    #[must_use]
    pub fn new(relative: bool) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            global_reset: Mutex::new(None),
            relative,
        }
    }

    /// How long a request on `key` must wait, if at all
    pub fn retry_after(&self, key: &BucketKey) -> Option<Duration> {
        let now = Instant::now();

        {
            let mut global = self.global_reset.lock();
            match *global {
                Some(reset) if reset > now => return Some(reset - now),
                Some(_) => *global = None,
                None => {}
            }
        }

        let mut buckets = self.buckets.lock();
        let bucket = buckets.get_mut(key)?;
        bucket.refresh(now);
        match bucket.reset_at {
            Some(reset) if bucket.remaining == 0 => Some(reset - now),
            _ => None,
        }
    }

    /// Account for a request about to be sent on `key`
    pub fn reserve(&self, key: &BucketKey) {
        let now = Instant::now();
        if let Some(bucket) = self.buckets.lock().get_mut(key) {
            bucket.refresh(now);
            bucket.remaining = bucket.remaining.saturating_sub(1);
        }
    }

    /// Apply the server's view after a response
    ///
    /// Returns the time to wait when the response was a 429.
    pub fn update(
        &self,
        key: &BucketKey,
        headers: &RateLimitHeaders,
        status: StatusCode,
    ) -> Option<Duration> {
        let now = Instant::now();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = headers.retry_after().unwrap_or(DEFAULT_RETRY_AFTER);

            if headers.global {
                *self.global_reset.lock() = now.checked_add(retry_after);
                tracing::warn!(?retry_after, "Global rate limit hit, suspending every bucket");
            } else {
                let mut buckets = self.buckets.lock();
                let bucket = buckets.entry(key.clone()).or_insert(Bucket {
                    remaining: 0,
                    limit: headers.limit.unwrap_or(1),
                    reset_at: None,
                });
                bucket.remaining = 0;
                bucket.reset_at = now.checked_add(retry_after);
                tracing::warn!(bucket = %key, ?retry_after, "Bucket rate limit hit");
            }
            return Some(retry_after);
        }

        if !headers.has_bucket_info() {
            return None;
        }

        let reset_in = if self.relative {
            headers
                .reset_after()
                .or_else(|| headers.reset_from(chrono::Utc::now().timestamp_millis()))
        } else {
            headers
                .reset_from(chrono::Utc::now().timestamp_millis())
                .or_else(|| headers.reset_after())
        };

        let mut buckets = self.buckets.lock();
        let bucket = buckets.entry(key.clone()).or_insert(Bucket {
            remaining: 1,
            limit: 1,
            reset_at: None,
        });
        if let Some(limit) = headers.limit {
            bucket.limit = limit;
        }
        if let Some(remaining) = headers.remaining {
            bucket.remaining = remaining;
        }
        if let Some(reset_at) = reset_in.and_then(|reset_in| now.checked_add(reset_in)) {
            bucket.reset_at = Some(reset_at);
        }

        tracing::trace!(
            bucket = %key,
            remaining = bucket.remaining,
            limit = bucket.limit,
            "Bucket updated"
        );
        None
    }

    /// Whether a global limit is currently in force
    pub fn is_globally_limited(&self) -> bool {
        self.global_reset
            .lock()
            .is_some_and(|reset| reset > Instant::now())
    }

    /// Last known remaining count for `key`
    pub fn remaining(&self, key: &BucketKey) -> Option<u32> {
        self.buckets.lock().get(key).map(|b| b.remaining)
    }

    /// Number of buckets tracked
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().is_empty()
    }
}

impl Default for RateLimitBucketStore {
    fn default() -> Self {
        Self::new(true)
    }
}
