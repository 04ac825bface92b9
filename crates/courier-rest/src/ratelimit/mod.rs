//! REST rate limiting
//!
//! Bucket accounting lives in [`RateLimitBucketStore`]; the quota headers the
//! server attaches to every response are parsed by [`RateLimitHeaders`].

mod bucket;
mod headers;

pub use bucket::{BucketKey, RateLimitBucketStore};
pub use headers::{RateLimitHeaders, MAX_WAIT};
