//! # courier-rest
//!
//! Rate-limited REST dispatcher. Requests are serialised per bucket (verb,
//! route template and major parameter) while different buckets run
//! concurrently; a process-wide global limit suspends every bucket at once.

pub mod endpoints;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod requester;
pub mod route;

pub use endpoints::TokenVerification;
pub use error::{RestError, RestResult};
pub use http::{
    HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient, TransportError, TransportErrorKind,
};
pub use ratelimit::{BucketKey, RateLimitBucketStore, RateLimitHeaders};
pub use requester::{Requester, RestRequest, RestResponse};
pub use route::{routes, CompiledRoute, Method, Route, RouteError};
