//! REST dispatcher
//!
//! One request runs at a time per bucket; requests on different buckets run
//! concurrently. Before every send the bucket store is consulted, after
//! every response it is updated from the quota headers.

use crate::error::{RestError, RestResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::ratelimit::{BucketKey, RateLimitBucketStore, RateLimitHeaders};
use crate::route::CompiledRoute;
use courier_common::RestConfig;
use dashmap::DashMap;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Linear backoff step between 5xx attempts
const SERVER_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A request waiting to be dispatched
#[derive(Debug, Clone)]
pub struct RestRequest {
    route: CompiledRoute,
    body: Option<Value>,
    reason: Option<String>,
    should_queue: bool,
}

impl RestRequest {
    #[must_use]
    pub fn new(route: CompiledRoute) -> Self {
        Self {
            route,
            body: None,
            reason: None,
            should_queue: true,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Audit log reason sent as `X-Audit-Log-Reason`
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Fail with [`RestError::RateLimited`] instead of waiting for the bucket
    #[must_use]
    pub fn without_queue(mut self) -> Self {
        self.should_queue = false;
        self
    }

    #[must_use]
    pub const fn route(&self) -> &CompiledRoute {
        &self.route
    }

    #[must_use]
    pub const fn should_queue(&self) -> bool {
        self.should_queue
    }
}

/// Successful (2xx/3xx) response
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RestResponse {
    /// Deserialize the body
    pub fn json<T: DeserializeOwned>(&self) -> RestResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as a generic JSON value, `null` when empty
    pub fn value(&self) -> RestResult<Value> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        self.json()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TryFrom<HttpResponse> for RestResponse {
    type Error = RestError;

    fn try_from(response: HttpResponse) -> Result<Self, Self::Error> {
        if response.status.is_client_error() || response.status.is_server_error() {
            return Err(RestError::Http {
                status: response.status.as_u16(),
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        })
    }
}

/// Rate-limited REST dispatcher
pub struct Requester {
    http: Arc<dyn HttpClient>,
    base_url: String,
    default_headers: HeaderMap,
    retry_on_timeout: bool,
    server_error_attempts: u32,
    buckets: RateLimitBucketStore,
    locks: DashMap<BucketKey, Arc<Mutex<()>>>,
    shutdown: AtomicBool,
}

impl Requester {
    /// Build a dispatcher that sends through `http`
    pub fn new(
        config: &RestConfig,
        authorization: &str,
        http: Arc<dyn HttpClient>,
    ) -> RestResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization)
                .map_err(|_| RestError::InvalidHeader("authorization"))?,
        );
        default_headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| RestError::InvalidHeader("user-agent"))?,
        );
        default_headers.insert(
            "x-ratelimit-precision",
            HeaderValue::from_static("millisecond"),
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_headers,
            retry_on_timeout: config.retry_on_timeout,
            server_error_attempts: config.server_error_attempts.max(1),
            buckets: RateLimitBucketStore::new(config.relative_rate_limit),
            locks: DashMap::new(),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Build a dispatcher over a fresh `reqwest` client
    pub fn with_reqwest(config: &RestConfig, authorization: &str) -> RestResult<Self> {
        let http = ReqwestHttpClient::new(config.request_timeout)?;
        Self::new(config, authorization, Arc::new(http))
    }

    /// Bucket accounting, for inspection
    pub fn buckets(&self) -> &RateLimitBucketStore {
        &self.buckets
    }

    /// Stop accepting requests; in-flight ones run to completion
    pub fn shutdown(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            tracing::info!("REST requester shutting down");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Submit a request and run `callback` with the result on the blocking pool
    pub fn queue<F>(self: &Arc<Self>, request: RestRequest, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(RestResult<RestResponse>) + Send + 'static,
    {
        let requester = Arc::clone(self);
        tokio::spawn(async move {
            let result = requester.execute(request).await;
            if let Err(e) = tokio::task::spawn_blocking(move || callback(result)).await {
                tracing::error!(error = %e, "Response callback panicked");
            }
        })
    }

    /// Execute a request, waiting out rate limits if it allows queueing
    pub async fn execute(&self, request: RestRequest) -> RestResult<RestResponse> {
        if self.is_shutdown() {
            return Err(RestError::Shutdown);
        }

        let key = request.route.bucket_key();
        let http_request = self.build(&request)?;

        let lock = self.bucket_lock(&key);
        let _permit = lock.lock().await;

        let mut transport_retried = false;
        loop {
            if let Some(wait) = self.buckets.retry_after(&key) {
                if !request.should_queue {
                    return Err(RestError::RateLimited {
                        retry_after: wait,
                        global: self.buckets.is_globally_limited(),
                    });
                }
                tracing::debug!(bucket = %key, ?wait, "Waiting for rate limit reset");
                tokio::time::sleep(wait).await;
                continue;
            }

            self.buckets.reserve(&key);
            let response = match self.send_with_retries(&request.route, &http_request).await {
                Ok(response) => response,
                Err(RestError::Transport(e))
                    if e.is_transient() && self.retry_on_timeout && !transport_retried =>
                {
                    tracing::warn!(route = %request.route, error = %e, "Transport error, retrying once");
                    transport_retried = true;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let quota = RateLimitHeaders::from_response(&response);
            if let Some(retry_after) = self.buckets.update(&key, &quota, response.status) {
                if request.should_queue {
                    continue;
                }
                return Err(RestError::RateLimited {
                    retry_after,
                    global: quota.global,
                });
            }

            tracing::trace!(route = %request.route, status = %response.status, "Request completed");
            return RestResponse::try_from(response);
        }
    }

    /// Execute and deserialize the body
    pub async fn execute_json<T: DeserializeOwned>(&self, request: RestRequest) -> RestResult<T> {
        self.execute(request).await?.json()
    }

    fn bucket_lock(&self, key: &BucketKey) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(key.clone()).or_default())
    }

    fn build(&self, request: &RestRequest) -> RestResult<HttpRequest> {
        let mut headers = self.default_headers.clone();
        let method = request.route.method();

        let body = match &request.body {
            Some(value) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                Some(serde_json::to_vec(value)?)
            }
            None if method.requires_body() => Some(Vec::new()),
            None => None,
        };

        if let Some(reason) = &request.reason {
            headers.insert(
                "x-audit-log-reason",
                HeaderValue::from_str(reason).map_err(|_| RestError::InvalidHeader("reason"))?,
            );
        }

        Ok(HttpRequest {
            method,
            url: format!("{}/{}", self.base_url, request.route.path()),
            headers,
            body,
        })
    }

    async fn send_with_retries(
        &self,
        route: &CompiledRoute,
        request: &HttpRequest,
    ) -> RestResult<HttpResponse> {
        let mut attempt = 1;
        loop {
            let response = self.http.send(request.clone()).await?;
            if !response.status.is_server_error() {
                return Ok(response);
            }

            let status = response.status.as_u16();
            if attempt >= self.server_error_attempts {
                tracing::error!(route = %route, status, attempts = attempt, "Server error, giving up");
                return Err(RestError::Server {
                    status,
                    attempts: attempt,
                });
            }

            tracing::warn!(route = %route, status, attempt, "Server error, retrying");
            tokio::time::sleep(SERVER_ERROR_BACKOFF * attempt).await;
            attempt += 1;
        }
    }
}

impl std::fmt::Debug for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("base_url", &self.base_url)
            .field("buckets", &self.buckets.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
