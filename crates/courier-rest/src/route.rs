//! Route templates
//!
//! A [`Route`] is a verb plus a path template such as
//! `channels/{channel_id}/messages`. Compiling it with concrete parameter
//! values yields the request path and the bucket the request belongs to.

use crate::ratelimit::BucketKey;
use std::fmt;

/// Parameters that partition a route into separate rate-limit buckets
pub const MAJOR_PARAMETERS: [&str; 3] = ["guild_id", "channel_id", "webhook_id"];

/// HTTP verb of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Verbs the server rejects without a body, even an empty one
    #[must_use]
    pub const fn requires_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route construction and compilation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Unbalanced braces in route template: {0}")]
    Unbalanced(String),

    #[error("Route {template} expects {expected} parameters, got {actual}")]
    ParamCount {
        template: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// A verb plus a path template relative to the API base URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    method: Method,
    template: &'static str,
    param_count: usize,
}

const fn count_byte(template: &str, needle: u8) -> usize {
    let bytes = template.as_bytes();
    let mut count = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == needle {
            count += 1;
        }
        i += 1;
    }
    count
}

impl Route {
    /// Build a route at compile time
    ///
    /// # Panics
    /// When the template's braces are unbalanced. In a `const` this is a
    /// compile error; use [`Route::try_new`] for templates built at runtime.
    #[must_use]
    pub const fn new(method: Method, template: &'static str) -> Self {
        let opening = count_byte(template, b'{');
        assert!(
            opening == count_byte(template, b'}'),
            "unbalanced braces in route template"
        );
        Self {
            method,
            template,
            param_count: opening,
        }
    }

    pub fn try_new(method: Method, template: &'static str) -> Result<Self, RouteError> {
        let opening = count_byte(template, b'{');
        if opening != count_byte(template, b'}') {
            return Err(RouteError::Unbalanced(template.to_string()));
        }
        Ok(Self {
            method,
            template,
            param_count: opening,
        })
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
    pub const fn param_count(&self) -> usize {
        self.param_count
    }

    /// Substitute `params` into the template, left to right
    pub fn compile(&self, params: &[&str]) -> Result<CompiledRoute, RouteError> {
        if params.len() != self.param_count {
            return Err(RouteError::ParamCount {
                template: self.template,
                expected: self.param_count,
                actual: params.len(),
            });
        }

        let mut path = String::with_capacity(self.template.len() + 16 * params.len());
        let mut major: Vec<String> = MAJOR_PARAMETERS.iter().map(|p| (*p).to_string()).collect();
        let mut rest = self.template;

        for value in params {
            // Counts were validated on construction, so both braces exist
            let (Some(open), Some(close)) = (rest.find('{'), rest.find('}')) else {
                return Err(RouteError::Unbalanced(self.template.to_string()));
            };
            if close < open {
                return Err(RouteError::Unbalanced(self.template.to_string()));
            }

            let name = &rest[open + 1..close];
            if let Some(slot) = MAJOR_PARAMETERS.iter().position(|p| *p == name) {
                major[slot] = (*value).to_string();
            }

            path.push_str(&rest[..open]);
            path.push_str(value);
            rest = &rest[close + 1..];
        }
        path.push_str(rest);

        Ok(CompiledRoute {
            route: *self,
            path,
            major: major.join(":"),
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method, self.template)
    }
}

/// A route with its parameters filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRoute {
    route: Route,
    path: String,
    major: String,
}

impl CompiledRoute {
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    #[must_use]
    pub const fn method(&self) -> Method {
        self.route.method
    }

    /// Path relative to the API base URL
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Major parameter string, e.g. `guild_id:1234:webhook_id`
    #[must_use]
    pub fn major(&self) -> &str {
        &self.major
    }

    /// Bucket this request is accounted against
    #[must_use]
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::new(self.route.method, self.route.template, self.major.clone())
    }
}

impl fmt::Display for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.route.method, self.path)
    }
}

/// Built-in routes
pub mod routes {
    use super::{Method, Route};

    pub const GATEWAY: Route = Route::new(Method::Get, "gateway");
    pub const GET_SELF: Route = Route::new(Method::Get, "users/@me");
    pub const GET_USER: Route = Route::new(Method::Get, "users/{user_id}");
    pub const GET_GUILD: Route = Route::new(Method::Get, "guilds/{guild_id}");
    pub const GET_CHANNEL: Route = Route::new(Method::Get, "channels/{channel_id}");
    pub const SEND_MESSAGE: Route = Route::new(Method::Post, "channels/{channel_id}/messages");
    pub const DELETE_MESSAGE: Route =
        Route::new(Method::Delete, "channels/{channel_id}/messages/{message_id}");
}
