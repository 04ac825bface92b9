//! Client configuration structs
//!
//! Loads configuration from environment variables (with `.env` support) or
//! builds it programmatically.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bot credential, without the `Bot ` prefix
    pub token: String,
    pub shard: ShardConfig,
    pub gateway: GatewayConfig,
    pub rest: RestConfig,
    pub cache: CacheConfig,
}

/// Which shard of the credential's workload this client serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardConfig {
    pub index: u32,
    pub total: u32,
}

impl ShardConfig {
    /// Wire form sent in IDENTIFY
    #[must_use]
    pub fn as_array(&self) -> [u32; 2] {
        [self.index, self.total]
    }
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self { index: 0, total: 1 }
    }
}

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Fixed gateway URL; resolved through the REST API when unset
    pub url: Option<String>,
    pub version: u8,
    /// Request the zlib-stream transport compression
    pub compress: bool,
    /// Member count above which a guild is sent without offline members
    pub large_threshold: u32,
    pub auto_reconnect: bool,
    pub initial_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    /// Minimum spacing between connect attempts sharing this credential
    pub identify_interval: Duration,
    /// Frames allowed per send window
    pub send_budget: u32,
    /// Part of the budget only heartbeat, identify and resume may use
    pub send_reserved: u32,
    pub send_window: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            version: default_gateway_version(),
            compress: true,
            large_threshold: default_large_threshold(),
            auto_reconnect: true,
            initial_reconnect_delay: Duration::from_secs(2),
            max_reconnect_delay: Duration::from_secs(default_max_reconnect_delay_secs()),
            identify_interval: Duration::from_secs(5),
            send_budget: 120,
            send_reserved: 4,
            send_window: Duration::from_secs(60),
        }
    }
}

/// REST dispatcher settings
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Retry a request once after a socket timeout
    pub retry_on_timeout: bool,
    /// Prefer `X-RateLimit-Reset-After` over the absolute reset timestamp
    pub relative_rate_limit: bool,
    pub request_timeout: Duration,
    /// Attempts made for a request answered with 5xx
    pub server_error_attempts: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            user_agent: default_user_agent(),
            retry_on_timeout: true,
            relative_rate_limit: true,
            request_timeout: Duration::from_secs(30),
            server_error_attempts: 3,
        }
    }
}

/// Local cache settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Processed dispatches after which an unresolved backfill entry is dropped
    pub backfill_eviction_threshold: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backfill_eviction_threshold: 100,
        }
    }
}

// Default value functions
fn default_gateway_version() -> u8 {
    6
}

fn default_large_threshold() -> u32 {
    250
}

fn default_max_reconnect_delay_secs() -> u64 {
    900
}

fn default_api_url() -> String {
    "https://discord.com/api/v6".to_string()
}

fn default_user_agent() -> String {
    format!("DiscordBot (courier, {})", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            shard: ShardConfig::default(),
            gateway: GatewayConfig::default(),
            rest: RestConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `COURIER_TOKEN` is missing or a variable fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("COURIER_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("COURIER_TOKEN"))?;

        let mut config = Self::new(token);

        config.shard.index = parse_var(&lookup, "COURIER_SHARD_INDEX", 0)?;
        config.shard.total = parse_var(&lookup, "COURIER_SHARD_TOTAL", 1)?;

        config.gateway.url = lookup("COURIER_GATEWAY_URL");
        config.gateway.compress = parse_bool(&lookup, "COURIER_COMPRESS", true)?;
        config.gateway.large_threshold =
            parse_var(&lookup, "COURIER_LARGE_THRESHOLD", default_large_threshold())?;
        config.gateway.auto_reconnect = parse_bool(&lookup, "COURIER_AUTO_RECONNECT", true)?;
        config.gateway.max_reconnect_delay = Duration::from_secs(parse_var(
            &lookup,
            "COURIER_MAX_RECONNECT_DELAY_SECS",
            default_max_reconnect_delay_secs(),
        )?);

        if let Some(url) = lookup("COURIER_API_URL") {
            config.rest.base_url = url;
        }
        config.rest.retry_on_timeout = parse_bool(&lookup, "COURIER_RETRY_ON_TIMEOUT", true)?;
        config.rest.relative_rate_limit =
            parse_bool(&lookup, "COURIER_RELATIVE_RATE_LIMIT", true)?;

        config.cache.backfill_eviction_threshold =
            parse_var(&lookup, "COURIER_BACKFILL_THRESHOLD", 100)?;

        config.validate()?;
        Ok(config)
    }

    /// Set the shard this client serves
    pub fn with_shard(mut self, index: u32, total: u32) -> Self {
        self.shard = ShardConfig { index, total };
        self
    }

    /// Use a fixed gateway URL instead of resolving it
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway.url = Some(url.into());
        self
    }

    /// Point the REST dispatcher at another API base URL
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.rest.base_url = url.into();
        self
    }

    /// Toggle automatic reconnects after recoverable disconnects
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.gateway.auto_reconnect = enabled;
        self
    }

    /// Toggle zlib-stream transport compression
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.gateway.compress = enabled;
        self
    }

    /// Set the spacing enforced between connect attempts
    pub fn with_identify_interval(mut self, interval: Duration) -> Self {
        self.gateway.identify_interval = interval;
        self
    }

    /// Set the initial and maximum reconnect backoff
    pub fn with_reconnect_delay(mut self, initial: Duration, max: Duration) -> Self {
        self.gateway.initial_reconnect_delay = initial;
        self.gateway.max_reconnect_delay = max;
        self
    }

    /// Toggle the single retry after a socket timeout
    pub fn with_retry_on_timeout(mut self, enabled: bool) -> Self {
        self.rest.retry_on_timeout = enabled;
        self
    }

    /// Authorization header value for REST requests
    pub fn authorization(&self) -> String {
        if self.token.starts_with("Bot ") {
            self.token.clone()
        } else {
            format!("Bot {}", self.token)
        }
    }

    /// Check the configuration for values the server would reject
    ///
    /// # Errors
    /// Returns the first offending variable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingVar("COURIER_TOKEN"));
        }
        if self.shard.total == 0 || self.shard.index >= self.shard.total {
            return Err(ConfigError::InvalidValue(
                "COURIER_SHARD_INDEX",
                format!("shard {} is outside 0..{}", self.shard.index, self.shard.total),
            ));
        }
        if !(50..=250).contains(&self.gateway.large_threshold) {
            return Err(ConfigError::InvalidValue(
                "COURIER_LARGE_THRESHOLD",
                format!("{} is outside 50..=250", self.gateway.large_threshold),
            ));
        }
        if self.gateway.max_reconnect_delay < self.gateway.initial_reconnect_delay {
            return Err(ConfigError::InvalidValue(
                "COURIER_MAX_RECONNECT_DELAY_SECS",
                "maximum delay is below the initial delay".to_string(),
            ));
        }
        if self.gateway.send_reserved >= self.gateway.send_budget {
            return Err(ConfigError::InvalidValue(
                "send_reserved",
                "reserve must leave room for regular frames".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(name, raw)),
        },
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
