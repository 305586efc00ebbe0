//! Client configuration
//!
//! Loads configuration from environment variables (optionally via a `.env`
//! file) or builds it programmatically from a bot token.

use chat_core::Intents;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Clone)]
pub struct ClientConfig {
    pub token: String,
    pub api_base_url: String,
    pub gateway_url: String,
    pub intents: Intents,
    pub shard: ShardConfig,
    pub rest: RestConfig,
    pub gateway: GatewayConfig,
    pub events: EventConfig,
    pub environment: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardConfig {
    pub id: u32,
    pub count: u32,
}

/// REST executor settings
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Attempts allowed after a 429 before giving up with `RateLimited`
    pub max_retries: u32,
    pub timeout_ms: u64,
}

/// Gateway session settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
    pub hello_timeout_ms: u64,
    /// Minimum gap between two identifies with the same token
    pub identify_interval_ms: u64,
    /// Member count above which a server is sent without offline members
    pub large_threshold: u16,
}

/// Event dispatch queue settings
#[derive(Debug, Clone)]
pub struct EventConfig {
    pub workers: usize,
}

// Default value functions
pub const DEFAULT_API_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

fn default_max_retries() -> u32 {
    5
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_hello_timeout_ms() -> u64 {
    20_000
}

fn default_identify_interval_ms() -> u64 {
    5_000
}

fn default_large_threshold() -> u16 {
    250
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(2)
        .max(2)
}

impl ClientConfig {
    /// Configuration with default settings for `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base_url: DEFAULT_API_URL.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            intents: Intents::default(),
            shard: ShardConfig { id: 0, count: 1 },
            rest: RestConfig {
                max_retries: default_max_retries(),
                timeout_ms: default_timeout_ms(),
            },
            gateway: GatewayConfig {
                backoff_base_ms: default_backoff_base_ms(),
                backoff_max_ms: default_backoff_max_ms(),
                max_reconnect_attempts: None,
                hello_timeout_ms: default_hello_timeout_ms(),
                identify_interval_ms: default_identify_interval_ms(),
                large_threshold: default_large_threshold(),
            },
            events: EventConfig {
                workers: default_workers(),
            },
            environment: Environment::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CHAT_TOKEN` is missing or a numeric variable
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("CHAT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("CHAT_TOKEN"))?;

        let mut config = Self::new(token);

        if let Some(url) = lookup("CHAT_API_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("CHAT_GATEWAY_URL") {
            config.gateway_url = url;
        }
        if let Some(bits) = parse_var::<u32, _>(&lookup, "CHAT_INTENTS")? {
            config.intents = Intents::from_bits_truncate(bits);
        }

        config.shard.id = parse_var(&lookup, "CHAT_SHARD_ID")?.unwrap_or(0);
        config.shard.count = parse_var(&lookup, "CHAT_SHARD_COUNT")?.unwrap_or(1);
        if config.shard.count == 0 || config.shard.id >= config.shard.count {
            return Err(ConfigError::InvalidValue(
                "CHAT_SHARD_ID",
                format!("shard {} of {}", config.shard.id, config.shard.count),
            ));
        }

        config.rest.max_retries =
            parse_var(&lookup, "CHAT_REST_MAX_RETRIES")?.unwrap_or_else(default_max_retries);
        config.rest.timeout_ms =
            parse_var(&lookup, "CHAT_REST_TIMEOUT_MS")?.unwrap_or_else(default_timeout_ms);

        config.gateway.backoff_base_ms =
            parse_var(&lookup, "CHAT_BACKOFF_BASE_MS")?.unwrap_or_else(default_backoff_base_ms);
        config.gateway.backoff_max_ms =
            parse_var(&lookup, "CHAT_BACKOFF_MAX_MS")?.unwrap_or_else(default_backoff_max_ms);
        config.gateway.max_reconnect_attempts =
            parse_var(&lookup, "CHAT_MAX_RECONNECT_ATTEMPTS")?;

        config.events.workers = parse_var::<usize, _>(&lookup, "CHAT_EVENT_WORKERS")?
            .map_or_else(default_workers, |n| n.max(1));

        config.environment = lookup("APP_ENV")
            .and_then(|s| Environment::parse(&s))
            .unwrap_or_default();

        Ok(config)
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    #[must_use]
    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_millis(self.rest.timeout_ms)
    }

    pub fn hello_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway.hello_timeout_ms)
    }

    pub fn identify_interval(&self) -> Duration {
        Duration::from_millis(self.gateway.identify_interval_ms)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
    }
}

// Keeps the token out of logs
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("gateway_url", &self.gateway_url)
            .field("intents", &self.intents)
            .field("shard", &self.shard)
            .field("rest", &self.rest)
            .field("gateway", &self.gateway)
            .field("events", &self.events)
            .field("environment", &self.environment)
            .finish()
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
