//! Tracing and logging setup
//!
//! Configures the `tracing` subscriber with environment-based filtering.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::Environment;

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level used when `RUST_LOG` is unset
    pub level: Level,
    /// Level for the gateway crate, which logs every packet at debug
    pub gateway_level: Level,
    pub json: bool,
    /// Include span events (new, close)
    pub span_events: bool,
    pub file_line: bool,
    pub thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            gateway_level: Level::INFO,
            json: false,
            span_events: false,
            file_line: true,
            thread_names: false,
        }
    }
}

impl TracingConfig {
    /// Debug logging, human readable
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            gateway_level: Level::DEBUG,
            json: false,
            span_events: true,
            file_line: true,
            thread_names: true,
        }
    }

    /// Info logging as JSON lines
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            gateway_level: Level::WARN,
            json: true,
            span_events: false,
            file_line: false,
            thread_names: false,
        }
    }

    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        if environment.is_production() {
            Self::production()
        } else {
            Self::development()
        }
    }

    /// Filter directives applied when `RUST_LOG` is unset
    pub fn directives(&self) -> String {
        format!(
            "{},chat_gateway={},tungstenite=warn,hyper=warn,reqwest=warn",
            self.level.as_str().to_lowercase(),
            self.gateway_level.as_str().to_lowercase()
        )
    }
}

/// Try to initialize tracing with the default configuration
///
/// Returns an error instead of panicking if a subscriber is already set.
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Try to initialize tracing with custom configuration
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directives()));

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_thread_names(config.thread_names)
        .with_span_events(span_events);

    let fmt_layer = if config.json {
        base.json().boxed()
    } else {
        base.boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
