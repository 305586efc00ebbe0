//! # chat-common
//!
//! Shared utilities including configuration, error handling, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    ClientConfig, ConfigError, Environment, EventConfig, GatewayConfig, RestConfig, ShardConfig,
};
pub use error::{
    ClientError, ClientResult, ErrorKind, FieldError, NotFoundKind, PermissionKind,
    RequestSnapshot, ResponseSnapshot, RestContext, RestErrorBody, RestErrorCode,
};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
