//! Client error types
//!
//! Every failure surfaced to library users is a `ClientError`. Callers branch
//! on [`ClientError::kind`] rather than on variant payloads.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::rest_code::{FieldError, RestErrorCode};
use crate::config::ConfigError;

/// Request metadata kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
    /// Route template used as the rate limit key
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Response metadata kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<RestErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request plus response of a failed REST call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestContext {
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
}

impl fmt::Display for RestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.request.method, self.request.path, self.response.status
        )?;
        if let Some(message) = &self.response.message {
            write!(f, " ({message})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionKind {
    MissingPermissions,
    CannotMessageUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotFoundKind {
    Generic,
    UnknownMessage,
    UnknownChannel,
    UnknownServer,
    UnknownRole,
    UnknownUser,
}

impl PermissionKind {
    pub fn from_code(code: Option<RestErrorCode>) -> Self {
        match code {
            Some(RestErrorCode::CannotMessageUser) => Self::CannotMessageUser,
            _ => Self::MissingPermissions,
        }
    }
}

impl NotFoundKind {
    pub fn from_code(code: Option<RestErrorCode>) -> Self {
        match code {
            Some(RestErrorCode::UnknownMessage) => Self::UnknownMessage,
            Some(RestErrorCode::UnknownChannel) => Self::UnknownChannel,
            Some(RestErrorCode::UnknownServer) => Self::UnknownServer,
            Some(RestErrorCode::UnknownRole) => Self::UnknownRole,
            Some(RestErrorCode::UnknownUser) => Self::UnknownUser,
            _ => Self::Generic,
        }
    }
}

/// Client-wide error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // Gateway errors
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Session invalidated by the gateway")]
    SessionInvalid,

    #[error("Zombie connection: heartbeat was not acknowledged")]
    ZombieConnection,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    // REST errors
    #[error("Rate limited on {route}, retry after {retry_after:?} (global: {global})")]
    RateLimited {
        route: String,
        retry_after: Duration,
        global: bool,
    },

    #[error("Permission denied ({kind:?}): {context}")]
    PermissionDenied {
        kind: PermissionKind,
        context: Box<RestContext>,
    },

    #[error("Not found ({kind:?}): {context}")]
    NotFound {
        kind: NotFoundKind,
        context: Box<RestContext>,
    },

    #[error("Bad request: {context}")]
    BadRequest {
        errors: Vec<FieldError>,
        context: Box<RestContext>,
    },

    #[error("HTTP error: {context}")]
    Http { context: Box<RestContext> },

    #[error("Network failure: {message}")]
    NetworkFailure {
        message: String,
        /// Failed before the request reached the server
        connect: bool,
    },

    #[error("Client closed")]
    ClientClosed,

    // Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Fieldless discriminant of [`ClientError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MalformedPacket,
    SessionInvalid,
    ZombieConnection,
    AuthenticationFailed,
    RateLimited,
    PermissionDenied,
    NotFound,
    BadRequest,
    Http,
    NetworkFailure,
    ClientClosed,
    Config,
}

impl ClientError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedPacket(_) => ErrorKind::MalformedPacket,
            Self::SessionInvalid => ErrorKind::SessionInvalid,
            Self::ZombieConnection => ErrorKind::ZombieConnection,
            Self::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Http { .. } => ErrorKind::Http,
            Self::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            Self::ClientClosed => ErrorKind::ClientClosed,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether repeating the same call may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkFailure { connect, .. } => *connect,
            Self::Http { context } => context.response.status >= 500,
            Self::ZombieConnection | Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Request/response snapshot, when the error came from a REST response
    #[must_use]
    pub fn context(&self) -> Option<&RestContext> {
        match self {
            Self::PermissionDenied { context, .. }
            | Self::NotFound { context, .. }
            | Self::BadRequest { context, .. }
            | Self::Http { context } => Some(context),
            _ => None,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.context().map(|c| c.response.status)
    }

    #[must_use]
    pub fn rest_code(&self) -> Option<RestErrorCode> {
        self.context().and_then(|c| c.response.code)
    }

    pub fn network(message: impl fmt::Display, connect: bool) -> Self {
        Self::NetworkFailure {
            message: message.to_string(),
            connect,
        }
    }

    pub fn malformed(message: impl fmt::Display) -> Self {
        Self::MalformedPacket(message.to_string())
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn context(status: u16, code: Option<RestErrorCode>) -> Box<RestContext> {
        Box::new(RestContext {
            request: RequestSnapshot {
                method: "POST".to_string(),
                path: "/channels/1/messages".to_string(),
                query: Vec::new(),
                route: "POST /channels/{channel_id}/messages".to_string(),
                body: None,
            },
            response: ResponseSnapshot {
                status,
                body: String::new(),
                code,
                message: Some("Missing Access".to_string()),
            },
        })
    }

    #[test]
    fn test_kind_is_fieldless() {
        assert_eq!(ClientError::ClientClosed.kind(), ErrorKind::ClientClosed);
        assert_eq!(ClientError::malformed("eof").kind(), ErrorKind::MalformedPacket);
        let err = ClientError::NotFound {
            kind: NotFoundKind::UnknownMessage,
            context: context(404, Some(RestErrorCode::UnknownMessage)),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.rest_code(), Some(RestErrorCode::UnknownMessage));
    }

    #[test]
    fn test_subtype_selection() {
        assert_eq!(
            PermissionKind::from_code(Some(RestErrorCode::CannotMessageUser)),
            PermissionKind::CannotMessageUser
        );
        assert_eq!(
            PermissionKind::from_code(Some(RestErrorCode::MissingAccess)),
            PermissionKind::MissingPermissions
        );
        assert_eq!(PermissionKind::from_code(None), PermissionKind::MissingPermissions);
        assert_eq!(
            NotFoundKind::from_code(Some(RestErrorCode::UnknownChannel)),
            NotFoundKind::UnknownChannel
        );
        assert_eq!(NotFoundKind::from_code(Some(RestErrorCode::Other(1))), NotFoundKind::Generic);
    }

    #[test]
    fn test_is_retryable() {
        assert!(ClientError::network("connection refused", true).is_retryable());
        assert!(!ClientError::network("reset mid-body", false).is_retryable());
        assert!(ClientError::Http { context: context(502, None) }.is_retryable());
        assert!(!ClientError::Http { context: context(418, None) }.is_retryable());
        assert!(!ClientError::ClientClosed.is_retryable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = ClientError::PermissionDenied {
            kind: PermissionKind::MissingPermissions,
            context: context(403, Some(RestErrorCode::MissingAccess)),
        };
        assert_eq!(
            err.to_string(),
            "Permission denied (MissingPermissions): POST /channels/1/messages -> 403 (Missing Access)"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: ClientError = ConfigError::MissingVar("CHAT_TOKEN").into();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.to_string(), "Missing required environment variable: CHAT_TOKEN");
    }
}
