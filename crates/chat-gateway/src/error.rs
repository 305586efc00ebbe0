//! Gateway error types

use chat_common::ClientError;

/// Errors produced by the gateway session loop
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Close code 4004
    #[error("Authentication failed (close code 4004)")]
    AuthenticationFailed,

    /// Invalid shard, sharding required, bad API version, or bad intents
    #[error("Gateway closed the session with unrecoverable code {code}: {reason}")]
    FatalClose { code: u16, reason: String },

    #[error("Timed out waiting for Hello from the gateway")]
    HelloTimeout,

    #[error("Gave up after {0} reconnect attempts")]
    ReconnectAttemptsExhausted(u32),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unknown presence status: {0}")]
    InvalidStatus(String),

    #[error("Shutdown requested")]
    Shutdown,
}

impl GatewayError {
    /// Whether the session loop stops instead of reconnecting
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::FatalClose { .. }
                | Self::ReconnectAttemptsExhausted(_)
                | Self::Shutdown
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::AuthenticationFailed => {
                ClientError::AuthenticationFailed("gateway rejected the token".to_string())
            }
            GatewayError::FatalClose { .. } => ClientError::SessionInvalid,
            GatewayError::Json(e) => ClientError::malformed(e),
            other @ GatewayError::InvalidStatus(_) => ClientError::malformed(other),
            GatewayError::Shutdown => ClientError::ClientClosed,
            GatewayError::WebSocket(e) => {
                let connect = matches!(
                    *e,
                    tokio_tungstenite::tungstenite::Error::Io(_)
                        | tokio_tungstenite::tungstenite::Error::Url(_)
                );
                ClientError::network(e, connect)
            }
            other @ (GatewayError::HelloTimeout
            | GatewayError::ReconnectAttemptsExhausted(_)
            | GatewayError::Protocol(_)) => ClientError::network(other, false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_common::ErrorKind;

    #[test]
    fn test_error_display() {
        assert!(GatewayError::AuthenticationFailed.to_string().contains("4004"));
        assert!(GatewayError::HelloTimeout.to_string().contains("Hello"));
        let err = GatewayError::FatalClose {
            code: 4013,
            reason: "Invalid intents".to_string(),
        };
        assert!(err.to_string().contains("4013"));
        assert!(err.is_fatal());
        assert!(!GatewayError::HelloTimeout.is_fatal());
    }

    #[test]
    fn test_into_client_error() {
        let err: ClientError = GatewayError::AuthenticationFailed.into();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);

        let err: ClientError = GatewayError::Shutdown.into();
        assert_eq!(err.kind(), ErrorKind::ClientClosed);

        let err: ClientError = GatewayError::ReconnectAttemptsExhausted(3).into();
        assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    }
}
