use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Camera frame could not be sent. Swallowed at the `PtzCamera` boundary.
    #[error("Camera transport error [{target}]: {reason}")]
    Transport { target: String, reason: String },

    #[error("Switcher handshake with {host}:{port} failed: {reason}")]
    Handshake {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Request {request_type} timed out after {timeout_ms}ms")]
    RequestTimeout {
        request_type: String,
        timeout_ms: u64,
    },

    #[error("Request {request_type} failed: {comment}")]
    RequestFailed {
        request_type: String,
        comment: String,
    },

    #[error("Unknown intent: {0}")]
    UnknownIntent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not connected to switcher")]
    NotConnected,

    #[error("Switcher connection closed")]
    ConnectionClosed,

    #[error("Scene {number} not found. Available: 1-{available}")]
    SceneOutOfRange { number: usize, available: usize },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable kind, used in events and command results
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Transport { .. } => "transport",
            AppError::Handshake { .. } => "handshake",
            AppError::RequestTimeout { .. } => "request_timeout",
            AppError::RequestFailed { .. } => "request_failed",
            AppError::UnknownIntent(_) => "unknown_intent",
            AppError::Config(_) => "configuration",
            AppError::NotConnected => "not_connected",
            AppError::ConnectionClosed => "connection_closed",
            AppError::SceneOutOfRange { .. } => "scene_out_of_range",
            AppError::BadRequest(_) => "bad_request",
            AppError::Protocol(_) => "protocol",
            AppError::Io(_) => "io",
            AppError::Serialization(_) => "serialization",
            AppError::WebSocket(_) => "websocket",
            AppError::Internal(_) => "internal",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_out_of_range_names_valid_range() {
        let err = AppError::SceneOutOfRange {
            number: 4,
            available: 3,
        };
        assert_eq!(err.to_string(), "Scene 4 not found. Available: 1-3");
    }

    #[test]
    fn test_handshake_names_host_and_port() {
        let err = AppError::Handshake {
            host: "studio.local".to_string(),
            port: 4455,
            reason: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("studio.local:4455"));
        assert!(msg.contains("connection refused"));
    }
}
