use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] WebSocketError),

    #[error("Cluster error: {0}")]
    ClusterError(#[from] ClusterError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::WebSocketError(WebSocketError::ConnectionError(err.to_string()))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::ClusterError(ClusterError::ConnectionError(err.to_string()))
    }
}

// Add conversion from std::io::Error
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum WebSocketError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Message sending failed: {0}")]
    SendError(String),

    #[error("Frame of {0} bytes exceeds the inbound limit")]
    OversizedFrame(usize),

    #[error("Liveness deadline expired")]
    LivenessTimeout,

    #[error("Hub is shut down")]
    HubClosed,
}

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Publish failed: {0}")]
    PublishError(String),

    #[error("Subscribe failed: {0}")]
    SubscribeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        // Test IO error conversion
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::InternalError(_)));

        // Test config error conversion
        let config_err = config::ConfigError::NotFound(String::from("key not found"));
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::ConfigError(_)));

        // Test serde error conversion
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::SerializationError(_)));
    }

    #[test]
    fn test_error_display() {
        let err = AppError::WebSocketError(WebSocketError::LivenessTimeout);
        assert_eq!(err.to_string(), "WebSocket error: Liveness deadline expired");

        let err = AppError::WebSocketError(WebSocketError::OversizedFrame(4096));
        assert_eq!(
            err.to_string(),
            "WebSocket error: Frame of 4096 bytes exceeds the inbound limit"
        );

        let err = AppError::ClusterError(ClusterError::PublishError("queue full".to_string()));
        assert_eq!(err.to_string(), "Cluster error: Publish failed: queue full");
    }
}
