//! Error handling module for the BJDMS client.
//!
//! Provides the client error taxonomy with stable error codes for logs and the console.

use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const AUTHENTICATION_FAILED: &str = "AUTHENTICATION_FAILED";
    pub const SESSION_EXPIRED: &str = "SESSION_EXPIRED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const API_ERROR: &str = "API_ERROR";
    pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const CANCELLED: &str = "CANCELLED";
    pub const PUSH_CHANNEL_ERROR: &str = "PUSH_CHANNEL_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
}

/// Client error type.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Bad credentials at login
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The server rejected the session token
    #[error("session expired")]
    SessionExpired,
    /// No session is present
    #[error("not signed in")]
    Unauthenticated,
    /// Non-2xx response other than 401
    #[error("API error {status_code}: {status_text}")]
    Api {
        status_code: u16,
        status_text: String,
    },
    /// 2xx response whose body could not be decoded
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Transport failure
    #[error("network error: {0}")]
    Network(String),
    /// The request did not complete within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The request was cancelled by its owner
    #[error("request cancelled")]
    Cancelled,
    /// Push channel failure
    #[error("push channel error: {0}")]
    PushChannel(String),
    /// Durable local storage failure
    #[error("storage error: {0}")]
    Storage(String),
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Authentication(_) => codes::AUTHENTICATION_FAILED,
            ClientError::SessionExpired => codes::SESSION_EXPIRED,
            ClientError::Unauthenticated => codes::UNAUTHENTICATED,
            ClientError::Api { .. } => codes::API_ERROR,
            ClientError::MalformedResponse(_) => codes::MALFORMED_RESPONSE,
            ClientError::Network(_) => codes::NETWORK_ERROR,
            ClientError::Timeout(_) => codes::TIMEOUT,
            ClientError::Cancelled => codes::CANCELLED,
            ClientError::PushChannel(_) => codes::PUSH_CHANNEL_ERROR,
            ClientError::Storage(_) => codes::STORAGE_ERROR,
            ClientError::Config(_) => codes::CONFIG_ERROR,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Api { status_code, .. } => Some(*status_code),
            ClientError::SessionExpired => Some(401),
            _ => None,
        }
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Network(_) | ClientError::Timeout(_) => true,
            ClientError::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP transport error: {:?}", err);
        if err.is_decode() {
            ClientError::MalformedResponse(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Storage error: {:?}", err);
        ClientError::Storage(format!("Storage error: {}", err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::MalformedResponse(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(format!("Invalid URL: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        tracing::error!("Push channel error: {:?}", err);
        ClientError::PushChannel(err.to_string())
    }
}

/// Result alias used across the client.
pub type ClientResult<T> = Result<T, ClientError>;
