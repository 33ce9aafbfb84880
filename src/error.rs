//! Error handling for the govm mining client
//!
//! Component-local error types for the mining pipeline. Nothing here
//! propagates upward through the mining loop; connection and submission
//! failures are contained where they occur and surface only as logs.

use thiserror::Error;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the govm mining client
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Websocket errors on the template feed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Wallet file errors
    #[error("Wallet error: {message}")]
    Wallet { message: String },

    /// Cryptographic errors
    #[error("Cryptographic error: {message}")]
    Crypto { message: String },

    /// Malformed or otherwise unusable template messages
    #[error("Template error: {message}")]
    Template { message: String },

    /// Network errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Timeout errors
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Invalid state errors
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a wallet error
    pub fn wallet(message: impl Into<String>) -> Self {
        Self::Wallet {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Check if error is retryable
    ///
    /// Everything that can happen on a template connection is retryable;
    /// the supervisor loop recycles the server and dials again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => {
                if let Some(status) = e.status() {
                    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                } else {
                    e.is_timeout() || e.is_connect() || e.is_request()
                }
            }
            Error::WebSocket(_) => true,
            Error::Network { .. } => true,
            Error::Timeout { .. } => true,
            Error::Template { .. } => true,
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Http(_) => "http",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
            Error::WebSocket(_) => "websocket",
            Error::Config { .. } => "config",
            Error::Wallet { .. } => "wallet",
            Error::Crypto { .. } => "crypto",
            Error::Template { .. } => "template",
            Error::Network { .. } => "network",
            Error::Timeout { .. } => "timeout",
            Error::InvalidState { .. } => "invalid_state",
        }
    }
}
