// src/error.rs

//! Unified error handling for the watcher application.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport failed (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-200 status
    #[error("Unexpected HTTP status: {code} {status}")]
    HttpStatus { code: u16, status: String },

    /// Upstream served a CAPTCHA challenge instead of results
    #[error("Captcha pass required")]
    CaptchaRequired,

    /// Embedded listing payload is missing required structure
    #[error("Malformed payload: {0}")]
    Payload(String),

    /// Marker store operation failed
    #[error("Cache storage error: {0}")]
    CacheStorage(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notify(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a malformed payload error.
    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }

    /// Create a cache storage error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::CacheStorage(message.into())
    }

    /// Create a notification error.
    pub fn notify(message: impl Into<String>) -> Self {
        Self::Notify(message.into())
    }
}
