// src/error.rs

//! Unified error handling for the hub client.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// The hub answered 401; the session token must be refreshed.
    #[error("Authentication required")]
    AuthRequired,

    /// The hub refused the credentials
    #[error("Login rejected by hub (HTTP {status})")]
    LoginRejected { status: u16 },

    /// Startup authentication could not be completed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Unexpected HTTP status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Selector (XPath or CSS) could not be compiled
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// The CA certificate used to pin hub connections is missing
    #[error("CA certificate not found at {}", path.display())]
    MissingCaCertificate { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a startup authentication error.
    pub fn authentication(message: impl fmt::Display) -> Self {
        Self::Authentication(message.to_string())
    }

    /// Whether this error is the hub's request to re-authenticate.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }

    /// Process exit code for an error that ends the process.
    ///
    /// `2` is reserved for a failed initial login; every other fatal
    /// condition (missing CA file, bad configuration) exits with `1`.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Authentication(_) | Self::LoginRejected { .. } => 2,
            _ => 1,
        }
    }
}
