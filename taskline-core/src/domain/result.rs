//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An action needs a signed-in identity and there is none
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Network or store failure. Never retried inside the core.
    #[error("Backend unavailable: {0}")]
    TransientBackend(String),

    #[error("Email address is already in use: {0}")]
    EmailAlreadyInUse(String),

    /// Unknown email and wrong password are deliberately indistinguishable
    #[error("Email address or password is incorrect")]
    InvalidCredentials,

    #[error("No user registered with email: {0}")]
    UserNotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transient backend error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::TransientBackend(msg.into())
    }

    /// True for errors raised locally, before any backend was contacted
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Validation(_))
    }
}

// Errors are cloned into every feed subscriber, so sources are kept as messages.
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
