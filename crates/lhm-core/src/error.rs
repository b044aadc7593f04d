//! Error types for the server registry
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the server registry
///
/// Validation, Parse and Schema errors are raised before the registry is
/// touched. A Persistence error from a mutation is raised after the in-memory
/// registry already holds the change; only the stored copy lags behind until
/// the next successful write.
#[derive(Error, Debug)]
pub enum Error {
    /// A user-supplied field was rejected (bad or missing port on add)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Interchange text is not syntactically valid JSON
    #[error("Invalid JSON: {0}")]
    Parse(String),

    /// Interchange text parsed, but is not an array of servers
    #[error("Schema error: {0}")]
    Schema(String),

    /// Persistence port read/write failed, or the stored collection is corrupt
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Opening a URL through the navigation collaborator failed
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Handing an export payload to its sink failed
    #[error("Export error: {0}")]
    Export(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a navigation error
    pub fn navigation(msg: impl Into<String>) -> Self {
        Self::Navigation(msg.into())
    }

    /// Create an export error
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// True for errors caused by user input rather than the environment
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Parse(_) | Self::Schema(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
