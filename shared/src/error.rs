//! Error types for Ticket Pulse Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Ticket Pulse Lambda functions.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote API answered with a non-success status
    #[error("Upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Transport error talking to a remote API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Upstream { status, .. } if (400..600).contains(status) => *status,
            Error::Upstream { .. } | Error::Http(_) => 502,
            _ => 500,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}
