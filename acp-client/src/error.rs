//! Error types for ACP backend client operations.

use thiserror::Error;

/// Main error type for ACP backend client operations.
#[derive(Debug, Error)]
pub enum AcpError {
    /// The backend answered with a non-success status code.
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Network communication error below the HTTP layer.
    #[error("Network error: {message}")]
    Network { message: String },

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Invalid configuration or parameters.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },
}

/// Convenience type alias for Results with AcpError.
pub type AcpResult<T> = std::result::Result<T, AcpError>;

/// Status code and message recovered from an error, including bodies that
/// arrive as JSON-in-a-string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpErrorInfo {
    pub status_code: Option<u16>,
    pub message: Option<String>,
}

impl From<reqwest::Error> for AcpError {
    fn from(error: reqwest::Error) -> Self {
        AcpError::Network {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for AcpError {
    fn from(error: serde_json::Error) -> Self {
        AcpError::Serialization {
            message: error.to_string(),
        }
    }
}
