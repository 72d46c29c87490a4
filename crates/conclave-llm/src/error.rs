//! Error types for conclave-llm

use thiserror::Error;

/// LLM client error type
#[derive(Debug, Error)]
pub enum Error {
    /// API returned a non-success status
    #[error("api error: {0}")]
    Api(String),

    /// Response body could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Request was cancelled by the caller
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::Network(err.to_string())
        } else {
            Self::Api(err.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
