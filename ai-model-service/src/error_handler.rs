//! Unified error handling for `ai-model-service`.
//!
//! One top-level [`AiModelError`] covers the whole crate. All messages
//! include the suffix `[AI Model Service]` to simplify attribution in logs.

use reqwest::StatusCode;
use thiserror::Error;

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, AiModelError>;

/// Top-level error for the `ai-model-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AiModelError {
    /// A numeric setting failed to parse.
    #[error("[AI Model Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: String,
    },

    /// Underlying HTTP transport error.
    #[error("[AI Model Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Non-2xx response from a model endpoint.
    #[error("[AI Model Service] http {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        snippet: String,
    },

    /// Response body could not be decoded into the expected shape.
    #[error("[AI Model Service] decode error: {0}")]
    Decode(String),
}
