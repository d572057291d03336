//! Unified error type for the oracle-rag crate.

use thiserror::Error;

/// Errors produced by the retrieval core.
#[derive(Debug, Error)]
pub enum OracleError {
    // ── Configuration / environment ──────────────────────────────────────────
    /// Required environment variable is missing.
    #[error("missing env variable: {key}")]
    EnvMissing { key: String },

    /// Failed to parse an environment variable into the expected type.
    #[error("failed to parse env variable: {key} = '{value}'")]
    EnvParse { key: String, value: String },

    /// Configuration combination is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input validation ────────────────────────────────────────────────────
    /// Caller-supplied input is empty or unusable.
    #[error("validation error: {0}")]
    Validation(String),

    // ── I/O & serialization ─────────────────────────────────────────────────
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Vector store ────────────────────────────────────────────────────────
    /// Transport / client error from Qdrant (message preserved).
    #[error("qdrant error: {0}")]
    Qdrant(String),

    // ── Model providers ─────────────────────────────────────────────────────
    /// Embedding backend failed to initialize or to embed inputs.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Reranking backend failed to score candidates.
    #[error("rerank error: {0}")]
    Rerank(String),

    /// Mismatch between a returned vector and the configured dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },
}
