//! Environment-driven configuration for the model backends.

use std::time::Duration;

use crate::error_handler::{AiModelError, Result};

/// Connectivity settings for the embedding and rerank backends.
///
/// Environment variables:
/// - `AI_MODEL_ENDPOINT` (default: "http://localhost:11434")
/// - `AI_EMBEDDING_MODEL` (default: "all-minilm")
/// - `AI_RERANK_ENDPOINT` (default: unset — reranking disabled)
/// - `AI_MODEL_TIMEOUT_SECS` (default: 30)
#[derive(Debug, Clone)]
pub struct ModelServiceConfig {
    /// Base URL of the Ollama-style embedding server.
    pub endpoint: String,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Base URL of a TEI-style rerank server, when one is deployed.
    pub rerank_endpoint: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ModelServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            embedding_model: "all-minilm".to_string(),
            rerank_endpoint: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ModelServiceConfig {
    /// Build configuration from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let timeout = match std::env::var("AI_MODEL_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse::<u64>().map_err(|e| {
                AiModelError::InvalidNumber {
                    var: "AI_MODEL_TIMEOUT_SECS",
                    reason: e.to_string(),
                }
            })?),
            Err(_) => defaults.timeout,
        };

        Ok(Self {
            endpoint: std::env::var("AI_MODEL_ENDPOINT").unwrap_or(defaults.endpoint),
            embedding_model: std::env::var("AI_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            rerank_endpoint: std::env::var("AI_RERANK_ENDPOINT").ok().filter(|s| !s.is_empty()),
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_ollama() {
        let cfg = ModelServiceConfig::default();
        assert_eq!(cfg.endpoint, "http://localhost:11434");
        assert_eq!(cfg.embedding_model, "all-minilm");
        assert!(cfg.rerank_endpoint.is_none());
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }
}
