//! Ollama embedding provider implementation.
//!
//! Thin client for `POST {endpoint}/api/embeddings`; one request per text,
//! batches processed in configured-size windows.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use oracle_rag::{EmbeddingProvider, OracleError};

use crate::config::ModelServiceConfig;
use crate::error_handler::{AiModelError, Result as ModelResult};

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

/// Ollama embedding provider (async).
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    url_embeddings: String,
    dim: usize,
}

impl OllamaEmbedder {
    /// Construct a new embedder; `dim` is the dimensionality the backend is
    /// expected to produce, enforced on every response.
    pub fn new(cfg: &ModelServiceConfig, dim: usize) -> ModelResult<Self> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        let base = cfg.endpoint.trim_end_matches('/');
        Ok(Self {
            client,
            model: cfg.embedding_model.clone(),
            url_embeddings: format!("{base}/api/embeddings"),
            dim,
        })
    }

    async fn embed_one(&self, text: &str) -> ModelResult<Vec<f32>> {
        let body = EmbeddingsRequest {
            model: &self.model,
            prompt: text,
        };

        debug!(target: "ai_model_service::embed", url = %self.url_embeddings, "POST embeddings");
        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let snippet = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(240)
                .collect::<String>();
            return Err(AiModelError::HttpStatus {
                status,
                url: self.url_embeddings.clone(),
                snippet,
            });
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            AiModelError::Decode(format!("serde error: {e}; expected {{ embedding: number[] }}"))
        })?;
        Ok(out.embedding)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, OracleError>> {
        Box::pin(async move {
            let vector = self
                .embed_one(text)
                .await
                .map_err(|e| OracleError::Embedding(e.to_string()))?;
            if vector.len() != self.dim {
                return Err(OracleError::VectorSizeMismatch {
                    got: vector.len(),
                    want: self.dim,
                });
            }
            Ok(vector)
        })
    }

    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
        batch_size: usize,
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, OracleError>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(texts.len());
            for batch in texts.chunks(batch_size.max(1)) {
                debug!(
                    target: "ai_model_service::embed",
                    batch = batch.len(),
                    "embedding batch window"
                );
                for text in batch {
                    out.push(EmbeddingProvider::embed(self, text).await?);
                }
            }
            Ok(out)
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_the_wire_shape() {
        // `/api/embeddings` takes the text under `prompt`, not `input`.
        let body = EmbeddingsRequest {
            model: "all-minilm",
            prompt: "hello",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "all-minilm", "prompt": "hello"})
        );
    }

    #[test]
    fn endpoint_trailing_slash_is_normalized() {
        let mut cfg = ModelServiceConfig::default();
        cfg.endpoint = "http://host:11434/".to_string();
        let embedder = OllamaEmbedder::new(&cfg, 384).unwrap();
        assert_eq!(embedder.url_embeddings, "http://host:11434/api/embeddings");
    }
}
