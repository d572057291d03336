//! Rerank provider backed by a TEI-style HTTP endpoint.
//!
//! Thin client for `POST {endpoint}/rerank` with body
//! `{ "query": ..., "texts": [...] }`, expecting
//! `[{ "index": n, "score": s }, ...]` back. The response is defensively
//! re-sorted score-descending (stable, so stage-1 order breaks ties) and
//! truncated to `top_k` before handing it to the core.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use oracle_rag::{OracleError, RerankProvider};

use crate::config::ModelServiceConfig;
use crate::error_handler::{AiModelError, Result as ModelResult};

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct RerankEntry {
    index: usize,
    score: f32,
}

/// HTTP rerank provider (async).
#[derive(Clone)]
pub struct HttpReranker {
    client: reqwest::Client,
    url_rerank: String,
}

impl HttpReranker {
    /// Construct a reranker from configuration. Returns `None` when no
    /// rerank endpoint is configured, so callers can wire the option
    /// straight into the core.
    pub fn from_config(cfg: &ModelServiceConfig) -> ModelResult<Option<Self>> {
        let endpoint = match &cfg.rerank_endpoint {
            Some(e) => e,
            None => return Ok(None),
        };
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Some(Self {
            client,
            url_rerank: format!("{}/rerank", endpoint.trim_end_matches('/')),
        }))
    }

    async fn score(&self, query: &str, texts: &[String]) -> ModelResult<Vec<RerankEntry>> {
        let body = RerankRequest { query, texts };

        debug!(
            target: "ai_model_service::rerank",
            url = %self.url_rerank,
            candidates = texts.len(),
            "POST rerank"
        );
        let resp = self.client.post(&self.url_rerank).json(&body).send().await?;

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
                url: self.url_rerank.clone(),
                snippet,
            });
        }

        resp.json().await.map_err(|e| {
            AiModelError::Decode(format!(
                "serde error: {e}; expected [{{ index, score }}, ...]"
            ))
        })
    }
}

impl RerankProvider for HttpReranker {
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        texts: &'a [String],
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<(usize, f32)>, OracleError>> {
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let entries = self
                .score(query, texts)
                .await
                .map_err(|e| OracleError::Rerank(e.to_string()))?;
            Ok(order_entries(entries, texts.len(), top_k))
        })
    }
}

/// Drop out-of-range indices, stable-sort by score descending, truncate.
fn order_entries(entries: Vec<RerankEntry>, candidates: usize, top_k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = entries
        .into_iter()
        .filter(|e| e.index < candidates)
        .map(|e| (e.index, e.score))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_sort_descending_and_truncate() {
        let entries = vec![
            RerankEntry { index: 0, score: 0.2 },
            RerankEntry { index: 1, score: 0.9 },
            RerankEntry { index: 2, score: 0.5 },
        ];
        let ordered = order_entries(entries, 3, 2);
        assert_eq!(ordered, vec![(1, 0.9), (2, 0.5)]);
    }

    #[test]
    fn out_of_range_indices_are_dropped() {
        let entries = vec![
            RerankEntry { index: 7, score: 0.9 },
            RerankEntry { index: 0, score: 0.4 },
        ];
        let ordered = order_entries(entries, 2, 5);
        assert_eq!(ordered, vec![(0, 0.4)]);
    }

    #[test]
    fn absent_endpoint_disables_the_reranker() {
        let cfg = ModelServiceConfig::default();
        assert!(HttpReranker::from_config(&cfg).unwrap().is_none());
    }

    #[test]
    fn request_body_matches_the_wire_shape() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let body = RerankRequest {
            query: "q",
            texts: &texts,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"query": "q", "texts": ["a", "b"]}));
    }
}
