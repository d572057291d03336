//! HTTP adapters for the retrieval core's model ports.
//!
//! Two thin clients live here:
//! - [`OllamaEmbedder`] — embeddings via an Ollama-style
//!   `POST {endpoint}/api/embeddings` endpoint.
//! - [`HttpReranker`] — candidate scoring via a TEI-style
//!   `POST {endpoint}/rerank` endpoint.
//!
//! Both implement the provider traits from `oracle-rag`, so the core never
//! sees HTTP. Errors stay crate-local ([`AiModelError`]) until the trait
//! boundary, where they map into the core's error type.

pub mod config;
pub mod error_handler;
pub mod services;

pub use config::ModelServiceConfig;
pub use error_handler::{AiModelError, Result};
pub use services::http_rerank::HttpReranker;
pub use services::ollama_embed::OllamaEmbedder;
