//! Embedding doubles shipped with the core.
//!
//! Real backends (Ollama, OpenAI, etc.) live behind the
//! [`EmbeddingProvider`](crate::ports::EmbeddingProvider) port in the model
//! service crate; the doubles here keep tests and local experiments free of
//! network dependencies.

pub mod hash_embedder;
pub mod noop_embedder;

pub use hash_embedder::HashEmbedder;
pub use noop_embedder::NoopEmbedder;
