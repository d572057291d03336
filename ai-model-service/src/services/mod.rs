//! Concrete model clients.

pub mod http_rerank;
pub mod ollama_embed;
