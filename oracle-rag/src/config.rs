//! Configuration layer: reads runtime settings from environment variables
//! and exposes strongly typed configs for chunking, search and the vector
//! store.

use serde::{Deserialize, Serialize};

use crate::errors::OracleError;

/// Document chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Trailing-character overlap carried into the next chunk.
    pub chunk_overlap: usize,
    /// Hard cap on chunks emitted per document.
    pub max_chunks_per_doc: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            max_chunks_per_doc: 500,
        }
    }
}

/// Search behavior knobs (top-k, reranking, thresholds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default top-k results to return.
    pub default_top_k: usize,
    /// Top-k kept after the rerank stage.
    pub rerank_top_k: usize,
    /// Minimum stage-1 similarity kept as a candidate (0.0..=1.0).
    pub similarity_threshold: f32,
    /// Whether a reranking provider should be wired at all.
    pub use_reranker: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            rerank_top_k: 5,
            similarity_threshold: 0.5,
            use_reranker: true,
        }
    }
}

/// Embedding backend parameters shared by indexing and search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model identifier (e.g., "all-minilm").
    pub model: String,
    /// Embedding vector dimensionality.
    pub dim: usize,
    /// Batch size for bulk embedding calls.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm".to_string(),
            dim: 384,
            batch_size: 32,
        }
    }
}

/// Qdrant connectivity and collection naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// gRPC URL for Qdrant (e.g., "http://localhost:6334").
    pub url: String,
    /// Prefix prepended to every brand collection name.
    pub collection_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection_prefix: "brand_".to_string(),
        }
    }
}

/// Top-level runtime configuration for the retrieval service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Chunking parameters.
    pub chunking: ChunkingConfig,
    /// Search behavior settings.
    pub search: SearchConfig,
    /// Embedding backend settings.
    pub embedding: EmbeddingConfig,
    /// Vector store connectivity & naming.
    pub store: StoreConfig,
}

impl OracleConfig {
    /// Build configuration from environment variables.
    ///
    /// Environment variables used:
    /// - `ORACLE_CHUNK_SIZE` (default: 512)
    /// - `ORACLE_CHUNK_OVERLAP` (default: 50)
    /// - `ORACLE_MAX_CHUNKS_PER_DOC` (default: 500)
    /// - `ORACLE_DEFAULT_TOP_K` (default: 10)
    /// - `ORACLE_RERANK_TOP_K` (default: 5)
    /// - `ORACLE_SIMILARITY_THRESHOLD` (default: 0.5)
    /// - `ORACLE_USE_RERANKER` (default: true)
    /// - `ORACLE_EMBEDDING_MODEL` (default: "all-minilm")
    /// - `ORACLE_EMBEDDING_DIM` (default: 384)
    /// - `ORACLE_BATCH_SIZE` (default: 32)
    /// - `ORACLE_QDRANT_URL` (default: "http://localhost:6334")
    /// - `ORACLE_COLLECTION_PREFIX` (default: "brand_")
    pub fn from_env() -> Result<Self, OracleError> {
        let chunking = ChunkingConfig {
            chunk_size: read_usize_env("ORACLE_CHUNK_SIZE").unwrap_or(512),
            chunk_overlap: read_usize_env("ORACLE_CHUNK_OVERLAP").unwrap_or(50),
            max_chunks_per_doc: read_usize_env("ORACLE_MAX_CHUNKS_PER_DOC").unwrap_or(500),
        };

        let search = SearchConfig {
            default_top_k: read_usize_env("ORACLE_DEFAULT_TOP_K").unwrap_or(10),
            rerank_top_k: read_usize_env("ORACLE_RERANK_TOP_K").unwrap_or(5),
            similarity_threshold: read_f32_env("ORACLE_SIMILARITY_THRESHOLD").unwrap_or(0.5),
            use_reranker: read_bool_env("ORACLE_USE_RERANKER").unwrap_or(true),
        };

        let embedding = EmbeddingConfig {
            model: std::env::var("ORACLE_EMBEDDING_MODEL").unwrap_or_else(|_| "all-minilm".into()),
            dim: read_usize_env("ORACLE_EMBEDDING_DIM").unwrap_or(384),
            batch_size: read_usize_env("ORACLE_BATCH_SIZE").unwrap_or(32),
        };

        let store = StoreConfig {
            url: std::env::var("ORACLE_QDRANT_URL")
                .unwrap_or_else(|_| "http://localhost:6334".into()),
            collection_prefix: std::env::var("ORACLE_COLLECTION_PREFIX")
                .unwrap_or_else(|_| "brand_".into()),
        };

        let cfg = Self {
            chunking,
            search,
            embedding,
            store,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), OracleError> {
        if self.chunking.chunk_size == 0 {
            return Err(OracleError::InvalidConfig(
                "ORACLE_CHUNK_SIZE must be > 0".into(),
            ));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(OracleError::InvalidConfig(
                "ORACLE_CHUNK_OVERLAP must be smaller than ORACLE_CHUNK_SIZE".into(),
            ));
        }
        if self.chunking.max_chunks_per_doc == 0 {
            return Err(OracleError::InvalidConfig(
                "ORACLE_MAX_CHUNKS_PER_DOC must be > 0".into(),
            ));
        }
        if self.search.default_top_k == 0 {
            return Err(OracleError::InvalidConfig(
                "ORACLE_DEFAULT_TOP_K must be > 0".into(),
            ));
        }
        if self.embedding.dim == 0 {
            return Err(OracleError::InvalidConfig(
                "ORACLE_EMBEDDING_DIM must be > 0".into(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(OracleError::InvalidConfig(
                "ORACLE_BATCH_SIZE must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Derive the physical collection name for a brand: fixed prefix,
    /// lower-cased brand, spaces replaced with underscores.
    pub fn collection_name(&self, brand: &str) -> String {
        format!(
            "{}{}",
            self.store.collection_prefix,
            brand.to_lowercase().replace(' ', "_")
        )
    }
}

/// Read a `usize` from env, with error mapped to `OracleError`.
fn read_usize_env(key: &str) -> Result<usize, OracleError> {
    match std::env::var(key) {
        Ok(v) => v.parse::<usize>().map_err(|_| OracleError::EnvParse {
            key: key.into(),
            value: v,
        }),
        Err(_) => Err(OracleError::EnvMissing { key: key.into() }),
    }
}

/// Read an optional `bool` from env.
fn read_bool_env(key: &str) -> Result<bool, OracleError> {
    match std::env::var(key) {
        Ok(v) => v.parse::<bool>().map_err(|_| OracleError::EnvParse {
            key: key.into(),
            value: v,
        }),
        Err(_) => Err(OracleError::EnvMissing { key: key.into() }),
    }
}

/// Read an optional `f32` from env.
fn read_f32_env(key: &str) -> Result<f32, OracleError> {
    match std::env::var(key) {
        Ok(v) => v.parse::<f32>().map_err(|_| OracleError::EnvParse {
            key: key.into(),
            value: v,
        }),
        Err(_) => Err(OracleError::EnvMissing { key: key.into() }),
    }
}
