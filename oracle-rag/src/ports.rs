//! Provider interfaces consumed by the core: embeddings, reranking and the
//! per-brand vector collection.
//!
//! All traits are dyn-compatible and return boxed futures because real
//! providers (Ollama, OpenAI, Qdrant) perform network I/O.

use futures::future::BoxFuture;

use crate::errors::OracleError;
use crate::filters::MetadataFilter;
use crate::types::{IndexedRow, Metadata, QueryResponse};

/// Provider interface for embedding generation.
///
/// Implement this trait to plug in your own embedding backend (e.g.,
/// Ollama, OpenAI, local models).
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a fixed-length vector.
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, OracleError>>;

    /// Embed many texts, batching `batch_size` inputs per backend call.
    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
        batch_size: usize,
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, OracleError>>;

    /// Vector dimensionality this provider produces.
    fn dimension(&self) -> usize;
}

/// Provider interface for precision reranking.
pub trait RerankProvider: Send + Sync {
    /// Score `(query, candidate)` pairs and return `(original_index, score)`
    /// tuples sorted score-descending (ties keep input order), truncated to
    /// `top_k`.
    fn rerank<'a>(
        &'a self,
        query: &'a str,
        texts: &'a [String],
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<(usize, f32)>, OracleError>>;
}

/// One brand's persisted collection of `(id, text, vector, metadata)` rows.
///
/// Tenancy isolation is physical: every brand gets its own collection
/// instance, so cross-brand queries are impossible by construction.
pub trait VectorCollection: Send + Sync {
    /// Physical collection name.
    fn name(&self) -> &str;

    /// Insert or replace rows by id.
    fn upsert<'a>(&'a self, rows: Vec<IndexedRow>) -> BoxFuture<'a, Result<(), OracleError>>;

    /// k-nearest-neighbor query with an optional metadata filter.
    /// Distances use the store's native metric (cosine distance here).
    fn query<'a>(
        &'a self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&'a MetadataFilter>,
    ) -> BoxFuture<'a, Result<QueryResponse, OracleError>>;

    /// Delete every row matching the filter; returns the number removed.
    fn delete_where<'a>(
        &'a self,
        filter: &'a MetadataFilter,
    ) -> BoxFuture<'a, Result<usize, OracleError>>;

    /// Total row count.
    fn count<'a>(&'a self) -> BoxFuture<'a, Result<usize, OracleError>>;

    /// Metadata of up to `limit` arbitrary rows (bounded sample, not a scan).
    fn peek<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<Metadata>, OracleError>>;

    /// Drop and recreate the collection, discarding every row.
    fn drop_all<'a>(&'a self) -> BoxFuture<'a, Result<(), OracleError>>;
}

/// Opens (lazily creating) the physical collection backing a brand.
///
/// The production implementation talks to Qdrant; tests use the in-memory
/// store.
pub trait CollectionProvider: Send + Sync {
    fn open<'a>(
        &'a self,
        name: &'a str,
        dim: usize,
    ) -> BoxFuture<'a, Result<std::sync::Arc<dyn VectorCollection>, OracleError>>;
}
