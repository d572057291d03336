//! Core data models: chunks, store rows, search hits, context bundles and
//! operation outcomes. No algorithm code lives here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scalar metadata value accepted by the vector store.
///
/// Anything non-scalar a caller supplies is stringified before it reaches
/// a collection row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl MetaValue {
    /// Coerce arbitrary JSON into a store-compatible scalar.
    /// Arrays and objects collapse to their JSON string form.
    pub fn coerce(value: &Value) -> MetaValue {
        match value {
            Value::String(s) => MetaValue::Str(s.clone()),
            Value::Bool(b) => MetaValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetaValue::Int(i)
                } else {
                    MetaValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            other => MetaValue::Str(other.to_string()),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Int(i)
    }
}

impl From<usize> for MetaValue {
    fn from(i: usize) -> Self {
        MetaValue::Int(i as i64)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// Scalar metadata map attached to a persisted chunk.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A bounded excerpt of a document, produced by the chunker and discarded
/// after persistence.
///
/// Offsets are character positions within the concatenation of emitted
/// chunks, not the source document (overlap insertion makes exact source
/// offsets meaningless; this is intentional).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    /// Caller metadata plus `chunk_index` / `total_chunks` / `doc_id`.
    pub metadata: BTreeMap<String, Value>,
    /// `"{doc_id}_chunk_{index}"`.
    pub chunk_id: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Chunker output: the ordered chunks plus a non-fatal truncation signal.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutcome {
    pub chunks: Vec<DocumentChunk>,
    /// True when the document exceeded `max_chunks_per_doc` and trailing
    /// chunks were discarded.
    pub truncated: bool,
}

/// Aggregate statistics over one chunk batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChunkStats {
    pub count: usize,
    pub avg_length: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub total_chars: usize,
}

/// A row as persisted in the vector store.
#[derive(Debug, Clone)]
pub struct IndexedRow {
    /// Chunk id suffixed with the first 16 hex chars of the content hash.
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub vector: Vec<f32>,
}

/// Raw response of a k-NN query, column-oriented like the store itself.
#[derive(Debug, Clone, Default)]
pub struct QueryResponse {
    pub ids: Vec<String>,
    pub texts: Vec<String>,
    pub metadatas: Vec<Metadata>,
    pub distances: Vec<f32>,
}

/// A single semantic search hit (ranked by final relevance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    /// Stage-1 similarity (`1 - distance`); reranking never rewrites it.
    pub similarity: f32,
    pub metadata: Metadata,
    pub chunk_id: String,
    /// Dense 1-based rank over the final ordering.
    pub rank: usize,
    /// Present only when the rerank stage ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

/// One source entry inside a [`ContextBundle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSource {
    pub chunk_id: String,
    pub score: f32,
    pub rank: usize,
    pub metadata: Metadata,
}

/// Token-bounded context block assembled from top search hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub context: String,
    pub sources: Vec<ContextSource>,
    pub total_chars: usize,
    pub num_sources: usize,
}

/// Result of one indexing batch. A store-layer failure degrades the whole
/// batch to `{indexed: 0, failed: n}` instead of raising.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub indexed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full report of one document-indexing call, as returned at the service
/// boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexReport {
    pub indexed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub chunk_stats: ChunkStats,
    /// True when the document hit `max_chunks_per_doc` and was cut short.
    pub truncated: bool,
}

/// Result of a delete or clear operation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: usize,
}

/// Collection statistics. `sample_doc_count` is computed from a bounded
/// peek, so it is an approximation of the distinct-document count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub brand: String,
    pub total_chunks: usize,
    pub sample_doc_count: usize,
    pub embedding_dimension: usize,
}
