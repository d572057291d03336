//! Indexing pipeline: chunk, embed, persist.
//!
//! Row ids are content-addressed: the chunk id plus the first 16 hex chars
//! of the text's SHA-256. Re-indexing unchanged content therefore overwrites
//! the same rows instead of growing the collection.
//!
//! A store- or embedder-level failure does not raise out of
//! [`IndexingService::index_chunks`]; the whole batch degrades to
//! `{indexed: 0, failed: n}` with the error message attached, so one bad
//! document never aborts a bulk ingest. A document that produces zero chunks
//! is different: that is caller input with nothing to index, reported as a
//! validation error.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::chunking::{Chunker, chunk_stats};
use crate::config::OracleConfig;
use crate::errors::OracleError;
use crate::filters::MetadataFilter;
use crate::ports::{EmbeddingProvider, VectorCollection};
use crate::types::{
    CollectionStats, DeleteOutcome, DocumentChunk, IndexOutcome, IndexReport, IndexedRow,
    MetaValue, Metadata,
};

/// Rows sampled when estimating the distinct-document count.
const STATS_SAMPLE: usize = 10;

/// Chunks, embeds and persists documents into one brand's collection.
pub struct IndexingService {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: Arc<dyn VectorCollection>,
    batch_size: usize,
}

impl IndexingService {
    pub fn new(
        cfg: &OracleConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        collection: Arc<dyn VectorCollection>,
    ) -> Self {
        Self {
            chunker: Chunker::new(&cfg.chunking),
            embedder,
            collection,
            batch_size: cfg.embedding.batch_size,
        }
    }

    /// Index one document end to end: chunk, embed, persist.
    ///
    /// A document yielding zero chunks (empty or whitespace-only text) is a
    /// validation error at this level, unlike the chunker itself.
    pub async fn index_document(
        &self,
        doc_id: &str,
        text: &str,
        metadata: &BTreeMap<String, Value>,
    ) -> Result<IndexReport, OracleError> {
        if doc_id.trim().is_empty() {
            return Err(OracleError::Validation("doc_id must not be empty".into()));
        }

        let outcome = self.chunker.chunk(text, metadata, doc_id);
        if outcome.chunks.is_empty() {
            return Err(OracleError::Validation(format!(
                "document '{doc_id}' produced no chunks"
            )));
        }

        let stats = chunk_stats(&outcome.chunks);
        let batch = self.index_chunks(&outcome.chunks).await?;

        info!(
            target: "oracle_rag::indexing",
            doc_id,
            indexed = batch.indexed,
            failed = batch.failed,
            truncated = outcome.truncated,
            collection = self.collection.name(),
            "document indexed"
        );
        Ok(IndexReport {
            indexed: batch.indexed,
            failed: batch.failed,
            error: batch.error,
            chunk_stats: stats,
            truncated: outcome.truncated,
        })
    }

    /// Embed and persist an already-chunked batch.
    ///
    /// The whole batch succeeds or the whole batch is reported failed; no
    /// partial-success bookkeeping is attempted.
    pub async fn index_chunks(
        &self,
        chunks: &[DocumentChunk],
    ) -> Result<IndexOutcome, OracleError> {
        if chunks.is_empty() {
            return Ok(IndexOutcome::default());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = match self.embedder.embed_batch(&texts, self.batch_size).await {
            Ok(v) if v.len() == texts.len() => v,
            Ok(v) => {
                error!(
                    target: "oracle_rag::indexing",
                    got = v.len(),
                    want = texts.len(),
                    "embedding batch returned wrong vector count"
                );
                return Ok(failed_outcome(texts.len(), "embedding count mismatch"));
            }
            Err(err) => {
                error!(target: "oracle_rag::indexing", error = %err, "embedding failed");
                return Ok(failed_outcome(texts.len(), &err.to_string()));
            }
        };

        let rows: Vec<IndexedRow> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| chunk_to_row(chunk, vector))
            .collect();
        let indexed = rows.len();

        if let Err(err) = self.collection.upsert(rows).await {
            error!(target: "oracle_rag::indexing", error = %err, "upsert failed");
            return Ok(failed_outcome(indexed, &err.to_string()));
        }

        Ok(IndexOutcome {
            indexed,
            failed: 0,
            error: None,
        })
    }

    /// Remove every chunk of one document. Deleting an unknown document is
    /// a no-op reporting zero.
    pub async fn delete_by_doc_id(&self, doc_id: &str) -> Result<DeleteOutcome, OracleError> {
        let deleted = self
            .collection
            .delete_where(&MetadataFilter::doc_id(doc_id))
            .await?;
        info!(
            target: "oracle_rag::indexing",
            doc_id,
            deleted,
            collection = self.collection.name(),
            "deleted document chunks"
        );
        Ok(DeleteOutcome { deleted })
    }

    /// Drop every row in the brand's collection; reports how many were
    /// removed.
    pub async fn clear_all(&self) -> Result<DeleteOutcome, OracleError> {
        let deleted = self.collection.count().await?;
        self.collection.drop_all().await?;
        info!(
            target: "oracle_rag::indexing",
            deleted,
            collection = self.collection.name(),
            "collection cleared"
        );
        Ok(DeleteOutcome { deleted })
    }

    /// Collection statistics for one brand. The distinct-document count
    /// comes from a bounded sample, not a full scan.
    pub async fn stats(
        &self,
        brand: &str,
        dimension: usize,
    ) -> Result<CollectionStats, OracleError> {
        let total_chunks = self.collection.count().await?;
        let sample = self.collection.peek(STATS_SAMPLE).await?;

        let mut docs: Vec<String> = sample
            .iter()
            .filter_map(|m| match m.get("doc_id") {
                Some(MetaValue::Str(s)) => Some(s.clone()),
                _ => None,
            })
            .collect();
        docs.sort();
        docs.dedup();

        Ok(CollectionStats {
            collection_name: self.collection.name().to_string(),
            brand: brand.to_string(),
            total_chunks,
            sample_doc_count: docs.len(),
            embedding_dimension: dimension,
        })
    }
}

/// Builds the persisted row for one chunk: content-addressed id, scalar
/// metadata with offsets attached.
fn chunk_to_row(chunk: &DocumentChunk, vector: Vec<f32>) -> IndexedRow {
    let mut metadata = coerce_metadata(&chunk.metadata);
    metadata.insert("start_offset".into(), MetaValue::from(chunk.start_offset));
    metadata.insert("end_offset".into(), MetaValue::from(chunk.end_offset));

    IndexedRow {
        id: format!("{}_{}", chunk.chunk_id, content_hash(&chunk.text)),
        text: chunk.text.clone(),
        metadata,
        vector,
    }
}

/// First 16 hex chars of the SHA-256 of `text`.
fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Coerce arbitrary JSON metadata into the scalar map the store accepts.
fn coerce_metadata(metadata: &BTreeMap<String, Value>) -> Metadata {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), MetaValue::coerce(v)))
        .collect()
}

fn failed_outcome(n: usize, message: &str) -> IndexOutcome {
    IndexOutcome {
        indexed: 0,
        failed: n,
        error: Some(message.to_string()),
    }
}
