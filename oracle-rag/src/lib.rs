//! Brand-scoped retrieval core: chunking, indexing and two-stage search
//! over Qdrant.
//!
//! This crate provides a clean API to:
//! - Split documents into bounded, overlapping chunks
//! - Embed and persist them into per-brand collections
//! - Run dense retrieval with optional precision reranking and assemble
//!   token-bounded context blocks
//!
//! The design is flat (no deep nesting) and splits responsibilities into
//! focused modules. Model backends plug in through the provider traits
//! ([`EmbeddingProvider`], [`RerankProvider`], [`CollectionProvider`]);
//! [`BrandRegistry`] is the single entry point recommended for application
//! code.

mod chunking;
mod config;
pub mod embed;
mod errors;
mod filters;
mod indexing;
pub mod memory;
mod ports;
mod qdrant_facade;
mod registry;
mod search;
mod types;

pub use chunking::{Chunker, chunk_stats};
pub use config::{ChunkingConfig, EmbeddingConfig, OracleConfig, SearchConfig, StoreConfig};
pub use errors::OracleError;
pub use filters::MetadataFilter;
pub use indexing::IndexingService;
pub use ports::{CollectionProvider, EmbeddingProvider, RerankProvider, VectorCollection};
pub use qdrant_facade::{QdrantCollection, QdrantStore};
pub use registry::{BrandRegistry, BrandServices};
pub use search::SearchService;
pub use types::{
    ChunkOutcome, ChunkStats, CollectionStats, ContextBundle, ContextSource, DeleteOutcome,
    DocumentChunk, IndexOutcome, IndexReport, IndexedRow, MetaValue, Metadata, QueryResponse,
    SearchHit,
};
