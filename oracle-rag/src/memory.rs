//! In-memory vector store used by tests and local experiments.
//!
//! Brute-force cosine scan over a flat row list. Semantics mirror the
//! Qdrant-backed collection: upsert replaces by id, queries return
//! distances, deletes report counts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use futures::future::BoxFuture;
use tracing::debug;

use crate::errors::OracleError;
use crate::filters::MetadataFilter;
use crate::ports::{CollectionProvider, VectorCollection};
use crate::types::{IndexedRow, Metadata, QueryResponse};

/// Opens named [`MemoryCollection`]s, reusing one instance per name.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionProvider for MemoryStore {
    fn open<'a>(
        &'a self,
        name: &'a str,
        dim: usize,
    ) -> BoxFuture<'a, Result<Arc<dyn VectorCollection>, OracleError>> {
        Box::pin(async move {
            if let Ok(map) = self.collections.read() {
                if let Some(existing) = map.get(name) {
                    return Ok(Arc::clone(existing) as Arc<dyn VectorCollection>);
                }
            }
            let mut map = self
                .collections
                .write()
                .map_err(|_| OracleError::Qdrant("memory store lock poisoned".into()))?;
            let entry = map
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryCollection::new(name, dim)));
            Ok(Arc::clone(entry) as Arc<dyn VectorCollection>)
        })
    }
}

/// A single in-memory collection.
pub struct MemoryCollection {
    name: String,
    dim: usize,
    rows: Mutex<Vec<IndexedRow>>,
}

impl MemoryCollection {
    pub fn new(name: &str, dim: usize) -> Self {
        Self {
            name: name.to_string(),
            dim,
            rows: Mutex::new(Vec::new()),
        }
    }

    fn lock_rows(&self) -> Result<std::sync::MutexGuard<'_, Vec<IndexedRow>>, OracleError> {
        self.rows
            .lock()
            .map_err(|_| OracleError::Qdrant("memory collection lock poisoned".into()))
    }
}

impl VectorCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert<'a>(&'a self, new_rows: Vec<IndexedRow>) -> BoxFuture<'a, Result<(), OracleError>> {
        Box::pin(async move {
            for row in &new_rows {
                if row.vector.len() != self.dim {
                    return Err(OracleError::VectorSizeMismatch {
                        got: row.vector.len(),
                        want: self.dim,
                    });
                }
            }
            let mut rows = self.lock_rows()?;
            for row in new_rows {
                if let Some(existing) = rows.iter_mut().find(|r| r.id == row.id) {
                    *existing = row;
                } else {
                    rows.push(row);
                }
            }
            Ok(())
        })
    }

    fn query<'a>(
        &'a self,
        vector: Vec<f32>,
        k: usize,
        filter: Option<&'a MetadataFilter>,
    ) -> BoxFuture<'a, Result<QueryResponse, OracleError>> {
        Box::pin(async move {
            let rows = self.lock_rows()?;

            let mut scored: Vec<(f32, &IndexedRow)> = rows
                .iter()
                .filter(|row| filter.map(|f| f.matches(&row.metadata)).unwrap_or(true))
                .map(|row| (1.0 - cosine_similarity(&vector, &row.vector), row))
                .collect();
            scored.sort_by(|a, b| a.0.total_cmp(&b.0));
            scored.truncate(k);

            let mut out = QueryResponse::default();
            for (distance, row) in scored {
                out.ids.push(row.id.clone());
                out.texts.push(row.text.clone());
                out.metadatas.push(row.metadata.clone());
                out.distances.push(distance);
            }

            debug!(
                target: "oracle_rag::memory",
                collection = %self.name,
                hits = out.ids.len(),
                "query completed"
            );
            Ok(out)
        })
    }

    fn delete_where<'a>(
        &'a self,
        filter: &'a MetadataFilter,
    ) -> BoxFuture<'a, Result<usize, OracleError>> {
        Box::pin(async move {
            let mut rows = self.lock_rows()?;
            let before = rows.len();
            rows.retain(|row| !filter.matches(&row.metadata));
            Ok(before - rows.len())
        })
    }

    fn count<'a>(&'a self) -> BoxFuture<'a, Result<usize, OracleError>> {
        Box::pin(async move { Ok(self.lock_rows()?.len()) })
    }

    fn peek<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<Metadata>, OracleError>> {
        Box::pin(async move {
            let rows = self.lock_rows()?;
            Ok(rows.iter().take(limit).map(|r| r.metadata.clone()).collect())
        })
    }

    fn drop_all<'a>(&'a self) -> BoxFuture<'a, Result<(), OracleError>> {
        Box::pin(async move {
            self.lock_rows()?.clear();
            Ok(())
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}
