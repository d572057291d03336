//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind the
//! [`VectorCollection`] and [`CollectionProvider`] ports, hiding the verbose
//! builder pattern and keeping the rest of the crate decoupled from
//! `qdrant-client`.
//!
//! Two impedance mismatches are absorbed here and nowhere else:
//! - Qdrant point ids must be UUIDs or integers, so each row id maps to a
//!   stable UUIDv5 while the original string id travels in the payload.
//! - Qdrant reports cosine *similarity*; the port contract is *distance*,
//!   so scores convert as `distance = 1 - score` on the way out.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, Value as QValue,
    VectorParamsBuilder,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::errors::OracleError;
use crate::filters::{MetadataFilter, to_qdrant_filter};
use crate::ports::{CollectionProvider, VectorCollection};
use crate::types::{IndexedRow, MetaValue, Metadata, QueryResponse};

/// Payload fields reserved for row identity and content.
const PAYLOAD_ID: &str = "id";
const PAYLOAD_TEXT: &str = "text";

/// Page size used when sampling payloads.
const SCROLL_PAGE: u32 = 256;

/// Connection-level handle; opens per-brand collections on demand.
pub struct QdrantStore {
    client: Arc<Qdrant>,
}

impl QdrantStore {
    /// Connects to Qdrant over gRPC using the configured URL.
    pub fn connect(cfg: &StoreConfig) -> Result<Self, OracleError> {
        let client = Qdrant::from_url(&cfg.url)
            .build()
            .map_err(|e| OracleError::Qdrant(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

impl CollectionProvider for QdrantStore {
    fn open<'a>(
        &'a self,
        name: &'a str,
        dim: usize,
    ) -> BoxFuture<'a, Result<Arc<dyn VectorCollection>, OracleError>> {
        Box::pin(async move {
            ensure_collection(&self.client, name, dim).await?;
            Ok(Arc::new(QdrantCollection {
                client: Arc::clone(&self.client),
                name: name.to_string(),
                dim,
            }) as Arc<dyn VectorCollection>)
        })
    }
}

/// Ensures that the collection exists in Qdrant.
///
/// - If the collection already exists → no-op.
/// - If missing → creates it with a cosine vector space of size `dim`.
async fn ensure_collection(client: &Qdrant, name: &str, dim: usize) -> Result<(), OracleError> {
    match client.collection_info(name).await {
        Ok(_) => {
            debug!(target: "oracle_rag::qdrant", collection = name, "collection already exists");
            return Ok(());
        }
        Err(err) => {
            warn!(
                target: "oracle_rag::qdrant",
                collection = name,
                error = %err,
                "collection not found, will be created"
            );
        }
    }

    client
        .create_collection(
            CreateCollectionBuilder::new(name)
                .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine)),
        )
        .await
        .map_err(|e| OracleError::Qdrant(e.to_string()))?;

    info!(target: "oracle_rag::qdrant", collection = name, dim, "collection created");
    Ok(())
}

/// One brand's Qdrant collection.
pub struct QdrantCollection {
    client: Arc<Qdrant>,
    name: String,
    dim: usize,
}

impl VectorCollection for QdrantCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn upsert<'a>(&'a self, rows: Vec<IndexedRow>) -> BoxFuture<'a, Result<(), OracleError>> {
        Box::pin(async move {
            if rows.is_empty() {
                debug!(target: "oracle_rag::qdrant", collection = %self.name, "no rows to upsert");
                return Ok(());
            }

            let mut points = Vec::with_capacity(rows.len());
            for row in rows {
                if row.vector.len() != self.dim {
                    return Err(OracleError::VectorSizeMismatch {
                        got: row.vector.len(),
                        want: self.dim,
                    });
                }
                points.push(row_to_point(row));
            }

            info!(
                target: "oracle_rag::qdrant",
                collection = %self.name,
                points = points.len(),
                "upserting points"
            );

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.name, points))
                .await
                .map_err(|e| OracleError::Qdrant(e.to_string()))?;
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
            let mut builder =
                SearchPointsBuilder::new(&self.name, vector, k as u64).with_payload(true);
            if let Some(f) = filter {
                builder = builder.filter(to_qdrant_filter(f));
            }

            let res = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| OracleError::Qdrant(e.to_string()))?;

            let mut out = QueryResponse::default();
            for point in res.result {
                let (id, text, metadata) = split_payload(point.payload);
                out.ids.push(id);
                out.texts.push(text);
                out.metadatas.push(metadata);
                // Qdrant returns cosine similarity; the port speaks distance.
                out.distances.push(1.0 - point.score);
            }

            debug!(
                target: "oracle_rag::qdrant",
                collection = %self.name,
                hits = out.ids.len(),
                "search completed"
            );
            Ok(out)
        })
    }

    fn delete_where<'a>(
        &'a self,
        filter: &'a MetadataFilter,
    ) -> BoxFuture<'a, Result<usize, OracleError>> {
        Box::pin(async move {
            let qfilter = to_qdrant_filter(filter);

            let counted = self
                .client
                .count(
                    CountPointsBuilder::new(&self.name)
                        .filter(qfilter.clone())
                        .exact(true),
                )
                .await
                .map_err(|e| OracleError::Qdrant(e.to_string()))?;
            let matched = counted.result.map(|r| r.count as usize).unwrap_or(0);

            if matched == 0 {
                return Ok(0);
            }

            self.client
                .delete_points(DeletePointsBuilder::new(&self.name).points(qfilter))
                .await
                .map_err(|e| OracleError::Qdrant(e.to_string()))?;

            info!(
                target: "oracle_rag::qdrant",
                collection = %self.name,
                deleted = matched,
                "deleted points by filter"
            );
            Ok(matched)
        })
    }

    fn count<'a>(&'a self) -> BoxFuture<'a, Result<usize, OracleError>> {
        Box::pin(async move {
            let res = self
                .client
                .count(CountPointsBuilder::new(&self.name).exact(true))
                .await
                .map_err(|e| OracleError::Qdrant(e.to_string()))?;
            Ok(res.result.map(|r| r.count as usize).unwrap_or(0))
        })
    }

    fn peek<'a>(&'a self, limit: usize) -> BoxFuture<'a, Result<Vec<Metadata>, OracleError>> {
        Box::pin(async move {
            let res = self
                .client
                .scroll(
                    ScrollPointsBuilder::new(&self.name)
                        .limit((limit as u32).min(SCROLL_PAGE))
                        .with_payload(true),
                )
                .await
                .map_err(|e| OracleError::Qdrant(e.to_string()))?;

            Ok(res
                .result
                .into_iter()
                .map(|p| split_payload(p.payload).2)
                .collect())
        })
    }

    fn drop_all<'a>(&'a self) -> BoxFuture<'a, Result<(), OracleError>> {
        Box::pin(async move {
            self.client
                .delete_collection(&self.name)
                .await
                .map_err(|e| OracleError::Qdrant(e.to_string()))?;
            ensure_collection(&self.client, &self.name, self.dim).await?;
            info!(target: "oracle_rag::qdrant", collection = %self.name, "collection recreated");
            Ok(())
        })
    }
}

/// Converts a row into a Qdrant point.
///
/// The point id is a UUIDv5 derived from the row id, so re-indexing the same
/// content replaces rather than duplicates. The original id stays in the
/// payload for callers.
fn row_to_point(row: IndexedRow) -> PointStruct {
    let mut payload: HashMap<String, QValue> = HashMap::with_capacity(row.metadata.len() + 2);
    for (key, value) in row.metadata {
        payload.insert(key, meta_to_qvalue(value));
    }
    payload.insert(PAYLOAD_ID.into(), QValue::from(row.id.clone()));
    payload.insert(PAYLOAD_TEXT.into(), QValue::from(row.text));

    PointStruct::new(stable_point_id(&row.id), row.vector, payload)
}

/// Stable UUIDv5 for a string row id.
fn stable_point_id(id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes()).to_string()
}

fn meta_to_qvalue(value: MetaValue) -> QValue {
    match value {
        MetaValue::Str(s) => QValue::from(s),
        MetaValue::Int(i) => QValue::from(i),
        MetaValue::Float(f) => QValue::from(f),
        MetaValue::Bool(b) => QValue::from(b),
    }
}

/// Splits a point payload into `(row id, text, remaining metadata)`.
///
/// Unsupported nested values are dropped; only scalars round-trip.
fn split_payload(mut payload: HashMap<String, QValue>) -> (String, String, Metadata) {
    use qdrant_client::qdrant::value::Kind as K;

    let id = take_string(&mut payload, PAYLOAD_ID);
    let text = take_string(&mut payload, PAYLOAD_TEXT);

    let mut metadata = Metadata::new();
    for (key, value) in payload.drain() {
        let mv = match value.kind {
            Some(K::StringValue(s)) => MetaValue::Str(s),
            Some(K::IntegerValue(i)) => MetaValue::Int(i),
            Some(K::DoubleValue(f)) => MetaValue::Float(f),
            Some(K::BoolValue(b)) => MetaValue::Bool(b),
            _ => continue,
        };
        metadata.insert(key, mv);
    }

    (id, text, metadata)
}

fn take_string(payload: &mut HashMap<String, QValue>, key: &str) -> String {
    use qdrant_client::qdrant::value::Kind as K;
    match payload.remove(key).and_then(|v| v.kind) {
        Some(K::StringValue(s)) => s,
        _ => String::new(),
    }
}
