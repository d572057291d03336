//! Per-brand service registry.
//!
//! Each brand (tenant) gets its own physical collection plus an indexing
//! and a search service bound to it, created lazily on first use and
//! cached for the process lifetime. Creation is guarded so two concurrent
//! first requests for the same new brand produce exactly one instance.
//!
//! The registry lock protects only the brand map. Embedding, reranking
//! and store calls all run outside it, so slow model invocations never
//! block unrelated requests.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::OracleConfig;
use crate::errors::OracleError;
use crate::indexing::IndexingService;
use crate::ports::{CollectionProvider, EmbeddingProvider, RerankProvider};
use crate::search::SearchService;
use crate::types::{
    CollectionStats, ContextBundle, DeleteOutcome, IndexReport, SearchHit,
};

/// Services bound to one brand's collection.
pub struct BrandServices {
    pub brand: String,
    pub collection_name: String,
    pub indexer: IndexingService,
    pub searcher: SearchService,
}

/// Registry of per-brand services; the single entry point for boundary
/// operations.
pub struct BrandRegistry {
    cfg: OracleConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Option<Arc<dyn RerankProvider>>,
    store: Arc<dyn CollectionProvider>,
    services: RwLock<HashMap<String, Arc<BrandServices>>>,
}

impl BrandRegistry {
    pub fn new(
        cfg: OracleConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Option<Arc<dyn RerankProvider>>,
        store: Arc<dyn CollectionProvider>,
    ) -> Self {
        Self {
            cfg,
            embedder,
            reranker,
            store,
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Services for a brand, creating them on first access.
    pub async fn services_for(&self, brand: &str) -> Result<Arc<BrandServices>, OracleError> {
        if brand.trim().is_empty() {
            return Err(OracleError::Validation("brand must not be empty".into()));
        }

        {
            let map = self.services.read().await;
            if let Some(existing) = map.get(brand) {
                return Ok(Arc::clone(existing));
            }
        }

        // Open the collection before taking the write lock so a slow store
        // call never stalls lookups for other brands. `open` is idempotent,
        // so a racing request opening the same collection is harmless; the
        // map insert below still picks a single winner.
        let collection_name = self.cfg.collection_name(brand);
        let collection = self
            .store
            .open(&collection_name, self.cfg.embedding.dim)
            .await?;

        let mut map = self.services.write().await;
        // Re-check under the write lock: another request may have won.
        if let Some(existing) = map.get(brand) {
            return Ok(Arc::clone(existing));
        }

        let services = Arc::new(BrandServices {
            brand: brand.to_string(),
            collection_name: collection_name.clone(),
            indexer: IndexingService::new(
                &self.cfg,
                Arc::clone(&self.embedder),
                Arc::clone(&collection),
            ),
            searcher: SearchService::new(
                &self.cfg.search,
                Arc::clone(&self.embedder),
                self.reranker.clone(),
                collection,
            ),
        });
        map.insert(brand.to_string(), Arc::clone(&services));

        info!(
            target: "oracle_rag::registry",
            brand,
            collection = collection_name,
            "brand services created"
        );
        Ok(services)
    }

    // ── Boundary operations ─────────────────────────────────────────────────

    pub async fn index(
        &self,
        brand: &str,
        doc_id: &str,
        text: &str,
        metadata: &BTreeMap<String, Value>,
    ) -> Result<IndexReport, OracleError> {
        let svc = self.services_for(brand).await?;
        svc.indexer.index_document(doc_id, text, metadata).await
    }

    pub async fn search(
        &self,
        brand: &str,
        query: &str,
        top_k: Option<usize>,
        use_reranking: Option<bool>,
    ) -> Result<Vec<SearchHit>, OracleError> {
        let svc = self.services_for(brand).await?;
        let rerank = use_reranking.unwrap_or(self.cfg.search.use_reranker);
        svc.searcher.search(query, top_k, rerank, None).await
    }

    pub async fn context(
        &self,
        brand: &str,
        query: &str,
        max_tokens: Option<usize>,
    ) -> Result<ContextBundle, OracleError> {
        let svc = self.services_for(brand).await?;
        svc.searcher.get_context(query, max_tokens, None).await
    }

    pub async fn delete(&self, brand: &str, doc_id: &str) -> Result<DeleteOutcome, OracleError> {
        let svc = self.services_for(brand).await?;
        svc.indexer.delete_by_doc_id(doc_id).await
    }

    pub async fn stats(&self, brand: &str) -> Result<CollectionStats, OracleError> {
        let svc = self.services_for(brand).await?;
        svc.indexer.stats(brand, self.cfg.embedding.dim).await
    }

    pub async fn clear(&self, brand: &str) -> Result<DeleteOutcome, OracleError> {
        let svc = self.services_for(brand).await?;
        svc.indexer.clear_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::memory::MemoryStore;

    const DIM: usize = 64;

    fn registry() -> Arc<BrandRegistry> {
        let mut cfg = OracleConfig::default();
        cfg.embedding.dim = DIM;
        cfg.search.similarity_threshold = 0.05;
        Arc::new(BrandRegistry::new(
            cfg,
            Arc::new(HashEmbedder::new(DIM)),
            None,
            Arc::new(MemoryStore::new()),
        ))
    }

    #[tokio::test]
    async fn services_are_created_once_and_reused() {
        let reg = registry();
        let a = reg.services_for("Acme Corp").await.unwrap();
        let b = reg.services_for("Acme Corp").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.collection_name, "brand_acme_corp");
    }

    #[tokio::test]
    async fn concurrent_first_access_yields_a_single_instance() {
        let reg = registry();
        let (a, b) = tokio::join!(
            {
                let reg = Arc::clone(&reg);
                async move { reg.services_for("newbrand").await.unwrap() }
            },
            {
                let reg = Arc::clone(&reg);
                async move { reg.services_for("newbrand").await.unwrap() }
            }
        );
        assert!(Arc::ptr_eq(&a, &b));
    }

    /// Store double whose `open` for one collection parks until released,
    /// standing in for a slow backend.
    struct GatedStore {
        inner: MemoryStore,
        gated: String,
        gate: Arc<tokio::sync::Notify>,
    }

    impl crate::ports::CollectionProvider for GatedStore {
        fn open<'a>(
            &'a self,
            name: &'a str,
            dim: usize,
        ) -> futures::future::BoxFuture<
            'a,
            Result<Arc<dyn crate::ports::VectorCollection>, OracleError>,
        > {
            Box::pin(async move {
                if name == self.gated {
                    self.gate.notified().await;
                }
                self.inner.open(name, dim).await
            })
        }
    }

    #[tokio::test]
    async fn slow_collection_open_does_not_block_other_brands() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let mut cfg = OracleConfig::default();
        cfg.embedding.dim = DIM;
        let reg = Arc::new(BrandRegistry::new(
            cfg,
            Arc::new(HashEmbedder::new(DIM)),
            None,
            Arc::new(GatedStore {
                inner: MemoryStore::new(),
                gated: "brand_slow".into(),
                gate: Arc::clone(&gate),
            }),
        ));

        reg.services_for("fast").await.unwrap();

        let slow = tokio::spawn({
            let reg = Arc::clone(&reg);
            async move { reg.services_for("slow").await }
        });
        tokio::task::yield_now().await;

        // With "slow" parked inside the store call, an already-created
        // brand must still resolve; no registry lock is held across it.
        let fast = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            reg.services_for("fast"),
        )
        .await
        .expect("lookup stalled behind a slow collection open");
        assert!(fast.is_ok());

        gate.notify_one();
        assert!(slow.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn empty_brand_is_rejected() {
        let reg = registry();
        assert!(matches!(
            reg.services_for("  ").await,
            Err(OracleError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn brands_are_isolated() {
        let reg = registry();
        let meta = BTreeMap::new();
        reg.index("brand_a", "doc1", "shared vocabulary content", &meta)
            .await
            .unwrap();
        reg.index("brand_b", "doc1", "shared vocabulary content", &meta)
            .await
            .unwrap();

        reg.clear("brand_a").await.unwrap();

        let hits_a = reg
            .search("brand_a", "shared vocabulary", None, None)
            .await
            .unwrap();
        let hits_b = reg
            .search("brand_b", "shared vocabulary", None, None)
            .await
            .unwrap();
        assert!(hits_a.is_empty());
        assert!(!hits_b.is_empty());
    }

    #[tokio::test]
    async fn boundary_flow_index_search_stats_delete() {
        let reg = registry();
        let meta = BTreeMap::new();

        let report = reg
            .index("acme", "doc1", "semantic retrieval over brand documents", &meta)
            .await
            .unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(report.chunk_stats.count, 1);

        let hits = reg
            .search("acme", "semantic retrieval", Some(5), Some(false))
            .await
            .unwrap();
        assert!(!hits.is_empty());

        let bundle = reg
            .context("acme", "semantic retrieval", Some(100))
            .await
            .unwrap();
        assert!(bundle.num_sources >= 1);

        let stats = reg.stats("acme").await.unwrap();
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.embedding_dimension, DIM);

        let deleted = reg.delete("acme", "doc1").await.unwrap();
        assert_eq!(deleted.deleted, 1);
        let deleted = reg.delete("acme", "doc1").await.unwrap();
        assert_eq!(deleted.deleted, 0);
    }
}
