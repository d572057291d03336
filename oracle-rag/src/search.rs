//! Two-stage semantic search and context assembly.
//!
//! Stage 1 embeds the query once and asks the collection for the nearest
//! rows (`2 x top_k` of them when reranking will run), converts distances
//! to similarities and drops everything below the similarity threshold.
//! Stage 2, when requested and wired, reorders the surviving candidates
//! through the rerank provider and keeps the top `top_k`.
//!
//! Reranking only changes order: `similarity` on every hit stays the
//! stage-1 value, with the rerank score attached separately. A rerank
//! provider failure falls back to the stage-1 ordering instead of failing
//! the search.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::SearchConfig;
use crate::errors::OracleError;
use crate::filters::MetadataFilter;
use crate::ports::{EmbeddingProvider, RerankProvider, VectorCollection};
use crate::types::{ContextBundle, ContextSource, SearchHit};

/// Delimiter between chunks in an assembled context block.
const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Token budget applied when a context caller does not supply one.
const DEFAULT_CONTEXT_TOKENS: usize = 2000;

/// Candidate depth for context assembly. The token budget decides how
/// many hits actually make it into the block, so this stays fixed rather
/// than following the search-facing `default_top_k` knob.
const CONTEXT_TOP_K: usize = 10;

/// Approximate characters per token for context budgeting.
const CHARS_PER_TOKEN: usize = 4;

/// Executes searches against one brand's collection.
pub struct SearchService {
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Option<Arc<dyn RerankProvider>>,
    collection: Arc<dyn VectorCollection>,
    cfg: SearchConfig,
}

struct Candidate {
    chunk_id: String,
    text: String,
    metadata: crate::types::Metadata,
    similarity: f32,
}

impl SearchService {
    pub fn new(
        cfg: &SearchConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Option<Arc<dyn RerankProvider>>,
        collection: Arc<dyn VectorCollection>,
    ) -> Self {
        Self {
            embedder,
            reranker,
            collection,
            cfg: cfg.clone(),
        }
    }

    /// Two-stage search. An empty query yields an empty hit list, not an
    /// error; backend failures propagate (see [`Self::search_or_empty`]).
    ///
    /// When `top_k` is absent, `default_top_k` applies regardless of the
    /// rerank stage.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        use_reranking: bool,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>, OracleError> {
        if query.trim().is_empty() {
            debug!(target: "oracle_rag::search", "empty query, returning no hits");
            return Ok(Vec::new());
        }

        let rerank_active = use_reranking && self.reranker.is_some();
        let top_k = top_k.unwrap_or(self.cfg.default_top_k);
        let retrieval_k = if rerank_active { top_k * 2 } else { top_k };

        let vector = self.embedder.embed(query).await?;
        let res = self.collection.query(vector, retrieval_k, filter).await?;

        // Distance-ascending from the store becomes similarity-descending
        // here; the threshold applies before any reranking.
        let mut candidates = Vec::with_capacity(res.ids.len());
        for i in 0..res.ids.len() {
            // Clamped: float rounding in the cosine path can push the raw
            // conversion a hair past 1.0.
            let similarity = (1.0 - res.distances[i]).clamp(0.0, 1.0);
            if similarity < self.cfg.similarity_threshold {
                continue;
            }
            candidates.push(Candidate {
                chunk_id: strip_content_hash(&res.ids[i]),
                text: res.texts[i].clone(),
                metadata: res.metadatas[i].clone(),
                similarity,
            });
        }

        debug!(
            target: "oracle_rag::search",
            collection = self.collection.name(),
            retrieved = res.ids.len(),
            kept = candidates.len(),
            rerank = rerank_active,
            "stage-1 retrieval done"
        );

        let hits = if rerank_active && !candidates.is_empty() {
            self.rerank_candidates(query, candidates, top_k).await
        } else {
            dense_hits(candidates, top_k)
        };

        Ok(hits)
    }

    /// Boundary-friendly variant of [`Self::search`]: a backend failure
    /// degrades to an empty hit list after logging, so transport layers
    /// that want the fail-open behavior get it in one call.
    pub async fn search_or_empty(
        &self,
        query: &str,
        top_k: Option<usize>,
        use_reranking: bool,
        filter: Option<&MetadataFilter>,
    ) -> Vec<SearchHit> {
        match self.search(query, top_k, use_reranking, filter).await {
            Ok(hits) => hits,
            Err(err) => {
                error!(
                    target: "oracle_rag::search",
                    collection = self.collection.name(),
                    error = %err,
                    "search failed, degrading to empty result"
                );
                Vec::new()
            }
        }
    }

    /// Assemble a token-bounded context block from the top hits.
    ///
    /// Tokens are approximated as `chars / 4`. Hits append greedily until
    /// the next hit would overflow the budget; that hit is excluded whole
    /// and assembly stops there, even if a later, smaller hit would fit.
    pub async fn get_context(
        &self,
        query: &str,
        max_tokens: Option<usize>,
        filter: Option<&MetadataFilter>,
    ) -> Result<ContextBundle, OracleError> {
        let budget = max_tokens.unwrap_or(DEFAULT_CONTEXT_TOKENS) * CHARS_PER_TOKEN;
        let hits = self
            .search(query, Some(CONTEXT_TOP_K), self.cfg.use_reranker, filter)
            .await?;

        let mut parts: Vec<&str> = Vec::new();
        let mut sources = Vec::new();
        let mut total_chars = 0usize;

        for hit in &hits {
            let len = hit.text.chars().count();
            if total_chars + len > budget {
                break;
            }
            total_chars += len;
            parts.push(&hit.text);
            sources.push(ContextSource {
                chunk_id: hit.chunk_id.clone(),
                score: hit.similarity,
                rank: hit.rank,
                metadata: hit.metadata.clone(),
            });
        }

        let num_sources = sources.len();
        Ok(ContextBundle {
            context: parts.join(CONTEXT_DELIMITER),
            sources,
            total_chars,
            num_sources,
        })
    }

    /// Search restricted to a single document's chunks. Dense only; the
    /// candidate pool is too homogeneous for reranking to earn its cost.
    pub async fn search_by_document(
        &self,
        query: &str,
        doc_id: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>, OracleError> {
        let filter = MetadataFilter::doc_id(doc_id);
        self.search(query, top_k, false, Some(&filter)).await
    }

    /// Combined lexical and semantic search.
    ///
    /// TODO: blend BM25-style keyword scores once a keyword index exists;
    /// until then this delegates to dense search and ignores the weight.
    pub async fn hybrid_search(
        &self,
        query: &str,
        top_k: Option<usize>,
        keyword_weight: f32,
    ) -> Result<Vec<SearchHit>, OracleError> {
        warn!(
            target: "oracle_rag::search",
            keyword_weight,
            "hybrid search not implemented, falling back to dense search"
        );
        self.search(query, top_k, false, None).await
    }

    async fn rerank_candidates(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        top_k: usize,
    ) -> Vec<SearchHit> {
        let reranker = match &self.reranker {
            Some(r) => r,
            None => return dense_hits(candidates, top_k),
        };

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        match reranker.rerank(query, &texts, top_k).await {
            Ok(ranked) => ranked
                .into_iter()
                .take(top_k)
                .filter_map(|(idx, score)| candidates.get(idx).map(|c| (c, score)))
                .enumerate()
                .map(|(i, (c, score))| SearchHit {
                    text: c.text.clone(),
                    similarity: c.similarity,
                    metadata: c.metadata.clone(),
                    chunk_id: c.chunk_id.clone(),
                    rank: i + 1,
                    rerank_score: Some(score),
                })
                .collect(),
            Err(err) => {
                warn!(
                    target: "oracle_rag::search",
                    error = %err,
                    "rerank failed, falling back to stage-1 ordering"
                );
                dense_hits(candidates, top_k)
            }
        }
    }
}

/// Top `top_k` stage-1 candidates as hits, similarity-descending.
fn dense_hits(candidates: Vec<Candidate>, top_k: usize) -> Vec<SearchHit> {
    candidates
        .into_iter()
        .take(top_k)
        .enumerate()
        .map(|(i, c)| SearchHit {
            text: c.text,
            similarity: c.similarity,
            metadata: c.metadata,
            chunk_id: c.chunk_id,
            rank: i + 1,
            rerank_score: None,
        })
        .collect()
}

/// Row ids are `"{chunk_id}_{16-hex content hash}"`; recover the chunk id.
fn strip_content_hash(id: &str) -> String {
    id.rsplit_once('_')
        .map(|(head, _)| head.to_string())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OracleConfig;
    use crate::embed::{HashEmbedder, NoopEmbedder};
    use crate::indexing::IndexingService;
    use crate::memory::MemoryCollection;
    use futures::future::BoxFuture;
    use std::collections::BTreeMap;

    const DIM: usize = 64;

    /// Scores each candidate by its length, so shorter texts win and the
    /// stage-1 order visibly changes.
    struct LengthReranker;

    impl RerankProvider for LengthReranker {
        fn rerank<'a>(
            &'a self,
            _query: &'a str,
            texts: &'a [String],
            top_k: usize,
        ) -> BoxFuture<'a, Result<Vec<(usize, f32)>, OracleError>> {
            Box::pin(async move {
                let mut scored: Vec<(usize, f32)> = texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| (i, 1.0 / (t.len() as f32 + 1.0)))
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1));
                scored.truncate(top_k);
                Ok(scored)
            })
        }
    }

    struct FailingReranker;

    impl RerankProvider for FailingReranker {
        fn rerank<'a>(
            &'a self,
            _query: &'a str,
            _texts: &'a [String],
            _top_k: usize,
        ) -> BoxFuture<'a, Result<Vec<(usize, f32)>, OracleError>> {
            Box::pin(async { Err(OracleError::Rerank("model unavailable".into())) })
        }
    }

    fn test_cfg() -> OracleConfig {
        let mut cfg = OracleConfig::default();
        cfg.embedding.dim = DIM;
        // Hashed bag-of-words similarities are lower than model ones;
        // shared-vocabulary pairs land around 0.5-0.8, disjoint ones near 0.
        cfg.search.similarity_threshold = 0.3;
        cfg
    }

    async fn seeded_collection(cfg: &OracleConfig, docs: &[(&str, &str)]) -> Arc<MemoryCollection> {
        let col = Arc::new(MemoryCollection::new("brand_t", DIM));
        let indexer =
            IndexingService::new(cfg, Arc::new(HashEmbedder::new(DIM)), Arc::clone(&col) as _);
        for (doc_id, text) in docs {
            indexer
                .index_document(doc_id, text, &BTreeMap::new())
                .await
                .unwrap();
        }
        col
    }

    fn service(
        cfg: &OracleConfig,
        collection: Arc<MemoryCollection>,
        reranker: Option<Arc<dyn RerankProvider>>,
    ) -> SearchService {
        SearchService::new(
            &cfg.search,
            Arc::new(HashEmbedder::new(DIM)),
            reranker,
            collection,
        )
    }

    #[tokio::test]
    async fn dense_search_orders_by_similarity_with_dense_ranks() {
        let cfg = test_cfg();
        let col = seeded_collection(
            &cfg,
            &[
                ("doc1", "rust vector search engine internals"),
                ("doc2", "vector search basics"),
                ("doc3", "gardening tips for spring tomatoes"),
            ],
        )
        .await;
        let svc = service(&cfg, col, None);

        let hits = svc
            .search("vector search engine", None, false, None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        for (i, hit) in hits.iter().enumerate() {
            assert_eq!(hit.rank, i + 1);
            assert!(hit.rerank_score.is_none());
            assert!(hit.chunk_id.contains("_chunk_"));
        }
        // The unrelated document falls below the threshold.
        assert!(hits.iter().all(|h| !h.text.contains("gardening")));
    }

    #[tokio::test]
    async fn exact_match_similarity_stays_within_unit_range() {
        let cfg = test_cfg();
        let col = seeded_collection(&cfg, &[("doc1", "vector search")]).await;
        let svc = service(&cfg, col, None);

        // Querying the indexed text verbatim puts cosine similarity at the
        // top of the range, where float noise would otherwise leak past 1.
        let hits = svc.search("vector search", None, false, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((0.0..=1.0).contains(&hits[0].similarity));
        assert!(hits[0].similarity > 0.99);
    }

    #[tokio::test]
    async fn reranking_reorders_but_keeps_stage_one_similarity() {
        let cfg = test_cfg();
        let col = seeded_collection(
            &cfg,
            &[
                ("long", "vector search with many extra trailing words here"),
                ("short", "vector search"),
            ],
        )
        .await;
        let svc = service(&cfg, col, Some(Arc::new(LengthReranker)));

        let hits = svc
            .search("vector search", Some(2), true, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        // Shortest text wins under the length reranker.
        assert_eq!(hits[0].text, "vector search");
        for (i, hit) in hits.iter().enumerate() {
            assert_eq!(hit.rank, i + 1);
            assert!(hit.rerank_score.is_some());
            assert!((0.0..=1.0).contains(&hit.similarity));
        }
        // Rerank scores descend; similarities need not.
        assert!(hits[0].rerank_score >= hits[1].rerank_score);
    }

    /// Records the `k` of the last query while delegating to the real
    /// collection.
    struct CountingCollection {
        inner: Arc<MemoryCollection>,
        last_k: std::sync::atomic::AtomicUsize,
    }

    impl crate::ports::VectorCollection for CountingCollection {
        fn name(&self) -> &str {
            self.inner.name()
        }
        fn upsert<'a>(
            &'a self,
            rows: Vec<crate::types::IndexedRow>,
        ) -> BoxFuture<'a, Result<(), OracleError>> {
            self.inner.upsert(rows)
        }
        fn query<'a>(
            &'a self,
            vector: Vec<f32>,
            k: usize,
            filter: Option<&'a MetadataFilter>,
        ) -> BoxFuture<'a, Result<crate::types::QueryResponse, OracleError>> {
            self.last_k.store(k, std::sync::atomic::Ordering::SeqCst);
            self.inner.query(vector, k, filter)
        }
        fn delete_where<'a>(
            &'a self,
            filter: &'a MetadataFilter,
        ) -> BoxFuture<'a, Result<usize, OracleError>> {
            self.inner.delete_where(filter)
        }
        fn count<'a>(&'a self) -> BoxFuture<'a, Result<usize, OracleError>> {
            self.inner.count()
        }
        fn peek<'a>(
            &'a self,
            limit: usize,
        ) -> BoxFuture<'a, Result<Vec<crate::types::Metadata>, OracleError>> {
            self.inner.peek(limit)
        }
        fn drop_all<'a>(&'a self) -> BoxFuture<'a, Result<(), OracleError>> {
            self.inner.drop_all()
        }
    }

    #[tokio::test]
    async fn reranking_oversamples_stage_one_by_two() {
        let cfg = test_cfg();
        let inner = seeded_collection(&cfg, &[("doc1", "vector search content")]).await;
        let counting = Arc::new(CountingCollection {
            inner,
            last_k: std::sync::atomic::AtomicUsize::new(0),
        });
        let svc = SearchService::new(
            &cfg.search,
            Arc::new(HashEmbedder::new(DIM)),
            Some(Arc::new(LengthReranker)),
            Arc::clone(&counting) as _,
        );

        svc.search("vector search", Some(3), true, None).await.unwrap();
        assert_eq!(counting.last_k.load(std::sync::atomic::Ordering::SeqCst), 6);

        svc.search("vector search", Some(3), false, None).await.unwrap();
        assert_eq!(counting.last_k.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rerank_returns_at_most_top_k() {
        let cfg = test_cfg();
        let docs: Vec<(String, String)> = (0..10)
            .map(|i| (format!("doc{i}"), format!("vector search notes part {i}")))
            .collect();
        let doc_refs: Vec<(&str, &str)> = docs
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        let col = seeded_collection(&cfg, &doc_refs).await;
        let svc = service(&cfg, col, Some(Arc::new(LengthReranker)));

        let hits = svc
            .search("vector search notes", Some(3), true, None)
            .await
            .unwrap();
        assert!(hits.len() <= 3);
        assert!(hits.iter().all(|h| h.rerank_score.is_some()));
    }

    #[tokio::test]
    async fn absent_top_k_defaults_to_default_top_k_even_when_reranking() {
        let cfg = test_cfg();
        let docs: Vec<(String, String)> = (0..8)
            .map(|i| (format!("doc{i}"), format!("vector search notes part {i}")))
            .collect();
        let doc_refs: Vec<(&str, &str)> = docs
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        let col = seeded_collection(&cfg, &doc_refs).await;
        let svc = service(&cfg, col, Some(Arc::new(LengthReranker)));

        // default_top_k is 10 and rerank_top_k is 5; with no explicit
        // top_k, all 8 matching documents come back.
        let hits = svc
            .search("vector search notes", None, true, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 8);
    }

    #[tokio::test]
    async fn rerank_failure_falls_back_to_dense_order() {
        let cfg = test_cfg();
        let col = seeded_collection(&cfg, &[("doc1", "vector search content")]).await;
        let svc = service(&cfg, col, Some(Arc::new(FailingReranker)));

        let hits = svc
            .search("vector search", Some(5), true, None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn empty_query_returns_no_hits() {
        let cfg = test_cfg();
        let col = seeded_collection(&cfg, &[("doc1", "anything at all")]).await;
        let svc = service(&cfg, col, None);
        assert!(svc.search("   ", None, false, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_or_empty_swallows_backend_failures() {
        let cfg = test_cfg();
        let col = Arc::new(MemoryCollection::new("brand_t", DIM));
        let svc = SearchService::new(
            &cfg.search,
            Arc::new(NoopEmbedder::new(DIM)),
            None,
            col,
        );
        let hits = svc.search_or_empty("query", None, false, None).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn context_respects_character_budget() {
        let cfg = test_cfg();
        let col = seeded_collection(
            &cfg,
            &[
                ("doc1", "vector search alpha content body"),
                ("doc2", "vector search beta content body"),
                ("doc3", "vector search gamma content body"),
            ],
        )
        .await;
        let svc = service(&cfg, col, None);

        // 10 tokens -> 40 chars: room for one ~32-char chunk, not two.
        let bundle = svc.get_context("vector search content", Some(10), None).await.unwrap();
        assert_eq!(bundle.num_sources, 1);
        assert!(bundle.total_chars <= 40);
        assert!(!bundle.context.contains(CONTEXT_DELIMITER));

        let bundle = svc
            .get_context("vector search content", Some(100), None)
            .await
            .unwrap();
        assert!(bundle.num_sources >= 2);
        assert!(bundle.context.contains(CONTEXT_DELIMITER));
        assert_eq!(bundle.sources.len(), bundle.num_sources);
        assert!(bundle.total_chars <= 400);
        for (i, src) in bundle.sources.iter().enumerate() {
            assert_eq!(src.rank, i + 1);
        }
    }

    #[tokio::test]
    async fn context_candidate_depth_ignores_default_top_k() {
        let mut cfg = test_cfg();
        cfg.search.default_top_k = 2;
        let col = seeded_collection(
            &cfg,
            &[
                ("doc1", "vector search alpha notes"),
                ("doc2", "vector search beta notes"),
                ("doc3", "vector search gamma notes"),
                ("doc4", "vector search delta notes"),
            ],
        )
        .await;
        let svc = service(&cfg, col, None);

        // An ample budget pulls in every matching chunk even though the
        // search-facing default would stop at two.
        let bundle = svc
            .get_context("vector search notes", Some(1000), None)
            .await
            .unwrap();
        assert_eq!(bundle.num_sources, 4);
    }

    #[tokio::test]
    async fn search_by_document_is_scoped_to_one_doc() {
        let cfg = test_cfg();
        let col = seeded_collection(
            &cfg,
            &[
                ("doc1", "vector search inside the first document"),
                ("doc2", "vector search inside the second document"),
            ],
        )
        .await;
        let svc = service(&cfg, col, None);

        let hits = svc
            .search_by_document("vector search", "doc2", None)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.chunk_id.starts_with("doc2_")));
    }

    #[tokio::test]
    async fn hybrid_search_delegates_to_dense() {
        let cfg = test_cfg();
        let col = seeded_collection(&cfg, &[("doc1", "vector search content")]).await;
        let svc = service(&cfg, col, None);

        let hybrid = svc.hybrid_search("vector search", Some(5), 0.4).await.unwrap();
        let dense = svc.search("vector search", Some(5), false, None).await.unwrap();
        assert_eq!(hybrid.len(), dense.len());
    }
}
