//! Composition root: wires configuration, model backends and the brand
//! registry, then idles until shutdown.
//!
//! Transports are expected to hold a reference to the [`BrandRegistry`]
//! and call its boundary operations; none are wired here.

use std::error::Error;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_model_service::{HttpReranker, ModelServiceConfig, OllamaEmbedder};
use oracle_rag::{BrandRegistry, OracleConfig, QdrantStore, RerankProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Optional .env; a plain environment is fine too.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,oracle_rag=info,ai_model_service=info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = OracleConfig::from_env()?;
    let model_cfg = ModelServiceConfig::from_env()?;

    let embedder = Arc::new(OllamaEmbedder::new(&model_cfg, cfg.embedding.dim)?);
    let reranker: Option<Arc<dyn RerankProvider>> = HttpReranker::from_config(&model_cfg)?
        .map(|r| Arc::new(r) as Arc<dyn RerankProvider>);
    let store = Arc::new(QdrantStore::connect(&cfg.store)?);

    info!(
        qdrant = %cfg.store.url,
        embedding_model = %cfg.embedding.model,
        dim = cfg.embedding.dim,
        reranker = reranker.is_some(),
        "oracle service wired"
    );

    let _registry = Arc::new(BrandRegistry::new(cfg, embedder, reranker, store));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, exiting");
    Ok(())
}
