use futures::future::BoxFuture;

use crate::errors::OracleError;
use crate::ports::EmbeddingProvider;

/// Provider that refuses to embed. Useful where a pipeline must be wired
/// but embedding is expected never to run.
#[derive(Clone)]
pub struct NoopEmbedder {
    dim: usize,
}

impl NoopEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl EmbeddingProvider for NoopEmbedder {
    fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, OracleError>> {
        Box::pin(async { Err(OracleError::Embedding("no embedding backend wired".into())) })
    }

    fn embed_batch<'a>(
        &'a self,
        _texts: &'a [String],
        _batch_size: usize,
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, OracleError>> {
        Box::pin(async { Err(OracleError::Embedding("no embedding backend wired".into())) })
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
