use std::hash::{DefaultHasher, Hash, Hasher};

use futures::future::BoxFuture;

use crate::errors::OracleError;
use crate::ports::EmbeddingProvider;

/// Deterministic hashed bag-of-words embedder.
///
/// Each lowercased token hashes to one vector slot; the vector is then
/// L2-normalized. Texts sharing vocabulary land close under cosine, which
/// is enough for exercising the retrieval pipeline without a model server.
#[derive(Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let slot = (hasher.finish() as usize) % self.dim;
            vector[slot] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, OracleError>> {
        Box::pin(async move { Ok(self.embed_sync(text)) })
    }

    fn embed_batch<'a>(
        &'a self,
        texts: &'a [String],
        batch_size: usize,
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, OracleError>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(texts.len());
            for batch in texts.chunks(batch_size.max(1)) {
                for text in batch {
                    out.push(self.embed_sync(text));
                }
            }
            Ok(out)
        })
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
