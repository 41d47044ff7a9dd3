//! Question → top-k relevant chunks.

use std::sync::Arc;

use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::Chunk;

pub struct Retriever {
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    /// Up to `k` chunks most similar to `question`, best first.
    ///
    /// An empty result means nothing matched and is distinct from
    /// [`RagError::IndexNotReady`](crate::error::RagError::IndexNotReady),
    /// which is returned when nothing has been uploaded yet.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Chunk>> {
        let hits = self.index.search(question, k).await?;
        tracing::debug!(
            k,
            hits = hits.len(),
            best = hits.first().map(|h| h.score),
            "retrieved context"
        );
        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }
}
