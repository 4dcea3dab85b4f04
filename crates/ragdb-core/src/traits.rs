use async_trait::async_trait;

use crate::error::Result;
use crate::types::{IndexEntry, SearchHit, Vector};

/// Turns text into fixed-dimension vectors.
///
/// `embed_many` must return exactly one vector per input, in input order.
/// Items that fail are returned as the empty sentinel vector, never dropped.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name for logs (e.g. `local:bge-m3`).
    fn name(&self) -> &str;
    /// Expected output dimension, if known up front.
    fn dim(&self) -> Option<usize>;
    async fn embed(&self, text: &str) -> Result<Vector>;
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>>;
}

/// Stores (id, text, vector) entries and answers squared-L2 nearest-neighbour queries.
///
/// Both backends rank by squared Euclidean distance, ascending, so they are
/// interchangeable. A cosine-based backend must unit-normalize on insert.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;
    /// Appends entries. All-or-nothing: on error nothing from `entries` is stored.
    async fn store(&self, entries: &[IndexEntry]) -> Result<()>;
    /// Returns at most `k` hits, best first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;
    async fn len(&self) -> Result<usize>;
    /// Dimension of the stored vectors, `None` while unknown.
    async fn dim(&self) -> Option<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}
