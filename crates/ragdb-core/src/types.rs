//! Domain types shared by the chunker, embedding providers and vector indexes.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Embedding vector. The empty vector is the sentinel for a failed embedding.
pub type Vector = Vec<f32>;

/// Returns true when `v` is the failed-embedding sentinel.
pub fn is_sentinel(v: &[f32]) -> bool {
    v.is_empty()
}

/// Raw extracted text of one source document. Dropped after chunking.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// A sentence-aligned slice of a document's cleaned text.
///
/// - `text`: sentences joined by single spaces
/// - `source_doc_id`: id of the document the chunk came from
/// - `sequence_index`: position within the document, strictly increasing from 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_doc_id: String,
    pub sequence_index: usize,
}

impl Chunk {
    /// Stable index id, `"{source_doc_id}:{sequence_index}"`.
    pub fn id(&self) -> ChunkId {
        format!("{}:{}", self.source_doc_id, self.sequence_index)
    }
}

/// One stored (id, text, vector) triple. Text and vector are never stored apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: ChunkId,
    pub chunk_text: String,
    pub vector: Vector,
}

impl IndexEntry {
    pub fn new(id: impl Into<ChunkId>, chunk_text: impl Into<String>, vector: Vector) -> Self {
        Self { id: id.into(), chunk_text: chunk_text.into(), vector }
    }
}

/// A ranked search result.
///
/// `distance` is the squared L2 distance to the query; lower is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub text: String,
    pub distance: f32,
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
