use std::path::Path;

use tracing::{debug, info, warn};

use ragdb_core::chunker::Chunker;
use ragdb_core::loader::DocumentLoader;
use ragdb_core::types::{is_sentinel, Document, IndexEntry};
use ragdb_core::Result;

use crate::backend::Backend;
use crate::retriever::Retriever;

/// Counts from one ingest run. `skipped` chunks had no embedding and were not stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub stored: usize,
    pub skipped: usize,
}

pub struct Pipeline {
    backend: Backend,
    chunker: Chunker,
}

impl Pipeline {
    pub fn new(backend: Backend, chunker: Chunker) -> Self {
        Self { backend, chunker }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.backend.clone())
    }

    /// Chunks, embeds and stores `documents` in a single index write.
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        let mut report = IngestReport { documents: documents.len(), ..IngestReport::default() };
        let chunks: Vec<_> = documents.iter().flat_map(|d| self.chunker.chunk_document(d)).collect();
        report.chunks = chunks.len();
        if chunks.is_empty() {
            info!(documents = documents.len(), "No chunks produced, nothing to index");
            return Ok(report);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.backend.embedder.embed_many(&texts).await?;
        debug!(embedder = self.backend.embedder.name(), chunks = texts.len(), "embedded chunks");

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            if is_sentinel(&vector) {
                warn!(chunk = %chunk.id(), "no embedding for chunk, skipping");
                report.skipped += 1;
                continue;
            }
            entries.push(IndexEntry::new(chunk.id(), chunk.text.clone(), vector));
        }

        self.backend.index.store(&entries).await?;
        report.stored = entries.len();
        info!(
            documents = report.documents,
            chunks = report.chunks,
            stored = report.stored,
            skipped = report.skipped,
            index = self.backend.index.name(),
            "Ingest complete"
        );
        Ok(report)
    }

    /// Loads every `.txt` document under `dir` (up to `limit`) and ingests it.
    pub async fn ingest_dir(&self, dir: &Path, limit: Option<usize>) -> Result<IngestReport> {
        let loader = match limit {
            Some(n) => DocumentLoader::with_limit(n),
            None => DocumentLoader::new(),
        };
        let documents = loader.load_dir(dir)?;
        self.ingest(&documents).await
    }
}
