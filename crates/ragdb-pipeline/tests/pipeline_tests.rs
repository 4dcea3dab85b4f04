use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ragdb_core::chunker::Chunker;
use ragdb_core::config::{BackendKind, ChunkingConfig, RagConfig};
use ragdb_core::traits::{EmbeddingProvider, VectorIndex};
use ragdb_core::types::{Document, IndexEntry, SearchHit, Vector};
use ragdb_core::{Error, Result};
use ragdb_embed::{HashEncoder, LocalEmbedder};
use ragdb_pipeline::{Backend, GenerationInput, IngestReport, Pipeline, Retrieval};
use ragdb_vector::FlatIndex;

const MANUAL: &str = "Flowmeters require calibration. Set min and max limits. Recalibrate every 90 days.";

fn chunker(max: usize, overlap: usize) -> Chunker {
    Chunker::new(ChunkingConfig { max_tokens_per_chunk: max, overlap_sentences: overlap })
}

fn hash_backend() -> (Arc<FlatIndex>, Backend) {
    let index = Arc::new(FlatIndex::in_memory());
    let embedder = Arc::new(LocalEmbedder::new(Box::new(HashEncoder::new(64))));
    (index.clone(), Backend::new(embedder, index))
}

#[tokio::test]
async fn ingest_then_retrieve_end_to_end() -> anyhow::Result<()> {
    let (index, backend) = hash_backend();
    let pipeline = Pipeline::new(backend, chunker(8, 1));

    let docs = vec![
        Document::new("flow", MANUAL),
        Document::new("pump", "Prime the pump before use. Check seals weekly."),
    ];
    let report = pipeline.ingest(&docs).await?;
    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, report.stored);
    assert_eq!(report.skipped, 0);
    assert_eq!(index.len().await?, report.stored);
    assert_eq!(
        index.get_text("flow:1").await.as_deref(),
        Some("Set min and max limits. Recalibrate every 90 days.")
    );

    let retrieval = pipeline.retriever().top_k("Set min and max limits. Recalibrate every 90 days.", 2).await;
    let texts = retrieval.texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], "Set min and max limits. Recalibrate every 90 days.");
    match retrieval {
        Retrieval::Found(hits) => assert!(hits[0].distance < 1e-6 && hits[0].distance <= hits[1].distance),
        other => panic!("expected hits, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn empty_document_produces_empty_report() {
    let (index, backend) = hash_backend();
    let pipeline = Pipeline::new(backend, chunker(500, 100));
    let report = pipeline.ingest(&[Document::new("blank", "   \n\t ")]).await.unwrap();
    assert_eq!(report, IngestReport { documents: 1, ..IngestReport::default() });
    assert!(index.is_empty().await.unwrap());
}

#[tokio::test]
async fn empty_index_gives_no_matches_and_short_circuits_generation() {
    let (_, backend) = hash_backend();
    let pipeline = Pipeline::new(backend, Chunker::default());
    let retrieval = pipeline.retriever().top_k("anything", 3).await;
    assert!(matches!(retrieval, Retrieval::NoMatches));
    assert!(retrieval.is_empty());
    assert_eq!(
        retrieval.into_generation_input("anything"),
        GenerationInput::NoRelevantContent { query: "anything".into() }
    );
}

#[tokio::test]
async fn found_hits_become_generation_context() {
    let (_, backend) = hash_backend();
    let pipeline = Pipeline::new(backend, chunker(500, 0));
    pipeline.ingest(&[Document::new("flow", MANUAL)]).await.unwrap();
    let input = pipeline.retriever().top_k("calibration", 3).await.into_generation_input("calibration");
    assert_eq!(
        input,
        GenerationInput::Context { query: "calibration".into(), chunks: vec![MANUAL.to_string()] }
    );
}

/// Hash embeddings, except any text containing "unembeddable" yields the sentinel.
struct PartialEmbedder {
    inner: LocalEmbedder,
}

#[async_trait]
impl EmbeddingProvider for PartialEmbedder {
    fn name(&self) -> &str { "partial" }
    fn dim(&self) -> Option<usize> { self.inner.dim() }

    async fn embed(&self, text: &str) -> Result<Vector> {
        self.inner.embed(text).await
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let mut out = self.inner.embed_many(texts).await?;
        for (text, v) in texts.iter().zip(out.iter_mut()) {
            if text.contains("unembeddable") {
                v.clear();
            }
        }
        Ok(out)
    }
}

fn partial_backend() -> (Arc<FlatIndex>, Backend) {
    let index = Arc::new(FlatIndex::in_memory());
    let embedder = PartialEmbedder { inner: LocalEmbedder::new(Box::new(HashEncoder::new(32))) };
    (index.clone(), Backend::new(Arc::new(embedder), index))
}

#[tokio::test]
async fn sentinel_chunks_are_skipped_with_their_text() {
    let (index, backend) = partial_backend();
    let pipeline = Pipeline::new(backend, chunker(500, 0));
    let docs = vec![
        Document::new("good", "This chunk embeds fine."),
        Document::new("bad", "This chunk is unembeddable."),
        Document::new("also", "Another fine chunk."),
    ];
    let report = pipeline.ingest(&docs).await.unwrap();
    assert_eq!(report, IngestReport { documents: 3, chunks: 3, stored: 2, skipped: 1 });
    assert_eq!(index.len().await.unwrap(), 2);
    assert!(index.get_text("bad:0").await.is_none());
    assert_eq!(index.get_text("also:0").await.as_deref(), Some("Another fine chunk."));
}

#[tokio::test]
async fn unembeddable_query_fails_without_searching() {
    let (_, backend) = partial_backend();
    let pipeline = Pipeline::new(backend, Chunker::default());
    let retrieval = pipeline.retriever().top_k("an unembeddable question", 3).await;
    assert!(matches!(retrieval, Retrieval::Failed(Error::Provider(_))), "got {retrieval:?}");
    assert!(retrieval.texts().is_empty());
}

#[derive(Default)]
struct BrokenIndex {
    searches: AtomicUsize,
}

#[async_trait]
impl VectorIndex for BrokenIndex {
    fn name(&self) -> &str { "broken" }

    async fn store(&self, _entries: &[IndexEntry]) -> Result<()> {
        Err(Error::unavailable("disk gone"))
    }

    async fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<SearchHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Err(Error::unavailable("disk gone"))
    }

    async fn len(&self) -> Result<usize> {
        Ok(0)
    }

    async fn dim(&self) -> Option<usize> {
        None
    }
}

#[tokio::test]
async fn index_failure_is_reported_not_swallowed() {
    let index = Arc::new(BrokenIndex::default());
    let embedder = Arc::new(LocalEmbedder::new(Box::new(HashEncoder::new(16))));
    let pipeline = Pipeline::new(Backend::new(embedder, index.clone()), Chunker::default());

    let err = pipeline.ingest(&[Document::new("d", MANUAL)]).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));

    let retrieval = pipeline.retriever().top_k("calibration", 3).await;
    assert!(matches!(retrieval, Retrieval::Failed(Error::IndexUnavailable(_))));
    assert_eq!(index.searches.load(Ordering::SeqCst), 1);
    assert!(matches!(
        retrieval.into_generation_input("calibration"),
        GenerationInput::NoRelevantContent { .. }
    ));
}

#[tokio::test]
async fn ingest_dir_and_reopen_local_backend_from_config() -> anyhow::Result<()> {
    let data = tempfile::tempdir()?;
    let store = tempfile::tempdir()?;
    std::fs::write(data.path().join("flow.txt"), MANUAL)?;
    std::fs::write(data.path().join("pump.txt"), "Prime the pump before use.")?;

    let mut cfg = RagConfig::default();
    cfg.backend = BackendKind::Local;
    cfg.local.hash_embeddings = true;
    cfg.local.hash_dim = 48;
    cfg.local.index_dir = store.path().to_string_lossy().to_string();
    cfg.chunking = ChunkingConfig { max_tokens_per_chunk: 8, overlap_sentences: 1 };

    let pipeline = Pipeline::new(Backend::from_config(&cfg)?, Chunker::new(cfg.chunking.clone()));
    let report = pipeline.ingest_dir(data.path(), Some(1)).await?;
    assert_eq!(report.documents, 1);
    assert_eq!(report.stored, 2);
    drop(pipeline);

    let backend = Backend::from_config(&cfg)?;
    assert_eq!(backend.index.len().await?, 2);
    assert_eq!(backend.index.dim().await, Some(48));
    Ok(())
}

#[test]
fn remote_backend_without_endpoints_is_a_configuration_error() {
    let cfg = RagConfig { backend: BackendKind::Remote, ..RagConfig::default() };
    assert!(matches!(Backend::from_config(&cfg), Err(Error::Configuration(_))));
}

#[tokio::test]
async fn torn_local_index_degrades_at_the_retriever() -> anyhow::Result<()> {
    let store = tempfile::tempdir()?;
    std::fs::write(store.path().join("chunks.json"), "[]")?;

    let mut cfg = RagConfig::default();
    cfg.local.hash_embeddings = true;
    cfg.local.hash_dim = 16;
    cfg.local.index_dir = store.path().to_string_lossy().to_string();

    let pipeline = Pipeline::new(Backend::from_config(&cfg)?, Chunker::default());
    let retrieval = pipeline.retriever().top_k("calibration", 3).await;
    assert!(matches!(retrieval, Retrieval::Failed(Error::IndexUnavailable(_))), "got {retrieval:?}");
    assert_eq!(
        retrieval.into_generation_input("calibration"),
        GenerationInput::NoRelevantContent { query: "calibration".into() }
    );

    let err = pipeline.ingest(&[Document::new("flow", MANUAL)]).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
    Ok(())
}
