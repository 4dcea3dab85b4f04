use std::sync::Arc;

use tracing::info;

use ragdb_core::config::{BackendKind, RagConfig};
use ragdb_core::traits::{EmbeddingProvider, VectorIndex};
use ragdb_core::Result;
use ragdb_embed::{LocalEmbedder, RemoteEmbedder};
use ragdb_vector::{FlatIndex, RemoteIndex};

/// An embedding provider and the index its vectors go into. Always chosen
/// together so a local model never feeds a remote index or the reverse.
#[derive(Clone)]
pub struct Backend {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
}

impl Backend {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn from_config(cfg: &RagConfig) -> Result<Self> {
        cfg.validate()?;
        let backend = match cfg.backend {
            BackendKind::Local => {
                let embedder = LocalEmbedder::from_config(&cfg.local)?;
                let index = FlatIndex::open_or_unavailable(cfg.local_index_dir());
                Self::new(Arc::new(embedder), Arc::new(index))
            }
            BackendKind::Remote => {
                let embedder = RemoteEmbedder::from_config(&cfg.remote)?;
                let index = RemoteIndex::from_config(&cfg.remote)?;
                Self::new(Arc::new(embedder), Arc::new(index))
            }
        };
        info!(embedder = backend.embedder.name(), index = backend.index.name(), "Backend ready");
        Ok(backend)
    }
}
