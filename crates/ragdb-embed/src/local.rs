//! In-process embedding provider.
//!
//! Encoding is serialized through a mutex: the model's own execution context
//! is the unit of parallelism. Any failed item fails the whole batch.

use async_trait::async_trait;
use ragdb_core::config::{expand_path, LocalConfig};
use ragdb_core::traits::EmbeddingProvider;
use ragdb_core::types::Vector;
use ragdb_core::{Error, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::hash::HashEncoder;
use crate::model::BgeM3Model;
use crate::Encoder;

pub struct LocalEmbedder {
    encoder: Mutex<Box<dyn Encoder>>,
    name: String,
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(encoder: Box<dyn Encoder>) -> Self {
        let name = format!("local:{}", encoder.id());
        let dim = encoder.dim();
        Self { encoder: Mutex::new(encoder), name, dim }
    }

    /// Builds the configured encoder. A missing or unloadable model is a
    /// configuration error, surfaced before any text is embedded.
    pub fn from_config(cfg: &LocalConfig) -> Result<Self> {
        if cfg.hash_embeddings {
            info!(dim = cfg.hash_dim, "Using hash embeddings");
            return Ok(Self::new(Box::new(HashEncoder::new(cfg.hash_dim))));
        }
        let dir = cfg
            .model_dir
            .as_deref()
            .map(expand_path)
            .ok_or_else(|| Error::config("local.model_dir is not set"))?;
        let model = BgeM3Model::load(&dir)
            .map_err(|e| Error::config(format!("embedding model unavailable at {}: {e:#}", dir.display())))?;
        Ok(Self::new(Box::new(model)))
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn name(&self) -> &str { &self.name }

    fn dim(&self) -> Option<usize> { Some(self.dim) }

    async fn embed(&self, text: &str) -> Result<Vector> {
        let encoder = self.encoder.lock().await;
        encoder.encode(text).map_err(|e| Error::provider(format!("{}: {e:#}", self.name)))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let encoder = self.encoder.lock().await;
        let mut out = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let v = encoder
                .encode(text)
                .map_err(|e| Error::provider(format!("{}: item {i} of {}: {e:#}", self.name, texts.len())))?;
            out.push(v);
        }
        debug!(provider = %self.name, items = out.len(), "embedded batch");
        Ok(out)
    }
}
