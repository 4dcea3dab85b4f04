//! Remote embedding provider.
//!
//! Items of a batch are sent concurrently through an order-preserving bounded
//! stream. Every call runs under a timeout and is retried; an item that still
//! fails resolves to the empty sentinel vector so that `vectors[i]` keeps
//! pairing with `texts[i]`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use ragdb_core::config::RemoteConfig;
use ragdb_core::traits::EmbeddingProvider;
use ragdb_core::types::Vector;
use ragdb_core::{Error, Result};

/// One network call that embeds one text.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_one(&self, text: &str) -> Result<Vector>;
}

/// OpenAI-compatible `/embeddings` endpoint: `{model, input}` in, `data[0].embedding` out.
pub struct HttpEmbeddingService {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbeddingService {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: Client::new(), endpoint: endpoint.into(), model: model.into(), api_key }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingService {
    async fn embed_one(&self, text: &str) -> Result<Vector> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "model": self.model, "input": text }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| Error::provider(format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::provider(format!("embedding service returned {status}: {body}")));
        }
        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| Error::provider(format!("malformed embedding response: {e}")))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| Error::provider("embedding response had no data"))
    }
}

pub struct RemoteEmbedder {
    service: Arc<dyn EmbeddingService>,
    name: String,
    dim: Option<usize>,
    concurrency: usize,
    timeout: Duration,
    max_retries: usize,
    backoff: Duration,
}

impl RemoteEmbedder {
    pub fn new(service: Arc<dyn EmbeddingService>, name: impl Into<String>) -> Self {
        let defaults = RemoteConfig::default();
        Self {
            service,
            name: name.into(),
            dim: None,
            concurrency: defaults.concurrency,
            timeout: Duration::from_secs(defaults.timeout_secs),
            max_retries: defaults.max_retries,
            backoff: Duration::from_millis(200),
        }
    }

    pub fn from_config(cfg: &RemoteConfig) -> Result<Self> {
        let endpoint = cfg
            .embedding_endpoint
            .clone()
            .ok_or_else(|| Error::config("remote.embedding_endpoint is not set"))?;
        let service = HttpEmbeddingService::new(endpoint, cfg.embedding_model.clone(), cfg.api_key.clone());
        Ok(Self::new(Arc::new(service), format!("remote:{}", cfg.embedding_model))
            .with_dim(cfg.dimension)
            .with_concurrency(cfg.concurrency)
            .with_timeout(Duration::from_secs(cfg.timeout_secs))
            .with_max_retries(cfg.max_retries))
    }

    pub fn with_dim(mut self, dim: Option<usize>) -> Self { self.dim = dim; self }
    pub fn with_concurrency(mut self, n: usize) -> Self { self.concurrency = n.max(1); self }
    pub fn with_timeout(mut self, timeout: Duration) -> Self { self.timeout = timeout; self }
    pub fn with_max_retries(mut self, n: usize) -> Self { self.max_retries = n; self }
    pub fn with_backoff(mut self, backoff: Duration) -> Self { self.backoff = backoff; self }

    async fn attempt(&self, text: &str) -> Result<Vector> {
        let v = tokio::time::timeout(self.timeout, self.service.embed_one(text))
            .await
            .map_err(|_| Error::provider(format!("timed out after {:?}", self.timeout)))??;
        if v.is_empty() {
            return Err(Error::provider("service returned an empty vector"));
        }
        if let Some(expected) = self.dim {
            if v.len() != expected {
                return Err(Error::DimensionMismatch { expected, actual: v.len() });
            }
        }
        Ok(v)
    }

    async fn embed_with_retry(&self, text: &str) -> Result<Vector> {
        let mut attempt = 0usize;
        loop {
            match self.attempt(text).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries => {
                    debug!(provider = %self.name, attempt, error = %e, "embedding attempt failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.backoff * attempt as u32).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbedder {
    fn name(&self) -> &str { &self.name }

    fn dim(&self) -> Option<usize> { self.dim }

    async fn embed(&self, text: &str) -> Result<Vector> {
        self.embed_with_retry(text).await
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let total = texts.len();
        let vectors: Vec<Vector> = stream::iter(texts.iter().cloned().enumerate())
            .map(|(i, text)| async move {
                match self.embed_with_retry(&text).await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(provider = %self.name, item = i, total, error = %e, "embedding failed, using empty sentinel");
                        Vec::new()
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;
        let failed = vectors.iter().filter(|v| v.is_empty()).count();
        debug!(provider = %self.name, items = total, failed, "embedded batch");
        Ok(vectors)
    }
}
