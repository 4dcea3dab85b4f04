//! Client side of a managed vector search service.
//!
//! The service owns durability and its own consistency. This client owns the
//! contract: one dimension per index, text and vector uploaded together, and
//! results ranked by squared L2 distance ascending.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use ragdb_core::config::RemoteConfig;
use ragdb_core::traits::VectorIndex;
use ragdb_core::types::{IndexEntry, SearchHit};
use ragdb_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMatch {
    pub id: String,
    pub content: String,
    /// Squared L2 distance reported by the service.
    pub distance: f32,
}

/// Text the service currently holds for an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: String,
    pub content: String,
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn upload(&self, docs: &[RemoteDocument]) -> Result<()>;
    /// Records for those `ids` the service already holds; unknown ids are omitted.
    async fn lookup(&self, ids: &[String]) -> Result<Vec<RemoteRecord>>;
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RemoteMatch>>;
    async fn count(&self) -> Result<usize>;
}

/// JSON-over-HTTP search service rooted at `{endpoint}/indexes/{index}`.
pub struct HttpSearchService {
    client: Client,
    base: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    documents: &'a [RemoteDocument],
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    k: usize,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    ids: &'a [String],
}

#[derive(Deserialize)]
struct LookupResponse {
    documents: Vec<RemoteRecord>,
}

#[derive(Deserialize)]
struct QueryResponse {
    matches: Vec<RemoteMatch>,
}

#[derive(Deserialize)]
struct StatsResponse {
    count: usize,
}

impl HttpSearchService {
    pub fn new(endpoint: &str, index_name: &str, api_key: Option<String>) -> Self {
        let base = format!("{}/indexes/{}", endpoint.trim_end_matches('/'), index_name);
        Self { client: Client::new(), base, api_key }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, format!("{}/{}", self.base, path));
        match &self.api_key {
            Some(key) => req.header("api-key", key),
            None => req,
        }
    }

    async fn send(req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let resp = req.send().await.map_err(|e| Error::unavailable(format!("search service unreachable: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::unavailable(format!("search service returned {status}: {body}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl SearchService for HttpSearchService {
    async fn upload(&self, docs: &[RemoteDocument]) -> Result<()> {
        let req = self.request(reqwest::Method::POST, "documents").json(&UploadRequest { documents: docs });
        Self::send(req).await?;
        Ok(())
    }

    async fn lookup(&self, ids: &[String]) -> Result<Vec<RemoteRecord>> {
        let req = self.request(reqwest::Method::POST, "lookup").json(&LookupRequest { ids });
        let parsed: LookupResponse = Self::send(req)
            .await?
            .json()
            .await
            .map_err(|e| Error::unavailable(format!("malformed lookup response: {e}")))?;
        Ok(parsed.documents)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RemoteMatch>> {
        let req = self.request(reqwest::Method::POST, "query").json(&QueryRequest { vector, k });
        let parsed: QueryResponse = Self::send(req)
            .await?
            .json()
            .await
            .map_err(|e| Error::unavailable(format!("malformed query response: {e}")))?;
        Ok(parsed.matches)
    }

    async fn count(&self) -> Result<usize> {
        let parsed: StatsResponse = Self::send(self.request(reqwest::Method::GET, "stats"))
            .await?
            .json()
            .await
            .map_err(|e| Error::unavailable(format!("malformed stats response: {e}")))?;
        Ok(parsed.count)
    }
}

pub struct RemoteIndex {
    service: Arc<dyn SearchService>,
    name: String,
    dim: RwLock<Option<usize>>,
    writer: Mutex<()>,
}

impl RemoteIndex {
    pub fn new(service: Arc<dyn SearchService>, name: impl Into<String>, dim: Option<usize>) -> Self {
        Self { service, name: name.into(), dim: RwLock::new(dim), writer: Mutex::new(()) }
    }

    pub fn from_config(cfg: &RemoteConfig) -> Result<Self> {
        let endpoint = cfg
            .search_endpoint
            .as_deref()
            .ok_or_else(|| Error::config("remote.search_endpoint is not set"))?;
        let service = HttpSearchService::new(endpoint, &cfg.index_name, cfg.api_key.clone());
        Ok(Self::new(Arc::new(service), format!("remote:{}", cfg.index_name), cfg.dimension))
    }

    fn known_dim(&self) -> Option<usize> {
        *self.dim.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl VectorIndex for RemoteIndex {
    fn name(&self) -> &str { &self.name }

    async fn store(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let _writer = self.writer.lock().await;
        let dim = self.known_dim().unwrap_or_else(|| entries[0].vector.len());
        let mut docs = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.vector.is_empty() || entry.vector.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: entry.vector.len() });
            }
            if let Some(prev) = docs.iter().find(|d: &&RemoteDocument| d.id == entry.id) {
                if prev.content != entry.chunk_text {
                    return Err(Error::IdConflict(format!("id '{}' appears twice with different text", entry.id)));
                }
                continue;
            }
            docs.push(RemoteDocument {
                id: entry.id.clone(),
                content: entry.chunk_text.clone(),
                embedding: entry.vector.clone(),
            });
        }

        // Ids the service already holds must keep their text.
        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        let existing: HashMap<String, String> =
            self.service.lookup(&ids).await?.into_iter().map(|r| (r.id, r.content)).collect();
        let mut fresh = Vec::with_capacity(docs.len());
        for doc in docs {
            match existing.get(&doc.id) {
                Some(text) if *text == doc.content => continue,
                Some(_) => {
                    return Err(Error::IdConflict(format!("id '{}' already maps to different text", doc.id)))
                }
                None => fresh.push(doc),
            }
        }
        if fresh.is_empty() {
            debug!(index = %self.name, "store: all {} entries already present", entries.len());
            return Ok(());
        }
        self.service.upload(&fresh).await?;
        *self.dim.write().unwrap_or_else(PoisonError::into_inner) = Some(dim);
        info!(index = %self.name, uploaded = fresh.len(), dim, "Uploaded entries to search service");
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(vec![]);
        }
        if let Some(expected) = self.known_dim() {
            if query.len() != expected {
                return Err(Error::DimensionMismatch { expected, actual: query.len() });
            }
        }
        let mut matches = self.service.query(query, k).await?;
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(k);
        debug!(index = %self.name, hits = matches.len(), "remote search");
        Ok(matches
            .into_iter()
            .map(|m| SearchHit { id: m.id, text: m.content, distance: m.distance })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        self.service.count().await
    }

    async fn dim(&self) -> Option<usize> {
        self.known_dim()
    }
}
