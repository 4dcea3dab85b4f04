//! Query-time boundary: turns a question into ranked chunk texts or an
//! explicit "nothing relevant" signal. Never returns an error.

use tracing::{debug, error};

use ragdb_core::types::{is_sentinel, SearchHit};
use ragdb_core::Error;

use crate::backend::Backend;

#[derive(Debug)]
pub enum Retrieval {
    Found(Vec<SearchHit>),
    NoMatches,
    Failed(Error),
}

impl Retrieval {
    /// Ranked chunk texts, best first. Empty unless `Found`.
    pub fn texts(&self) -> Vec<String> {
        match self {
            Retrieval::Found(hits) => hits.iter().map(|h| h.text.clone()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !matches!(self, Retrieval::Found(_))
    }

    pub fn into_generation_input(self, query: impl Into<String>) -> GenerationInput {
        let query = query.into();
        match self {
            Retrieval::Found(hits) => GenerationInput::Context {
                query,
                chunks: hits.into_iter().map(|h| h.text).collect(),
            },
            Retrieval::NoMatches | Retrieval::Failed(_) => GenerationInput::NoRelevantContent { query },
        }
    }
}

/// What the answer generator receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationInput {
    Context { query: String, chunks: Vec<String> },
    NoRelevantContent { query: String },
}

#[derive(Clone)]
pub struct Retriever {
    backend: Backend,
}

impl Retriever {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn top_k(&self, query: &str, k: usize) -> Retrieval {
        let vector = match self.backend.embedder.embed_many(&[query.to_string()]).await {
            Ok(mut vs) if !vs.is_empty() => vs.swap_remove(0),
            Ok(_) => Vec::new(),
            Err(e) => {
                error!(error = %e, "query embedding failed");
                return Retrieval::Failed(e);
            }
        };
        if is_sentinel(&vector) {
            error!(embedder = self.backend.embedder.name(), "query could not be embedded");
            return Retrieval::Failed(Error::provider("query could not be embedded"));
        }

        match self.backend.index.search(&vector, k).await {
            Ok(hits) if hits.is_empty() => {
                debug!("search returned no matches");
                Retrieval::NoMatches
            }
            Ok(hits) => {
                debug!(hits = hits.len(), best = hits[0].distance, "retrieved");
                Retrieval::Found(hits)
            }
            Err(e) => {
                error!(index = self.backend.index.name(), error = %e, "search failed");
                Retrieval::Failed(e)
            }
        }
    }
}
