//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__TOP_K=5`) on top of
//! the defaults in [`RagConfig::default`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Selects the embedding provider and the vector index together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens_per_chunk: usize,
    /// Sentence count, not tokens.
    pub overlap_sentences: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens_per_chunk: 500, overlap_sentences: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub index_dir: String,
    pub model_dir: Option<String>,
    /// Use the deterministic hash encoder instead of loading a model.
    pub hash_embeddings: bool,
    pub hash_dim: usize,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            index_dir: "~/.ragdb/index".to_string(),
            model_dir: None,
            hash_embeddings: false,
            hash_dim: 1024,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub embedding_endpoint: Option<String>,
    pub embedding_model: String,
    pub search_endpoint: Option<String>,
    pub index_name: String,
    pub api_key: Option<String>,
    pub dimension: Option<usize>,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            embedding_endpoint: None,
            embedding_model: "text-embedding-3-small".to_string(),
            search_endpoint: None,
            index_name: "documents".to_string(),
            api_key: None,
            dimension: None,
            concurrency: 4,
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

// Hand-written so the key never reaches a log line.
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("embedding_endpoint", &self.embedding_endpoint)
            .field("embedding_model", &self.embedding_model)
            .field("search_endpoint", &self.search_endpoint)
            .field("index_name", &self.index_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dimension", &self.dimension)
            .field("concurrency", &self.concurrency)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub backend: BackendKind,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub local: LocalConfig,
    pub remote: RemoteConfig,
}

impl RagConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens_per_chunk == 0 {
            return Err(Error::config("chunking.max_tokens_per_chunk must be > 0"));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be > 0"));
        }
        match self.backend {
            BackendKind::Local => {
                if !self.local.hash_embeddings && self.local.model_dir.is_none() {
                    return Err(Error::config(
                        "local.model_dir is required unless local.hash_embeddings = true",
                    ));
                }
                if self.local.hash_embeddings && self.local.hash_dim == 0 {
                    return Err(Error::config("local.hash_dim must be > 0"));
                }
            }
            BackendKind::Remote => {
                if self.remote.embedding_endpoint.is_none() {
                    return Err(Error::config("remote.embedding_endpoint is required for the remote backend"));
                }
                if self.remote.search_endpoint.is_none() {
                    return Err(Error::config("remote.search_endpoint is required for the remote backend"));
                }
                if self.remote.concurrency == 0 {
                    return Err(Error::config("remote.concurrency must be > 0"));
                }
            }
        }
        Ok(())
    }

    /// Local index directory with `~` and env vars expanded.
    pub fn local_index_dir(&self) -> PathBuf {
        expand_path(&self.local.index_dir)
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Loads layered config files from `dir` for the given environment name.
    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(RagConfig::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::config(format!("Failed to get '{key}': {e}")))
    }

    /// Extracts and validates the full typed configuration.
    pub fn rag(&self) -> Result<RagConfig> {
        let cfg: RagConfig = self
            .figment
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
