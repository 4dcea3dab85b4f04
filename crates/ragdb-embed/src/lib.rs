//! Embedding providers: an in-process encoder and a remote HTTP service.

use anyhow::Result;

pub mod device;
pub mod hash;
pub mod local;
pub mod model;
pub mod pool;
pub mod remote;
pub mod tokenize;

pub use hash::HashEncoder;
pub use local::LocalEmbedder;
pub use model::BgeM3Model;
pub use pool::masked_mean_l2;
pub use remote::{EmbeddingService, HttpEmbeddingService, RemoteEmbedder};

/// Synchronous text encoder run by [`LocalEmbedder`].
pub trait Encoder: Send + Sync {
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}
