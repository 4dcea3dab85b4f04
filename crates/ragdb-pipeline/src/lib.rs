//! Wires a chunker, an embedding provider and a vector index into ingest and
//! top-k retrieval.

pub mod backend;
pub mod ingest;
pub mod retriever;

pub use backend::Backend;
pub use ingest::{IngestReport, Pipeline};
pub use retriever::{GenerationInput, Retrieval, Retriever};
