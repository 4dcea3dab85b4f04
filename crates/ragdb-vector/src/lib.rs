//! Vector indexes: an exhaustive local index persisted to disk and a client
//! for a managed remote search service. Both implement
//! [`ragdb_core::traits::VectorIndex`].

pub mod flat;
pub mod persist;
pub mod remote;

pub use flat::FlatIndex;
pub use remote::{HttpSearchService, RemoteDocument, RemoteIndex, RemoteMatch, RemoteRecord, SearchService};
