//! Vector snapshot persistence, the shared in-memory handle, index builds and
//! reranked retrieval.

pub mod build;
pub mod handle;
pub mod rerank;
pub mod retriever;
pub mod snapshot;
pub mod store;

pub use build::{BuildReport, IndexBuilder};
pub use handle::{IndexHandle, LoadedSnapshot};
pub use retriever::Retriever;
pub use snapshot::Snapshot;
pub use store::{Manifest, SnapshotStore};
