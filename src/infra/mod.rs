// Adapters implementing the application ports

pub mod fs_artifact_store;
pub mod in_memory;
pub mod ndjson_run_tracker;

pub use fs_artifact_store::FsArtifactStore;
pub use in_memory::{InMemoryArtifactStore, InMemoryRunTracker};
pub use ndjson_run_tracker::NdjsonRunTracker;
