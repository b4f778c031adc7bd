use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    ArtifactHandle, ArtifactId, ArtifactRef, PublishRequest, ResolvedArtifact, RunId, RunStatus,
};

/// Versioned artifact storage: materialize inputs, register outputs
#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    /// Resolve a reference to a concrete version and a readable local file.
    async fn resolve(&self, reference: &ArtifactRef) -> Result<ResolvedArtifact>;

    /// Register the file at `request.path` as a new version of `request.name`.
    async fn publish(&self, request: PublishRequest) -> Result<ArtifactHandle>;
}

/// Records what each run consumed and produced
#[async_trait]
pub trait RunTrackerPort: Send + Sync {
    async fn start_run(&self, job_type: &str, config: serde_json::Value) -> Result<RunId>;
    async fn use_artifact(&self, run: RunId, artifact: &ArtifactId) -> Result<()>;
    async fn log_artifact(&self, run: RunId, artifact: &ArtifactHandle) -> Result<()>;
    async fn finish_run(&self, run: RunId, status: RunStatus, error: Option<String>) -> Result<()>;
}
