use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::app::ports::{ArtifactStorePort, RunTrackerPort};
use crate::error::{CleaningError, Result};
use crate::gateway::cas_fs::sha256_hex;
use crate::types::{
    validate_artifact_name, ArtifactHandle, ArtifactId, ArtifactManifest, ArtifactRef,
    PublishRequest, ResolvedArtifact, RunEvent, RunId, RunRecord, RunStatus, VersionSelector,
};

/// One stored artifact version with its content
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub manifest: ArtifactManifest,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct StoreState {
    versions: Vec<StoredArtifact>,
    published: Vec<StoredArtifact>,
    fail_publish: bool,
}

/// Artifact store kept in memory for tests and dry runs.
/// Resolved inputs are materialized under `scratch_dir`.
pub struct InMemoryArtifactStore {
    scratch_dir: PathBuf,
    state: Mutex<StoreState>,
}

impl InMemoryArtifactStore {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Add an artifact version directly, bypassing publish bookkeeping
    pub async fn seed(&self, name: &str, artifact_type: &str, bytes: &[u8]) -> ArtifactId {
        let mut state = self.state.lock().await;
        let version = next_version(&state.versions, name);
        let manifest = manifest_for(name, version, artifact_type, "", name, bytes, Vec::new(), None);
        let id = manifest.id();
        state.versions.push(StoredArtifact {
            manifest,
            bytes: bytes.to_vec(),
        });
        id
    }

    /// Every artifact registered through `publish`, in call order
    pub async fn published(&self) -> Vec<StoredArtifact> {
        self.state.lock().await.published.clone()
    }

    /// Make every later publish fail
    pub async fn fail_publishes(&self) {
        self.state.lock().await.fail_publish = true;
    }
}

fn next_version(versions: &[StoredArtifact], name: &str) -> u32 {
    versions
        .iter()
        .filter(|a| a.manifest.name == name)
        .map(|a| a.manifest.version + 1)
        .max()
        .unwrap_or(0)
}

#[allow(clippy::too_many_arguments)]
fn manifest_for(
    name: &str,
    version: u32,
    artifact_type: &str,
    description: &str,
    file_name: &str,
    bytes: &[u8],
    inputs: Vec<ArtifactId>,
    run_id: Option<RunId>,
) -> ArtifactManifest {
    ArtifactManifest {
        name: name.to_string(),
        version,
        artifact_type: artifact_type.to_string(),
        description: description.to_string(),
        file_name: file_name.to_string(),
        digest: format!("sha256:{}", sha256_hex(bytes)),
        size_bytes: bytes.len() as u64,
        created_at: Utc::now(),
        inputs,
        run_id,
    }
}

#[async_trait]
impl ArtifactStorePort for InMemoryArtifactStore {
    async fn resolve(&self, reference: &ArtifactRef) -> Result<ResolvedArtifact> {
        let state = self.state.lock().await;
        let found = state
            .versions
            .iter()
            .filter(|a| a.manifest.name == reference.name)
            .filter(|a| match reference.version {
                VersionSelector::Latest => true,
                VersionSelector::Exact(v) => a.manifest.version == v,
            })
            .max_by_key(|a| a.manifest.version)
            .ok_or_else(|| CleaningError::InputResolution {
                reference: reference.to_string(),
                reason: "artifact not found".to_string(),
            })?;

        let dir = self
            .scratch_dir
            .join(&found.manifest.name)
            .join(format!("v{}", found.manifest.version));
        fs::create_dir_all(&dir)?;
        let path = dir.join(&found.manifest.file_name);
        fs::write(&path, &found.bytes)?;

        Ok(ResolvedArtifact {
            id: found.manifest.id(),
            digest: found.manifest.digest.clone(),
            path,
        })
    }

    async fn publish(&self, request: PublishRequest) -> Result<ArtifactHandle> {
        let publish_error = |reason: String| CleaningError::Publish {
            name: request.name.clone(),
            reason,
        };

        let mut state = self.state.lock().await;
        if state.fail_publish {
            return Err(publish_error("store unavailable".to_string()));
        }
        validate_artifact_name(&request.name).map_err(publish_error)?;
        let bytes = fs::read(&request.path).map_err(|e| publish_error(e.to_string()))?;
        let file_name = request
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(request.name.as_str())
            .to_string();

        let version = next_version(&state.versions, &request.name);
        let manifest = manifest_for(
            &request.name,
            version,
            &request.artifact_type,
            &request.description,
            &file_name,
            &bytes,
            request.inputs.clone(),
            request.run_id,
        );
        debug!("Published {} ({} bytes)", manifest.id(), bytes.len());

        let handle = manifest.handle();
        let stored = StoredArtifact { manifest, bytes };
        state.versions.push(stored.clone());
        state.published.push(stored);
        Ok(handle)
    }
}

/// Run tracker that keeps every record in memory
#[derive(Default)]
pub struct InMemoryRunTracker {
    records: Mutex<Vec<RunRecord>>,
    fail_log_artifact: AtomicBool,
}

impl InMemoryRunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `log_artifact` call fail
    pub fn fail_artifact_logging(&self) {
        self.fail_log_artifact.store(true, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<RunRecord> {
        self.records.lock().await.clone()
    }

    pub async fn events_for(&self, run: RunId) -> Vec<RunEvent> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.run_id == run)
            .map(|r| r.event.clone())
            .collect()
    }

    async fn push(&self, run_id: RunId, event: RunEvent) {
        self.records.lock().await.push(RunRecord {
            run_id,
            at: Utc::now(),
            event,
        });
    }
}

#[async_trait]
impl RunTrackerPort for InMemoryRunTracker {
    async fn start_run(&self, job_type: &str, config: serde_json::Value) -> Result<RunId> {
        let run_id = RunId::new();
        self.push(
            run_id,
            RunEvent::Started {
                job_type: job_type.to_string(),
                config,
            },
        )
        .await;
        Ok(run_id)
    }

    async fn use_artifact(&self, run: RunId, artifact: &ArtifactId) -> Result<()> {
        self.push(
            run,
            RunEvent::Used {
                artifact: artifact.clone(),
            },
        )
        .await;
        Ok(())
    }

    async fn log_artifact(&self, run: RunId, artifact: &ArtifactHandle) -> Result<()> {
        if self.fail_log_artifact.load(Ordering::SeqCst) {
            return Err(CleaningError::Tracker("run log unavailable".to_string()));
        }
        self.push(
            run,
            RunEvent::Produced {
                artifact: artifact.id.clone(),
                digest: artifact.digest.clone(),
            },
        )
        .await;
        Ok(())
    }

    async fn finish_run(&self, run: RunId, status: RunStatus, error: Option<String>) -> Result<()> {
        self.push(run, RunEvent::Finished { status, error }).await;
        Ok(())
    }
}
