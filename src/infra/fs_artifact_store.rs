//! Filesystem-backed, versioned artifact store.
//!
//! Layout under `root`:
//! - `sha256/<aa>/<bb>/<hex>`: content-addressed blobs, written once
//! - `artifacts/<name>/v<N>.json`: one manifest per version
//!
//! Publishing content identical to the latest version of a name, with the same
//! inputs, returns that version instead of creating a new one. Different inputs
//! get a new version that shares the stored blob.
//!
//! Versions are claimed with a hard link, so an existing `v<N>.json` is never
//! replaced; a publisher that loses the race retries with the next number.

use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::ports::ArtifactStorePort;
use crate::error::{CleaningError, Result};
use crate::gateway::cas_fs::{blob_path, write_cas};
use crate::observability::metrics;
use crate::types::{
    validate_artifact_name, ArtifactHandle, ArtifactId, ArtifactManifest, ArtifactRef,
    PublishRequest, ResolvedArtifact, VersionSelector,
};

const MAX_PUBLISH_ATTEMPTS: usize = 32;

pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_dir(&self, name: &str) -> PathBuf {
        self.root.join("artifacts").join(name)
    }

    fn manifest_path(&self, id: &ArtifactId) -> PathBuf {
        self.manifest_dir(&id.name).join(format!("v{}.json", id.version))
    }

    /// Known versions of `name`, ascending. Unknown names have none.
    pub fn versions(&self, name: &str) -> Result<Vec<u32>> {
        let dir = self.manifest_dir(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(n) = file_name
                .strip_prefix('v')
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|n| n.parse::<u32>().ok())
            {
                versions.push(n);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    pub fn manifest(&self, id: &ArtifactId) -> Result<Option<ArtifactManifest>> {
        let path = self.manifest_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn latest_manifest(&self, name: &str) -> Result<Option<ArtifactManifest>> {
        match self.versions(name)?.last() {
            Some(&version) => self.manifest(&ArtifactId::new(name, version)),
            None => Ok(None),
        }
    }

    /// Local path of the stored content of one version
    pub fn content_path(&self, manifest: &ArtifactManifest) -> Option<PathBuf> {
        blob_path(&self.root, &manifest.digest)
    }

    /// Claim `v<N>.json` for `manifest` without replacing an existing version.
    /// Returns `false` when another publisher already holds that version.
    fn install_manifest(&self, manifest: &ArtifactManifest) -> Result<bool> {
        let dir = self.manifest_dir(&manifest.name);
        fs::create_dir_all(&dir)?;
        let path = self.manifest_path(&manifest.id());
        let tmp = dir.join(format!(".v{}.{}.json.tmp", manifest.version, Uuid::new_v4()));
        fs::write(&tmp, serde_json::to_vec_pretty(manifest)?)?;
        let linked = fs::hard_link(&tmp, &path);
        fs::remove_file(&tmp)?;
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_local(&self, reference: &ArtifactRef) -> Result<ResolvedArtifact> {
        let manifest = match reference.version {
            VersionSelector::Latest => self.latest_manifest(&reference.name)?,
            VersionSelector::Exact(version) => {
                self.manifest(&ArtifactId::new(reference.name.clone(), version))?
            }
        }
        .ok_or_else(|| CleaningError::InputResolution {
            reference: reference.to_string(),
            reason: "no such artifact version".to_string(),
        })?;

        let path = self
            .content_path(&manifest)
            .filter(|p| p.is_file())
            .ok_or_else(|| CleaningError::InputResolution {
                reference: reference.to_string(),
                reason: format!("content {} is missing from the store", manifest.digest),
            })?;

        Ok(ResolvedArtifact {
            id: manifest.id(),
            digest: manifest.digest,
            path,
        })
    }

    fn publish_local(&self, request: &PublishRequest) -> Result<ArtifactHandle> {
        validate_artifact_name(&request.name).map_err(CleaningError::Config)?;
        let bytes = fs::read(&request.path)?;
        let digest = write_cas(&self.root, &bytes)?;
        let file_name = request
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(request.name.as_str())
            .to_string();

        for _ in 0..MAX_PUBLISH_ATTEMPTS {
            let latest = self.latest_manifest(&request.name)?;
            if let Some(latest) = &latest {
                if latest.digest == digest
                    && latest.artifact_type == request.artifact_type
                    && latest.inputs == request.inputs
                {
                    metrics::store::publish_deduplicated();
                    debug!("Content and inputs unchanged, reusing {}", latest.id());
                    return Ok(latest.handle());
                }
            }

            let manifest = ArtifactManifest {
                name: request.name.clone(),
                version: latest.map(|m| m.version + 1).unwrap_or(0),
                artifact_type: request.artifact_type.clone(),
                description: request.description.clone(),
                file_name: file_name.clone(),
                digest: digest.clone(),
                size_bytes: bytes.len() as u64,
                created_at: Utc::now(),
                inputs: request.inputs.clone(),
                run_id: request.run_id,
            };
            if self.install_manifest(&manifest)? {
                metrics::store::publish_success(manifest.size_bytes);
                info!(artifact = %manifest.id(), digest = %manifest.digest, "Registered artifact version");
                return Ok(manifest.handle());
            }
            debug!("Version {} was claimed concurrently, retrying", manifest.id());
        }

        Err(CleaningError::Publish {
            name: request.name.clone(),
            reason: format!("no free version after {} attempts", MAX_PUBLISH_ATTEMPTS),
        })
    }
}

#[async_trait]
impl ArtifactStorePort for FsArtifactStore {
    async fn resolve(&self, reference: &ArtifactRef) -> Result<ResolvedArtifact> {
        self.resolve_local(reference).map_err(|e| {
            metrics::store::resolve_error();
            match e {
                CleaningError::InputResolution { .. } => e,
                other => CleaningError::InputResolution {
                    reference: reference.to_string(),
                    reason: other.to_string(),
                },
            }
        })
    }

    async fn publish(&self, request: PublishRequest) -> Result<ArtifactHandle> {
        self.publish_local(&request)
            .map_err(|e| CleaningError::Publish {
                name: request.name.clone(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stage(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn request(name: &str, path: PathBuf, inputs: Vec<ArtifactId>) -> PublishRequest {
        PublishRequest {
            name: name.to_string(),
            artifact_type: "clean_sample".to_string(),
            description: "cleaned listings".to_string(),
            path,
            inputs,
            run_id: None,
        }
    }

    #[tokio::test]
    async fn test_publish_then_resolve() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));
        let path = stage(dir.path(), "clean_sample.csv", "id,price\n1,80\n");
        let input = ArtifactId::new("sample.csv", 3);

        let handle = store
            .publish(request("clean_sample.csv", path, vec![input.clone()]))
            .await
            .unwrap();
        assert_eq!(handle.id, ArtifactId::new("clean_sample.csv", 0));
        assert_eq!(handle.size_bytes, 14);

        let resolved = store.resolve(&"clean_sample.csv:v0".parse().unwrap()).await.unwrap();
        assert_eq!(resolved.id, handle.id);
        assert_eq!(fs::read_to_string(&resolved.path).unwrap(), "id,price\n1,80\n");

        let manifest = store.manifest(&handle.id).unwrap().unwrap();
        assert_eq!(manifest.inputs, vec![input]);
        assert_eq!(manifest.file_name, "clean_sample.csv");
        assert_eq!(manifest.artifact_type, "clean_sample");
    }

    #[tokio::test]
    async fn test_new_content_creates_new_version() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));

        let first = stage(dir.path(), "a.csv", "id\n1\n");
        store.publish(request("listings", first, vec![])).await.unwrap();
        let second = stage(dir.path(), "b.csv", "id\n2\n");
        let handle = store.publish(request("listings", second, vec![])).await.unwrap();

        assert_eq!(handle.id.version, 1);
        assert_eq!(store.versions("listings").unwrap(), vec![0, 1]);

        let latest = store.resolve(&"listings".parse().unwrap()).await.unwrap();
        assert_eq!(latest.id.version, 1);
        assert_eq!(fs::read_to_string(latest.path).unwrap(), "id\n2\n");
    }

    #[tokio::test]
    async fn test_identical_content_reuses_latest_version() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));
        let path = stage(dir.path(), "a.csv", "id\n1\n");

        let first = store.publish(request("listings", path.clone(), vec![])).await.unwrap();
        let again = store.publish(request("listings", path, vec![])).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(store.versions("listings").unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_unknown_references() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));
        let path = stage(dir.path(), "a.csv", "id\n1\n");
        store.publish(request("listings", path, vec![])).await.unwrap();

        for reference in ["nothing.csv:latest", "listings:v4"] {
            let err = store.resolve(&reference.parse().unwrap()).await.unwrap_err();
            assert!(
                matches!(err, CleaningError::InputResolution { .. }),
                "{reference} -> {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_missing_blob_is_resolution_error() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));
        let path = stage(dir.path(), "a.csv", "id\n1\n");
        let handle = store.publish(request("listings", path, vec![])).await.unwrap();

        let manifest = store.manifest(&handle.id).unwrap().unwrap();
        fs::remove_file(store.content_path(&manifest).unwrap()).unwrap();

        let err = store.resolve(&"listings:v0".parse().unwrap()).await.unwrap_err();
        assert!(matches!(err, CleaningError::InputResolution { .. }));
    }

    #[tokio::test]
    async fn test_publish_errors() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));

        let missing = dir.path().join("never-written.csv");
        let err = store.publish(request("listings", missing, vec![])).await.unwrap_err();
        assert!(matches!(err, CleaningError::Publish { .. }));

        let path = stage(dir.path(), "a.csv", "id\n1\n");
        let err = store.publish(request("../escape", path, vec![])).await.unwrap_err();
        assert!(matches!(err, CleaningError::Publish { .. }));
        assert!(!dir.path().join("escape").exists());
    }

    #[tokio::test]
    async fn test_same_content_from_another_input_gets_its_own_version() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));
        let path = stage(dir.path(), "clean_sample.csv", "id,price\n1,80\n");

        let first = store
            .publish(request("clean_sample.csv", path.clone(), vec![ArtifactId::new("sample.csv", 0)]))
            .await
            .unwrap();
        let second = store
            .publish(request("clean_sample.csv", path, vec![ArtifactId::new("sample.csv", 1)]))
            .await
            .unwrap();

        assert_eq!(second.id, ArtifactId::new("clean_sample.csv", 1));
        assert_eq!(first.digest, second.digest);
        let inputs = |id: &ArtifactId| store.manifest(id).unwrap().unwrap().inputs;
        assert_eq!(inputs(&first.id), vec![ArtifactId::new("sample.csv", 0)]);
        assert_eq!(inputs(&second.id), vec![ArtifactId::new("sample.csv", 1)]);
    }

    #[test]
    fn test_claimed_version_is_never_replaced() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));
        let path = stage(dir.path(), "a.csv", "id\n1\n");
        let handle = store.publish_local(&request("listings", path, vec![])).unwrap();

        let mut rival = store.manifest(&handle.id).unwrap().unwrap();
        rival.digest = format!("sha256:{}", "0".repeat(64));
        assert!(!store.install_manifest(&rival).unwrap());

        let kept = store.manifest(&handle.id).unwrap().unwrap();
        assert_eq!(kept.digest, handle.digest);
        let leftovers: Vec<_> = fs::read_dir(store.manifest_dir("listings"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_concurrent_publishers_get_distinct_versions() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("store"));
        let paths: Vec<PathBuf> = (0..8)
            .map(|i| stage(dir.path(), &format!("part{i}.csv"), &format!("id\n{i}\n")))
            .collect();

        let handles: Vec<ArtifactHandle> = std::thread::scope(|scope| {
            let workers: Vec<_> = paths
                .iter()
                .map(|path| {
                    let store = &store;
                    scope.spawn(move || store.publish_local(&request("listings", path.clone(), vec![])))
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap().unwrap()).collect()
        });

        assert_eq!(store.versions("listings").unwrap(), (0..8).collect::<Vec<u32>>());
        for handle in handles {
            let manifest = store.manifest(&handle.id).unwrap().unwrap();
            assert_eq!(manifest.digest, handle.digest);
        }
    }
}
