use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::LATEST_ALIAS;

/// Which version of a named artifact a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Exact(u32),
}

/// A reference to a stored artifact: `name`, `name:latest` or `name:vN`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub name: String,
    pub version: VersionSelector,
}

impl FromStr for ArtifactRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, version) = match s.rsplit_once(':') {
            Some((name, LATEST_ALIAS)) => (name, VersionSelector::Latest),
            Some((name, tag)) => {
                let n = tag
                    .strip_prefix('v')
                    .and_then(|n| n.parse::<u32>().ok())
                    .ok_or_else(|| format!("invalid version tag '{}'", tag))?;
                (name, VersionSelector::Exact(n))
            }
            None => (s, VersionSelector::Latest),
        };
        validate_artifact_name(name)?;
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            VersionSelector::Latest => write!(f, "{}:{}", self.name, LATEST_ALIAS),
            VersionSelector::Exact(n) => write!(f, "{}:v{}", self.name, n),
        }
    }
}

/// Artifact names are used as directory names by the filesystem store
pub fn validate_artifact_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("artifact name is empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("artifact name '{}' is reserved", name));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(format!("artifact name '{}' contains invalid character '{}'", name, c));
    }
    Ok(())
}

/// Fully resolved identity of one artifact version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId {
    pub name: String,
    pub version: u32,
}

impl ArtifactId {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:v{}", self.name, self.version)
    }
}

/// An input artifact materialized to a local file
#[derive(Debug, Clone)]
pub struct ResolvedArtifact {
    pub id: ArtifactId,
    pub digest: String,
    pub path: PathBuf,
}

/// Everything needed to register a new artifact version
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub name: String,
    pub artifact_type: String,
    pub description: String,
    pub path: PathBuf,
    /// Provenance: the artifact versions consumed to produce this one
    pub inputs: Vec<ArtifactId>,
    pub run_id: Option<RunId>,
}

/// Handle returned once an artifact version is registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub id: ArtifactId,
    pub artifact_type: String,
    pub digest: String,
    pub size_bytes: u64,
}

/// Stored metadata for one artifact version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    pub version: u32,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub description: String,
    pub file_name: String,
    pub digest: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub inputs: Vec<ArtifactId>,
    pub run_id: Option<RunId>,
}

impl ArtifactManifest {
    pub fn id(&self) -> ArtifactId {
        ArtifactId::new(self.name.clone(), self.version)
    }

    pub fn handle(&self) -> ArtifactHandle {
        ArtifactHandle {
            id: self.id(),
            artifact_type: self.artifact_type.clone(),
            digest: self.digest.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

/// Identifier of one stage execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// One line of the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        job_type: String,
        config: serde_json::Value,
    },
    Used {
        artifact: ArtifactId,
    },
    Produced {
        artifact: ArtifactId,
        digest: String,
    },
    Finished {
        status: RunStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// A run log line: the event plus which run it belongs to and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RunEvent,
}
