use async_trait::async_trait;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::app::ports::RunTrackerPort;
use crate::error::{CleaningError, Result};
use crate::types::{ArtifactHandle, ArtifactId, RunEvent, RunId, RunRecord, RunStatus};

const RUN_LOG_FILE: &str = "runs.ndjson";

/// Run tracker appending one JSON line per event to `<dir>/runs.ndjson`
pub struct NdjsonRunTracker {
    dir: PathBuf,
}

impl NdjsonRunTracker {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(RUN_LOG_FILE)
    }

    fn append(&self, run_id: RunId, event: RunEvent) -> Result<()> {
        let record = RunRecord {
            run_id,
            at: Utc::now(),
            event,
        };
        append(&self.log_path(), &record)
            .map_err(|e| CleaningError::Tracker(format!("run log append failed: {}", e)))
    }

    /// Every record in the log, oldest first
    pub fn read_records(&self) -> Result<Vec<RunRecord>> {
        let path = self.log_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    pub fn events_for(&self, run: RunId) -> Result<Vec<RunEvent>> {
        Ok(self
            .read_records()?
            .into_iter()
            .filter(|r| r.run_id == run)
            .map(|r| r.event)
            .collect())
    }
}

fn append(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

#[async_trait]
impl RunTrackerPort for NdjsonRunTracker {
    async fn start_run(&self, job_type: &str, config: serde_json::Value) -> Result<RunId> {
        let run_id = RunId::new();
        self.append(
            run_id,
            RunEvent::Started {
                job_type: job_type.to_string(),
                config,
            },
        )?;
        Ok(run_id)
    }

    async fn use_artifact(&self, run: RunId, artifact: &ArtifactId) -> Result<()> {
        self.append(
            run,
            RunEvent::Used {
                artifact: artifact.clone(),
            },
        )
    }

    async fn log_artifact(&self, run: RunId, artifact: &ArtifactHandle) -> Result<()> {
        self.append(
            run,
            RunEvent::Produced {
                artifact: artifact.id.clone(),
                digest: artifact.digest.clone(),
            },
        )
    }

    async fn finish_run(&self, run: RunId, status: RunStatus, error: Option<String>) -> Result<()> {
        self.append(run, RunEvent::Finished { status, error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_events_are_appended_per_run() {
        let dir = tempdir().unwrap();
        let tracker = NdjsonRunTracker::new(dir.path().join("runs"));

        let first = tracker.start_run("basic_cleaning", json!({"min_price": 10.0})).await.unwrap();
        let second = tracker.start_run("upload", json!({})).await.unwrap();
        tracker
            .use_artifact(first, &ArtifactId::new("sample.csv", 0))
            .await
            .unwrap();
        tracker
            .finish_run(second, RunStatus::Failed, Some("boom".to_string()))
            .await
            .unwrap();
        tracker.finish_run(first, RunStatus::Succeeded, None).await.unwrap();

        assert_eq!(tracker.read_records().unwrap().len(), 5);

        let events = tracker.events_for(first).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            RunEvent::Started {
                job_type: "basic_cleaning".to_string(),
                config: json!({"min_price": 10.0}),
            }
        );
        assert_eq!(
            events[1],
            RunEvent::Used {
                artifact: ArtifactId::new("sample.csv", 0)
            }
        );

        let events = tracker.events_for(second).unwrap();
        assert_eq!(
            events[1],
            RunEvent::Finished {
                status: RunStatus::Failed,
                error: Some("boom".to_string())
            }
        );
    }

    #[test]
    fn test_missing_log_reads_empty() {
        let dir = tempdir().unwrap();
        let tracker = NdjsonRunTracker::new(dir.path());
        assert!(tracker.read_records().unwrap().is_empty());
    }
}
