use anyhow::Context;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use basic_cleaning::app::ports::{ArtifactStorePort, RunTrackerPort};
use basic_cleaning::constants::UPLOAD_JOB_TYPE;
use basic_cleaning::infra::{FsArtifactStore, NdjsonRunTracker};
use basic_cleaning::logging;
use basic_cleaning::types::{PublishRequest, RunStatus};
use basic_cleaning::Settings;

/// Register a local file as a new artifact version (e.g. the raw sample.csv)
#[derive(Parser)]
#[command(name = "log-artifact")]
#[command(about = "Register a local file in the artifact store")]
struct Cli {
    /// File to register
    #[arg(long)]
    file: PathBuf,

    /// Artifact name
    #[arg(long)]
    name: String,

    /// Artifact type tag (e.g. 'raw_data')
    #[arg(long = "type")]
    artifact_type: String,

    /// A short description of the artifact
    #[arg(long)]
    description: String,

    /// Settings file (defaults to ./cleaning.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let settings = Settings::load(cli.config.as_deref())?;
    let _logging = logging::init_logging(&settings.logging)?;

    let store = FsArtifactStore::new(&settings.store.root);
    let tracker = NdjsonRunTracker::new(&settings.tracker.run_log_dir);

    let run_id = tracker
        .start_run(
            UPLOAD_JOB_TYPE,
            json!({ "file": cli.file, "name": cli.name, "type": cli.artifact_type }),
        )
        .await?;

    let published = store
        .publish(PublishRequest {
            name: cli.name.clone(),
            artifact_type: cli.artifact_type.clone(),
            description: cli.description.clone(),
            path: cli.file.clone(),
            inputs: Vec::new(),
            run_id: Some(run_id),
        })
        .await;

    let handle = match published {
        Ok(handle) => handle,
        Err(e) => {
            tracker
                .finish_run(run_id, RunStatus::Failed, Some(e.to_string()))
                .await?;
            return Err(e).with_context(|| format!("registering {}", cli.file.display()));
        }
    };

    tracker.log_artifact(run_id, &handle).await?;
    tracker.finish_run(run_id, RunStatus::Succeeded, None).await?;
    info!(artifact = %handle.id, digest = %handle.digest, "Artifact registered");
    println!("✅ Registered {} ({} bytes)", handle.id, handle.size_bytes);
    Ok(())
}
