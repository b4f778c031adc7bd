use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use basic_cleaning::infra::{FsArtifactStore, NdjsonRunTracker};
use basic_cleaning::logging;
use basic_cleaning::{BasicCleaningUseCase, CleanOptions, RunConfig, Settings};

#[derive(Parser)]
#[command(name = "basic_cleaning")]
#[command(about = "A very basic data cleaning")]
#[command(version)]
struct Cli {
    /// The name of the input artifact
    #[arg(long = "input_artifact")]
    input_artifact: String,

    /// The name of the output artifact
    #[arg(long = "output_artifact")]
    output_artifact: String,

    /// The type of the output artifact (e.g. 'data')
    #[arg(long = "output_type")]
    output_type: String,

    /// A short description of the output artifact
    #[arg(long = "output_description")]
    output_description: String,

    /// Filter out listings with price below this value
    #[arg(long = "min_price", allow_negative_numbers = true)]
    min_price: f64,

    /// Filter out listings with price above this value
    #[arg(long = "max_price", allow_negative_numbers = true)]
    max_price: f64,

    /// Settings file (defaults to ./cleaning.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            input_artifact: self.input_artifact.clone(),
            output_artifact: self.output_artifact.clone(),
            output_type: self.output_type.clone(),
            output_description: self.output_description.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load environment variables
    dotenv::dotenv().ok();

    let settings = Settings::load(cli.config.as_deref())?;
    let _logging = logging::init_logging(&settings.logging)?;

    let store = Arc::new(FsArtifactStore::new(&settings.store.root));
    let tracker = Arc::new(NdjsonRunTracker::new(&settings.tracker.run_log_dir));
    let use_case = BasicCleaningUseCase::new(store, tracker, CleanOptions::from(&settings));

    match use_case.clean(&cli.run_config()).await {
        Ok(outcome) => {
            info!(run_id = %outcome.run_id, "Cleaning run finished");
            println!("✅ Published {} from {}", outcome.output.id, outcome.input);
            println!("   Rows read: {}", outcome.rows_read);
            println!("   Rows written: {}", outcome.rows_written);
            if outcome.dates_coerced > 0 {
                println!("   Dates coerced to missing: {}", outcome.dates_coerced);
            }
            Ok(())
        }
        Err(e) => {
            error!(kind = e.kind(), "Cleaning run failed: {}", e);
            Err(e.into())
        }
    }
}
