use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use crate::app::ports::{ArtifactStorePort, RunTrackerPort};
use crate::config::{RunConfig, Settings};
use crate::constants::{CLEANING_JOB_TYPE, LAST_REVIEW_COLUMN, PRICE_COLUMN, STAGED_FILE_NAME};
use crate::error::{CleaningError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::{filter_by_price, normalize_dates, DateParsePolicy};
use crate::pipeline::table::Table;
use crate::types::{ArtifactHandle, ArtifactId, ArtifactRef, PublishRequest, RunId, RunStatus};

/// Stage options that come from settings rather than from the run itself
#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub date_policy: DateParsePolicy,
    pub staging_dir: PathBuf,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            date_policy: DateParsePolicy::Strict,
            staging_dir: PathBuf::from("."),
        }
    }
}

impl From<&Settings> for CleanOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            date_policy: settings.cleaning.date_policy,
            staging_dir: settings.staging.dir.clone(),
        }
    }
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub run_id: RunId,
    pub input: ArtifactId,
    pub output: ArtifactHandle,
    pub rows_read: usize,
    pub rows_written: usize,
    pub dates_coerced: usize,
    pub staged_path: PathBuf,
}

/// Use case for cleaning one raw listings artifact into a derived artifact
pub struct BasicCleaningUseCase {
    store: Arc<dyn ArtifactStorePort>,
    tracker: Arc<dyn RunTrackerPort>,
    options: CleanOptions,
}

impl BasicCleaningUseCase {
    pub fn new(
        store: Arc<dyn ArtifactStorePort>,
        tracker: Arc<dyn RunTrackerPort>,
        options: CleanOptions,
    ) -> Self {
        Self {
            store,
            tracker,
            options,
        }
    }

    /// Run the stage end to end. Nothing is published unless every step
    /// before publication succeeded.
    pub async fn clean(&self, config: &RunConfig) -> Result<CleaningOutcome> {
        let started = Instant::now();
        let run_id = self
            .tracker
            .start_run(CLEANING_JOB_TYPE, serde_json::to_value(config)?)
            .await?;

        let span = info_span!("basic_cleaning", run_id = %run_id);
        let result = self.run_stages(run_id, config).instrument(span).await;
        metrics::cleaning::duration(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                metrics::cleaning::run_succeeded();
                if let Err(e) = self.tracker.finish_run(run_id, RunStatus::Succeeded, None).await {
                    warn!(%run_id, error = %e, "Artifact {} published but run could not be closed", outcome.output.id);
                }
            }
            Err(err) => {
                metrics::cleaning::run_failed(err.kind());
                if let Err(e) = self
                    .tracker
                    .finish_run(run_id, RunStatus::Failed, Some(err.to_string()))
                    .await
                {
                    warn!(%run_id, error = %e, "Failed to record run failure");
                }
            }
        }
        result
    }

    async fn run_stages(&self, run_id: RunId, config: &RunConfig) -> Result<CleaningOutcome> {
        // Resolve & load
        let reference: ArtifactRef =
            config
                .input_artifact
                .parse()
                .map_err(|reason| CleaningError::InputResolution {
                    reference: config.input_artifact.clone(),
                    reason,
                })?;
        let input = self.store.resolve(&reference).await?;
        self.tracker.use_artifact(run_id, &input.id).await?;
        info!(artifact = %input.id, path = %input.path.display(), "Resolved input artifact");

        let table = Table::from_csv_path(&input.path)?;
        table.require_column(PRICE_COLUMN)?;
        table.require_column(LAST_REVIEW_COLUMN)?;
        let rows_read = table.num_rows();
        metrics::cleaning::rows_read(rows_read);
        info!(rows = rows_read, columns = table.columns().len(), "Read input artifact CSV file and loaded data into a table");

        // Drop outliers
        let range = config.price_range();
        if range.is_empty() {
            warn!(min_price = range.min, max_price = range.max, "Price range is empty, every row will be dropped");
        }
        let table = filter_by_price(table, PRICE_COLUMN, range)?;
        let rows_kept = table.num_rows();
        metrics::cleaning::rows_dropped(rows_read - rows_kept);
        info!(kept = rows_kept, dropped = rows_read - rows_kept, "Dropped outliers based on specified min and max price");

        // Convert last_review to a date/time column
        let normalized = normalize_dates(table, LAST_REVIEW_COLUMN, self.options.date_policy)?;
        if normalized.coerced > 0 {
            metrics::cleaning::dates_coerced(normalized.coerced);
            warn!(coerced = normalized.coerced, "Coerced unparseable last_review values to missing");
        }
        info!("Converted last_review column to datetime format");
        let table = normalized.table;

        // Stage locally
        fs::create_dir_all(&self.options.staging_dir)?;
        let staged_path = self.options.staging_dir.join(STAGED_FILE_NAME);
        let bytes = table.write_csv_path(&staged_path)?;
        info!(path = %staged_path.display(), bytes, "Saved cleaned dataset to {}", STAGED_FILE_NAME);

        // Publish with provenance
        let output = self
            .store
            .publish(PublishRequest {
                name: config.output_artifact.clone(),
                artifact_type: config.output_type.clone(),
                description: config.output_description.clone(),
                path: staged_path.clone(),
                inputs: vec![input.id.clone()],
                run_id: Some(run_id),
            })
            .await?;
        if let Err(e) = self.tracker.log_artifact(run_id, &output).await {
            warn!(%run_id, error = %e, "Artifact {} published but not recorded on the run", output.id);
        }
        metrics::cleaning::rows_written(table.num_rows());
        info!(artifact = %output.id, digest = %output.digest, "Uploaded {} as artifact {}", STAGED_FILE_NAME, config.output_artifact);

        Ok(CleaningOutcome {
            run_id,
            input: input.id,
            output,
            rows_read,
            rows_written: table.num_rows(),
            dates_coerced: normalized.coerced,
            staged_path,
        })
    }
}
