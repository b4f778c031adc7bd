/// Column and naming constants shared across the cleaning stage

// Columns the stage operates on
pub const PRICE_COLUMN: &str = "price";
pub const LAST_REVIEW_COLUMN: &str = "last_review";

// Run job types recorded in the run log
pub const CLEANING_JOB_TYPE: &str = "basic_cleaning";
pub const UPLOAD_JOB_TYPE: &str = "upload";

/// File name of the staged cleaned table, also the file name inside the output artifact
pub const STAGED_FILE_NAME: &str = "clean_sample.csv";

// Default locations (relative to the working directory)
pub const DEFAULT_CONFIG_FILE: &str = "cleaning.toml";
pub const DEFAULT_ARTIFACT_ROOT: &str = "artifacts";
pub const DEFAULT_RUN_LOG_DIR: &str = "runs";
pub const DEFAULT_STAGING_DIR: &str = ".";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Alias resolving to the most recent version of an artifact
pub const LATEST_ALIAS: &str = "latest";
