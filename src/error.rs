use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("Cannot resolve input artifact '{reference}': {reason}")]
    InputResolution { reference: String, reason: String },

    #[error("Input is not valid tabular data: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Column '{column}' line {line}: cannot parse '{value}' as a date")]
    ColumnParse {
        column: String,
        line: u64,
        value: String,
    },

    #[error("Failed to publish artifact '{name}': {reason}")]
    Publish { name: String, reason: String },

    #[error("Run tracker error: {0}")]
    Tracker(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CleaningError {
    /// Short machine-friendly label used for metrics and run records.
    pub fn kind(&self) -> &'static str {
        match self {
            CleaningError::InputResolution { .. } => "input_resolution",
            CleaningError::Parse(_) | CleaningError::Csv(_) | CleaningError::MissingColumn(_) => {
                "parse"
            }
            CleaningError::ColumnParse { .. } => "column_parse",
            CleaningError::Publish { .. } => "publish",
            CleaningError::Tracker(_) => "tracker",
            CleaningError::Config(_) | CleaningError::Toml(_) => "config",
            CleaningError::Json(_) | CleaningError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, CleaningError>;
