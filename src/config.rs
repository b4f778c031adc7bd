use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_ARTIFACT_ROOT, DEFAULT_CONFIG_FILE, DEFAULT_LOG_DIR, DEFAULT_LOG_LEVEL,
    DEFAULT_RUN_LOG_DIR, DEFAULT_STAGING_DIR,
};
use crate::error::{CleaningError, Result};
use crate::pipeline::processing::{DateParsePolicy, PriceRange};

/// Parameters of one cleaning run. All fields are required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub input_artifact: String,
    pub output_artifact: String,
    pub output_type: String,
    pub output_description: String,
    pub min_price: f64,
    pub max_price: f64,
}

impl RunConfig {
    pub fn price_range(&self) -> PriceRange {
        PriceRange::new(self.min_price, self.max_price)
    }
}

/// Environment-level settings: where artifacts, runs, staging files and logs live
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub tracker: TrackerSettings,
    pub staging: StagingSettings,
    pub logging: LoggingSettings,
    pub cleaning: CleaningSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub root: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ARTIFACT_ROOT),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    pub run_log_dir: PathBuf,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            run_log_dir: PathBuf::from(DEFAULT_RUN_LOG_DIR),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingSettings {
    pub dir: PathBuf,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_STAGING_DIR),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: PathBuf,
    pub level: String,
    /// Also write JSON lines to a daily-rotated file under `dir`
    pub json_file: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            level: DEFAULT_LOG_LEVEL.to_string(),
            json_file: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CleaningSettings {
    pub date_policy: DateParsePolicy,
}

impl Settings {
    /// Load settings from `path`, or from `cleaning.toml` when present, then apply
    /// `CLEANING_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CleaningError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("CLEANING_ARTIFACT_ROOT") {
            self.store.root = PathBuf::from(root);
        }
        if let Some(dir) = lookup("CLEANING_RUN_LOG_DIR") {
            self.tracker.run_log_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("CLEANING_STAGING_DIR") {
            self.staging.dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("CLEANING_LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        if let Some(policy) = lookup("CLEANING_DATE_POLICY") {
            self.cleaning.date_policy = policy.parse().map_err(CleaningError::Config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.store.root, PathBuf::from("artifacts"));
        assert_eq!(settings.tracker.run_log_dir, PathBuf::from("runs"));
        assert_eq!(settings.staging.dir, PathBuf::from("."));
        assert_eq!(settings.logging.level, "info");
        assert!(settings.logging.json_file);
        assert_eq!(settings.cleaning.date_policy, DateParsePolicy::Strict);
    }

    #[test]
    fn test_partial_toml() {
        let settings = Settings::from_toml_str(
            r#"
            [store]
            root = "/data/artifacts"

            [cleaning]
            date_policy = "coerce"
            "#,
        )
        .unwrap();
        assert_eq!(settings.store.root, PathBuf::from("/data/artifacts"));
        assert_eq!(settings.cleaning.date_policy, DateParsePolicy::Coerce);
        assert_eq!(settings.logging.dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_invalid_policy_in_toml() {
        let err = Settings::from_toml_str("[cleaning]\ndate_policy = \"lenient\"\n").unwrap_err();
        assert!(matches!(err, CleaningError::Toml(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CLEANING_ARTIFACT_ROOT", "/tmp/store"),
            ("CLEANING_DATE_POLICY", "coerce"),
        ]);
        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.store.root, PathBuf::from("/tmp/store"));
        assert_eq!(settings.cleaning.date_policy, DateParsePolicy::Coerce);

        let bad: HashMap<&str, &str> = HashMap::from([("CLEANING_DATE_POLICY", "maybe")]);
        let err = settings
            .apply_overrides(|key| bad.get(key).map(|v| v.to_string()))
            .unwrap_err();
        assert!(matches!(err, CleaningError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let err = Settings::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, CleaningError::Config(_)));
    }

    #[test]
    fn test_run_config_serializes_for_run_log() {
        let config = RunConfig {
            input_artifact: "sample.csv:latest".into(),
            output_artifact: "clean_sample.csv".into(),
            output_type: "clean_sample".into(),
            output_description: "Data with outliers and null values removed".into(),
            min_price: 10.0,
            max_price: 350.0,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["input_artifact"], "sample.csv:latest");
        assert_eq!(json["max_price"], 350.0);
        assert_eq!(config.price_range(), PriceRange::new(10.0, 350.0));
    }
}
