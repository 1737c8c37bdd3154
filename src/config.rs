//! Process configuration.
//!
//! The configuration is a TOML document loaded once at startup and passed by
//! reference into every stage. Nothing reads it through a global.
//!
//! Dataset locations are either a single file (tables) or a named
//! `{ features, labels }` pair for splits that keep the target apart.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::IndexKind;
use crate::error::AppError;

/// Default location when neither `--config` nor `SF_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable naming the config file (also read from `.env`).
pub const CONFIG_ENV: &str = "SF_CONFIG";

/// Feature/label file pair for one split.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PairPaths {
    pub features: PathBuf,
    pub labels: PathBuf,
}

/// A single known-bad data point and the value that replaces it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Patch {
    pub ticker: String,
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// CSV listing the tickers to download (`Kode` column).
    pub raw_dataset_dir: PathBuf,
    /// Market suffix appended to every code, e.g. `.JK`.
    #[serde(default)]
    pub ticker_ext: String,
    pub start_date: NaiveDate,
    /// Last date to request; today when absent.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub interval_date: String,
    /// Index kind the validator asserts on price tables.
    pub datetime_index: IndexKind,
    /// Ticker whose D+2 return is predicted.
    pub target: String,

    pub raw_dataset_path: PathBuf,
    pub clean_dataset_path: PathBuf,
    pub train_set_path: PairPaths,
    pub valid_set_path: PairPaths,
    pub test_set_path: PairPaths,
    pub train_feng_set_path: PairPaths,
    pub valid_feng_set_path: PairPaths,
    pub test_feng_set_path: PairPaths,
    pub production_model_path: PathBuf,
    #[serde(default)]
    pub predict_dataset_path: Option<PathBuf>,

    #[serde(default)]
    pub print_debug: bool,

    #[serde(default = "default_n_splits")]
    pub n_splits: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default)]
    pub patches: Vec<Patch>,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_n_splits() -> usize {
    3
}

fn default_top_k() -> usize {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Name of the synthetic label column, `"<target> Return D+2"`.
    pub fn target_return_column(&self) -> String {
        target_return_column(&self.target)
    }

    fn check(&self) -> Result<(), AppError> {
        if self.target.trim().is_empty() {
            return Err(AppError::input("Config: `target` must not be empty."));
        }
        if self.n_splits < 2 {
            return Err(AppError::input(format!(
                "Config: `n_splits` must be >= 2 (got {}).",
                self.n_splits
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::input("Config: `top_k` must be > 0."));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(AppError::input("Config: `fetch_timeout_secs` must be > 0."));
        }
        if let Some(end) = self.end_date {
            if end <= self.start_date {
                return Err(AppError::input(format!(
                    "Config: `end_date` {end} is not after `start_date` {}.",
                    self.start_date
                )));
            }
        }
        Ok(())
    }
}

pub fn target_return_column(target: &str) -> String {
    format!("{target} Return D+2")
}

/// Parse and check a configuration document.
pub fn parse_config(text: &str) -> Result<Config, AppError> {
    let config: Config =
        toml::from_str(text).map_err(|e| AppError::input(format!("Invalid config: {e}")))?;
    config.check()?;
    Ok(config)
}

/// Load the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Config, AppError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::input(format!(
            "Parameters file not found in path '{}': {e}",
            path.display()
        ))
    })?;
    parse_config(&text)
}

/// Resolve the config path: explicit flag, then `SF_CONFIG`, then the default.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    dotenvy::dotenv().ok();
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"
raw_dataset_dir = "data/raw/tickers.csv"
ticker_ext = ".JK"
start_date = "2013-01-01"
interval_date = "1d"
datetime_index = "datetime"
target = "BMRI.JK"
raw_dataset_path = "data/processed/raw.json"
clean_dataset_path = "data/processed/clean.json"
production_model_path = "models/production.json"
print_debug = true

train_set_path = { features = "data/processed/x_train.json", labels = "data/processed/y_train.json" }
valid_set_path = { features = "data/processed/x_valid.json", labels = "data/processed/y_valid.json" }
test_set_path = { features = "data/processed/x_test.json", labels = "data/processed/y_test.json" }
train_feng_set_path = { features = "data/processed/x_train_feng.json", labels = "data/processed/y_train_feng.json" }
valid_feng_set_path = { features = "data/processed/x_valid_feng.json", labels = "data/processed/y_valid_feng.json" }
test_feng_set_path = { features = "data/processed/x_test_feng.json", labels = "data/processed/y_test_feng.json" }

[[patches]]
ticker = "BMRI.JK"
date = "2023-03-30"
value = 5112.0
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.target, "BMRI.JK");
        assert_eq!(config.datetime_index, IndexKind::Datetime);
        assert_eq!(config.n_splits, 3);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.train_set_path.labels,
            PathBuf::from("data/processed/y_train.json")
        );
        assert_eq!(config.patches.len(), 1);
        assert_eq!(config.target_return_column(), "BMRI.JK Return D+2");
    }

    #[test]
    fn rejects_single_split() {
        let text = format!("n_splits = 1\n{SAMPLE}");
        let err = parse_config(&text).unwrap_err();
        assert!(err.message().contains("n_splits"));
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = load_config(Path::new("does/not/exist.toml")).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn explicit_path_wins() {
        let p = resolve_config_path(Some(Path::new("x.toml")));
        assert_eq!(p, PathBuf::from("x.toml"));
    }
}
