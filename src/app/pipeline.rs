//! Pipeline stages behind the CLI commands.
//!
//! Each stage reads its inputs from the artifact paths in the config, writes
//! its outputs back, and returns what it computed so the caller can print it.
//! Stages only talk to each other through persisted artifacts:
//!
//! fetch|sample -> raw -> clean -> train/valid/test -> features -> *_feng -> train -> model

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::config::Config;
use crate::data::{
    FetchRange, FetchReport, PriceSource, SampleSettings, fetch_price_table, generate_price_table,
    read_ticker_list,
};
use crate::domain::{Series, Table};
use crate::error::AppError;
use crate::io::store::{
    load_joined, load_json, load_pair, load_series, load_table, save_json, save_pair, save_series,
    save_table,
};
use crate::model::{LabeledSet, ModelArtifact, Regressor, train_model};
use crate::pipeline::clean::{CleanOutcome, clean_raw_dataset, prune_missing};
use crate::pipeline::features::{
    FeatureSelection, keep_correlated_features, split_features_labels, transform_to_stock_return,
};
use crate::pipeline::split::{Split, split_table};
use crate::report::{
    DatasetSummary, DayCrossSection, ForecastPanel, PerformancePanel, forecast_panel, recent_days,
    summarize_dataset, ticker_performance,
};

/// Tickers used by `sample` when no ticker list is available.
const SAMPLE_BASKET: [&str; 7] = ["BBCA", "BBRI", "BBNI", "TLKM", "ASII", "UNVR", "MYOR"];

/// Download every listed ticker and persist the raw table, with sparse rows
/// and incomplete columns already dropped. The report carries the saved table.
pub fn run_fetch<S: PriceSource + ?Sized>(
    config: &Config,
    source: &S,
    today: NaiveDate,
) -> Result<FetchReport, AppError> {
    let tickers = read_ticker_list(&config.raw_dataset_dir, &config.ticker_ext)?;
    info!(tickers = tickers.len(), "fetching daily prices");

    let range = FetchRange::from_config(config, today);
    let mut report = fetch_price_table(source, &tickers, &range)?;
    for failure in &report.failures {
        warn!(ticker = %failure.ticker, reason = %failure.reason, "ticker not fetched");
    }
    report.table = prune_missing(&report.table)?.table;
    save_table(&report.table, &config.raw_dataset_path)?;
    Ok(report)
}

/// Tickers for a synthetic dataset: explicit list, else the configured ticker
/// list, else a fixed basket. The target is always included.
pub fn sample_tickers(config: &Config, explicit: Option<Vec<String>>) -> Vec<String> {
    let mut tickers = explicit
        .or_else(|| read_ticker_list(&config.raw_dataset_dir, &config.ticker_ext).ok())
        .unwrap_or_else(|| {
            SAMPLE_BASKET
                .iter()
                .map(|code| format!("{code}{}", config.ticker_ext))
                .collect()
        });
    if !tickers.contains(&config.target) {
        tickers.push(config.target.clone());
    }
    tickers
}

/// Generate a synthetic raw table and persist it in place of a download.
pub fn run_sample(config: &Config, tickers: Vec<String>, days: usize, seed: u64) -> Result<Table, AppError> {
    let settings = SampleSettings {
        tickers,
        start: config.start_date,
        days,
        seed,
    };
    let table = generate_price_table(&settings)?;
    info!(rows = table.n_rows(), columns = table.n_cols(), seed, "generated sample prices");
    save_table(&table, &config.raw_dataset_path)?;
    Ok(table)
}

#[derive(Debug, Clone)]
pub struct CleanRun {
    pub outcome: CleanOutcome,
    pub split: Split,
}

/// Clean the raw table, split it chronologically, and persist every piece.
pub fn run_clean(config: &Config) -> Result<CleanRun, AppError> {
    let raw = load_table(&config.raw_dataset_path)?;
    let outcome = clean_raw_dataset(&raw, config)?;
    outcome.table.require_column(&config.target)?;
    save_table(&outcome.table, &config.clean_dataset_path)?;

    let split = split_table(&outcome.table, config.n_splits)?;
    for (part, paths) in [
        (&split.train, &config.train_set_path),
        (&split.valid, &config.valid_set_path),
        (&split.test, &config.test_set_path),
    ] {
        let (features, labels) = split_features_labels(part, &config.target)?;
        save_pair(&features, &labels, paths)?;
    }
    info!(
        train = split.train.n_rows(),
        valid = split.valid.n_rows(),
        test = split.test.n_rows(),
        "saved splits"
    );

    Ok(CleanRun { outcome, split })
}

/// Turn the price splits into returns, label them, and keep the top-K features.
pub fn run_features(config: &Config) -> Result<FeatureSelection, AppError> {
    let train = transform_to_stock_return(&load_joined(&config.train_set_path)?, &config.target)?;
    let valid = transform_to_stock_return(&load_joined(&config.valid_set_path)?, &config.target)?;
    let test = transform_to_stock_return(&load_joined(&config.test_set_path)?, &config.target)?;

    let selection = keep_correlated_features(&train, &valid, &test, &config.target, config.top_k)?;
    let label = config.target_return_column();
    for (part, paths) in [
        (&selection.train, &config.train_feng_set_path),
        (&selection.valid, &config.valid_feng_set_path),
        (&selection.test, &config.test_feng_set_path),
    ] {
        let (features, labels) = split_features_labels(part, &label)?;
        save_pair(&features, &labels, paths)?;
    }
    info!(features = selection.correlations.len().saturating_sub(1), "saved engineered splits");

    Ok(selection)
}

/// Fit the production model and persist it, plus test-set predictions when
/// `predict_dataset_path` is set.
pub fn run_train(config: &Config) -> Result<ModelArtifact, AppError> {
    let (x_train, y_train) = load_pair(&config.train_feng_set_path)?;
    let (x_valid, y_valid) = load_pair(&config.valid_feng_set_path)?;
    let (x_test, y_test) = load_pair(&config.test_feng_set_path)?;

    let artifact = train_model(
        &config.target,
        LabeledSet { features: &x_train, labels: &y_train },
        LabeledSet { features: &x_valid, labels: &y_valid },
        LabeledSet { features: &x_test, labels: &y_test },
    )?;
    save_json(&artifact, &config.production_model_path)?;
    info!(
        path = %config.production_model_path.display(),
        test_rmse = artifact.metrics.test.rmse,
        "saved production model"
    );

    if let Some(path) = &config.predict_dataset_path {
        let predictions = predict_complete_rows(&artifact, &x_test)?;
        save_series(&predictions, path)?;
    }

    Ok(artifact)
}

/// Predictions over `features`, `NaN` where a row has missing features.
fn predict_complete_rows(artifact: &ModelArtifact, features: &Table) -> Result<Series, AppError> {
    let model = artifact.model();
    let ordered = features.select_columns(model.feature_names())?;
    let values = (0..ordered.n_rows())
        .map(|r| {
            let row = ordered.row(r);
            if row.iter().all(|v| v.is_finite()) {
                model.predict_row(&row)
            } else {
                Ok(f64::NAN)
            }
        })
        .collect::<Result<Vec<f64>, AppError>>()?;
    Series::new(
        format!("Predicted {}", artifact.label),
        ordered.index().clone(),
        values,
    )
}

pub fn load_model(config: &Config) -> Result<ModelArtifact, AppError> {
    load_json(&config.production_model_path)
}

#[derive(Debug, Clone)]
pub struct ReportRun {
    pub summary: DatasetSummary,
    /// Newest first.
    pub recent: Vec<DayCrossSection>,
    pub performance: PerformancePanel,
    /// Present once training has written predictions.
    pub forecast: Option<ForecastPanel>,
}

/// Dashboards over the clean dataset, plus the forecast panel once
/// predictions exist. `tickers` limits the performance panel; empty means all.
pub fn run_report(
    config: &Config,
    recent: usize,
    days: usize,
    tickers: &[String],
) -> Result<ReportRun, AppError> {
    let clean = load_table(&config.clean_dataset_path)?;
    let summary = summarize_dataset(&clean);
    let recent = recent_days(&clean, &config.target, recent)?;
    let performance = ticker_performance(&clean, tickers, days)?;

    let forecast = match &config.predict_dataset_path {
        Some(path) if path.exists() => {
            let raw = load_table(&config.raw_dataset_path)?;
            let predictions = load_series(path)?;
            Some(forecast_panel(&raw, &predictions, &config.target)?)
        }
        _ => None,
    };

    Ok(ReportRun {
        summary,
        recent,
        performance,
        forecast,
    })
}

/// Today's date in local time.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::tests::SAMPLE;
    use crate::config::{PairPaths, parse_config};
    use crate::data::FetchRange;

    fn config_in(dir: &Path) -> Config {
        let mut c = parse_config(SAMPLE).unwrap();
        c.print_debug = false;
        c.patches.clear();
        c.raw_dataset_dir = dir.join("tickers.csv");
        c.raw_dataset_path = dir.join("raw.json");
        c.clean_dataset_path = dir.join("clean.json");
        c.production_model_path = dir.join("model.json");
        c.predict_dataset_path = Some(dir.join("predictions.json"));
        let pair = |name: &str| PairPaths {
            features: dir.join(format!("x_{name}.json")),
            labels: dir.join(format!("y_{name}.json")),
        };
        c.train_set_path = pair("train");
        c.valid_set_path = pair("valid");
        c.test_set_path = pair("test");
        c.train_feng_set_path = pair("train_feng");
        c.valid_feng_set_path = pair("valid_feng");
        c.test_feng_set_path = pair("test_feng");
        c.top_k = 4;
        c
    }

    #[test]
    fn sample_tickers_always_include_target() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let tickers = sample_tickers(&config, None);
        assert!(tickers.contains(&"BBCA.JK".to_string()));
        assert_eq!(tickers.last().map(String::as_str), Some("BMRI.JK"));

        let tickers = sample_tickers(&config, Some(vec!["BMRI.JK".to_string()]));
        assert_eq!(tickers, vec!["BMRI.JK".to_string()]);
    }

    #[test]
    fn stages_run_end_to_end_on_sample_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let tickers = sample_tickers(&config, None);
        let raw = run_sample(&config, tickers, 120, 7).unwrap();
        assert_eq!(raw.n_rows(), 120);

        let cleaned = run_clean(&config).unwrap();
        assert!(cleaned.outcome.report.is_clean());
        assert_eq!(
            cleaned.split.train.n_rows() + cleaned.split.valid.n_rows() + cleaned.split.test.n_rows(),
            cleaned.outcome.table.n_rows()
        );
        let (x_train, y_train) = load_pair(&config.train_set_path).unwrap();
        assert_eq!(y_train.name, "BMRI.JK");
        assert!(x_train.column("BMRI.JK").is_none());

        let selection = run_features(&config).unwrap();
        assert_eq!(selection.correlations.len(), 4);
        let label = config.target_return_column();
        assert_eq!(selection.columns().last(), Some(&label));
        let (x_feng, y_feng) = load_pair(&config.train_feng_set_path).unwrap();
        assert_eq!(y_feng.name, label);
        assert_eq!(x_feng.n_cols(), 3);

        let artifact = run_train(&config).unwrap();
        assert_eq!(artifact.feature_names, x_feng.columns().to_vec());
        assert_eq!(load_model(&config).unwrap(), artifact);

        let report = run_report(&config, 5, 10, &[]).unwrap();
        assert_eq!(report.summary.columns, cleaned.outcome.table.n_cols());
        assert_eq!(report.recent.len(), 5);
        assert_eq!(report.recent[0].date, report.summary.last_date);
        assert_eq!(report.recent[0].others.len(), cleaned.outcome.table.n_cols() - 1);
        assert_eq!(report.performance.days, 10);
        assert_eq!(report.performance.tickers.len(), cleaned.outcome.table.n_cols());
        let forecast = report.forecast.unwrap();
        assert_eq!(forecast.target, "BMRI.JK");
        assert!(forecast.predicted_return.is_finite());
        assert!(forecast.predicted_price > 0.0);
        assert_eq!(forecast.price_difference(), forecast.predicted_price - forecast.actual_price);

        let only_target = run_report(&config, 1, 3, &["BMRI.JK".to_string()]).unwrap();
        assert_eq!(only_target.performance.tickers.len(), 1);
        assert!(run_report(&config, 1, 3, &["NOPE.JK".to_string()]).is_err());
    }

    struct OneSeries;

    impl PriceSource for OneSeries {
        fn fetch_series(&self, ticker: &str, range: &FetchRange) -> Result<Vec<(NaiveDate, f64)>, AppError> {
            if ticker == "BAD.JK" {
                return Err(AppError::external("HTTP 404"));
            }
            Ok(vec![(range.start, 100.0)])
        }
    }

    #[test]
    fn fetch_persists_partial_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.raw_dataset_dir, "Kode\nBMRI\nBAD\n").unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let report = run_fetch(&config, &OneSeries, today).unwrap();
        assert!(report.is_partial());
        assert_eq!(report.failures[0].ticker, "BAD.JK");
        assert_eq!(load_table(&config.raw_dataset_path).unwrap(), report.table);
    }

    /// `GAP.JK` misses the second day.
    struct Gappy;

    impl PriceSource for Gappy {
        fn fetch_series(&self, ticker: &str, range: &FetchRange) -> Result<Vec<(NaiveDate, f64)>, AppError> {
            let day = |i| range.start + chrono::Duration::days(i);
            Ok(match ticker {
                "GAP.JK" => vec![(day(0), 10.0)],
                _ => vec![(day(0), 100.0), (day(1), 101.0)],
            })
        }
    }

    #[test]
    fn fetch_saves_raw_without_incomplete_columns() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.raw_dataset_dir, "Kode\nBMRI\nGAP\n").unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let report = run_fetch(&config, &Gappy, today).unwrap();
        let raw = load_table(&config.raw_dataset_path).unwrap();
        assert_eq!(raw, report.table);
        assert_eq!(raw.columns(), &["BMRI.JK".to_string()]);
        assert_eq!(raw.n_rows(), 2);
    }
}
