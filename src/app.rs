//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and loads the config
//! - sets up logging
//! - runs one pipeline stage
//! - prints the stage's report

use clap::Parser;
use tracing::info;

use crate::cli::{CheckArgs, Cli, Command, Dataset, DatasetLocation, ExportArgs, ReportArgs, SampleArgs};
use crate::config::{Config, load_config, resolve_config_path};
use crate::domain::Table;
use crate::error::AppError;
use crate::io::store::{load_joined, load_table};
use crate::pipeline::validate::{ValidationRules, check_data};
use crate::report::{
    format_clean_outcome, format_dataset_summary, format_feature_selection, format_fetch_report,
    format_forecast_panel, format_performance, format_recent_days, format_training,
};

pub mod pipeline;

/// Entry point for the `sf` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let path = resolve_config_path(cli.config.as_deref());
    let config = load_config(&path)?;
    crate::logging::init(config.print_debug);
    info!(config = %path.display(), "loaded config");

    match cli.command {
        Command::Fetch => handle_fetch(&config),
        Command::Sample(args) => handle_sample(&config, args),
        Command::Clean => handle_clean(&config),
        Command::Features => handle_features(&config),
        Command::Train => handle_train(&config),
        Command::Serve => handle_serve(config),
        Command::Check(args) => handle_check(&config, args),
        Command::Report(args) => handle_report(&config, args),
        Command::Export(args) => handle_export(&config, args),
    }
}

fn handle_fetch(config: &Config) -> Result<(), AppError> {
    let client = crate::data::YahooClient::from_config(config)?;
    let report = pipeline::run_fetch(config, &client, pipeline::today())?;
    print!("{}", format_fetch_report(&report));
    Ok(())
}

fn handle_sample(config: &Config, args: SampleArgs) -> Result<(), AppError> {
    let tickers = pipeline::sample_tickers(config, args.tickers);
    let table = pipeline::run_sample(config, tickers, args.days, args.seed)?;
    println!(
        "Sample dataset: {} rows x {} columns -> {}",
        table.n_rows(),
        table.n_cols(),
        config.raw_dataset_path.display()
    );
    Ok(())
}

fn handle_clean(config: &Config) -> Result<(), AppError> {
    let run = pipeline::run_clean(config)?;
    print!("{}", format_clean_outcome(&run.outcome));
    println!(
        "Splits: train={} valid={} test={}",
        run.split.train.n_rows(),
        run.split.valid.n_rows(),
        run.split.test.n_rows()
    );
    Ok(())
}

fn handle_features(config: &Config) -> Result<(), AppError> {
    let selection = pipeline::run_features(config)?;
    print!("{}", format_feature_selection(&selection));
    Ok(())
}

fn handle_train(config: &Config) -> Result<(), AppError> {
    let artifact = pipeline::run_train(config)?;
    print!("{}", format_training(&artifact));
    Ok(())
}

fn handle_serve(config: Config) -> Result<(), AppError> {
    let artifact = pipeline::load_model(&config)?;
    crate::serve::run(config, artifact)
}

fn handle_check(config: &Config, args: CheckArgs) -> Result<(), AppError> {
    let table = load_dataset(config, args.dataset)?;
    let rules = ValidationRules {
        index: config.datetime_index,
        non_negative: args.dataset.holds_prices(),
    };
    let report = check_data(&table, rules, true);
    if let Some(err) = report.structural() {
        return Err(AppError::structural(err.to_string()));
    }
    if report.is_clean() {
        println!(
            "{}: {} columns checked, no errors.",
            args.dataset.display_name(),
            report.n_columns
        );
    }
    Ok(())
}

fn handle_report(config: &Config, args: ReportArgs) -> Result<(), AppError> {
    let tickers = args.tickers.unwrap_or_default();
    let run = pipeline::run_report(config, args.recent, args.days, &tickers)?;
    print!("{}", format_dataset_summary("clean dataset", &run.summary));
    println!();
    print!("{}", format_recent_days(&config.target, &run.recent));
    println!();
    print!("{}", format_performance(&run.performance));
    match &run.forecast {
        Some(panel) => {
            println!();
            print!("{}", format_forecast_panel(panel));
        }
        None => println!("\nNo predictions yet; run `sf train` with `predict_dataset_path` set."),
    }
    Ok(())
}

fn handle_export(config: &Config, args: ExportArgs) -> Result<(), AppError> {
    let table = load_dataset(config, args.dataset)?;
    crate::io::export::write_table_csv(&args.out, &table)?;
    println!(
        "Exported {} ({} rows) -> {}",
        args.dataset.display_name(),
        table.n_rows(),
        args.out.display()
    );
    Ok(())
}

/// Load a dataset; pairs come back with the labels joined as the last column.
fn load_dataset(config: &Config, dataset: Dataset) -> Result<Table, AppError> {
    match dataset.location(config) {
        DatasetLocation::Table(path) => load_table(path),
        DatasetLocation::Pair(paths) => load_joined(paths),
    }
}
