//! Command-line parsing for the stock forecasting pipeline.
//!
//! Every command is one pipeline stage reading and writing the artifacts named
//! in the config file, so stages can be rerun independently.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{CONFIG_ENV, Config, PairPaths};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sf", version, about = "Stock D+2 return forecasting pipeline")]
pub struct Cli {
    /// Path to the TOML config (falls back to $SF_CONFIG, then config/config.toml).
    #[arg(short, long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download daily closes for every listed ticker into the raw dataset.
    Fetch,
    /// Write a synthetic raw dataset instead of fetching.
    Sample(SampleArgs),
    /// Validate and clean the raw dataset, then split it into train/valid/test.
    Clean,
    /// Convert splits to returns, add the D+2 label and keep the top-K correlated features.
    Features,
    /// Fit the production model on the engineered splits.
    Train,
    /// Serve predictions over HTTP.
    Serve,
    /// Run the validator on a persisted dataset and print its report.
    Check(CheckArgs),
    /// Print the dataset summary, recent days, ticker performance and the latest forecast.
    Report(ReportArgs),
    /// Export a persisted dataset to CSV.
    Export(ExportArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Number of trading days to generate.
    #[arg(long, default_value_t = 750)]
    pub days: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Tickers to generate (defaults to the ticker list, or a small basket with the target).
    #[arg(long, value_delimiter = ',')]
    pub tickers: Option<Vec<String>>,
}

#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// Days shown in the recent-days panel.
    #[arg(long, default_value_t = 5)]
    pub recent: usize,

    /// Window of the performance panel, in trading days.
    #[arg(long, default_value_t = 10)]
    pub days: usize,

    /// Tickers in the performance panel (defaults to every ticker).
    #[arg(long, value_delimiter = ',')]
    pub tickers: Option<Vec<String>>,
}

#[derive(Debug, Parser, Clone)]
pub struct CheckArgs {
    #[arg(value_enum)]
    pub dataset: Dataset,
}

#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    #[arg(value_enum)]
    pub dataset: Dataset,

    /// Output CSV path.
    #[arg(short, long)]
    pub out: PathBuf,
}

/// Persisted datasets addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dataset {
    Raw,
    Clean,
    Train,
    Valid,
    Test,
    TrainFeng,
    ValidFeng,
    TestFeng,
}

/// Where a dataset lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetLocation<'a> {
    Table(&'a PathBuf),
    Pair(&'a PairPaths),
}

impl Dataset {
    pub fn display_name(self) -> &'static str {
        match self {
            Dataset::Raw => "raw",
            Dataset::Clean => "clean",
            Dataset::Train => "train",
            Dataset::Valid => "valid",
            Dataset::Test => "test",
            Dataset::TrainFeng => "train-feng",
            Dataset::ValidFeng => "valid-feng",
            Dataset::TestFeng => "test-feng",
        }
    }

    pub fn location(self, config: &Config) -> DatasetLocation<'_> {
        match self {
            Dataset::Raw => DatasetLocation::Table(&config.raw_dataset_path),
            Dataset::Clean => DatasetLocation::Table(&config.clean_dataset_path),
            Dataset::Train => DatasetLocation::Pair(&config.train_set_path),
            Dataset::Valid => DatasetLocation::Pair(&config.valid_set_path),
            Dataset::Test => DatasetLocation::Pair(&config.test_set_path),
            Dataset::TrainFeng => DatasetLocation::Pair(&config.train_feng_set_path),
            Dataset::ValidFeng => DatasetLocation::Pair(&config.valid_feng_set_path),
            Dataset::TestFeng => DatasetLocation::Pair(&config.test_feng_set_path),
        }
    }

    /// Price datasets hold non-negative closes; engineered ones hold signed returns.
    pub fn holds_prices(self) -> bool {
        matches!(
            self,
            Dataset::Raw | Dataset::Clean | Dataset::Train | Dataset::Valid | Dataset::Test
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::config::tests::SAMPLE;

    #[test]
    fn parses_subcommands_with_global_config() {
        let cli = Cli::parse_from(["sf", "check", "train-feng", "--config", "c.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("c.toml")));
        match cli.command {
            Command::Check(args) => assert_eq!(args.dataset, Dataset::TrainFeng),
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::parse_from(["sf", "sample", "--tickers", "A.JK,B.JK", "--days", "10"]);
        match cli.command {
            Command::Sample(args) => {
                assert_eq!(args.days, 10);
                assert_eq!(args.tickers, Some(vec!["A.JK".to_string(), "B.JK".to_string()]));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn report_defaults_match_the_dashboards() {
        match Cli::parse_from(["sf", "report"]).command {
            Command::Report(args) => {
                assert_eq!((args.recent, args.days), (5, 10));
                assert_eq!(args.tickers, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
        match Cli::parse_from(["sf", "report", "--days", "20", "--tickers", "BMRI.JK"]).command {
            Command::Report(args) => {
                assert_eq!(args.days, 20);
                assert_eq!(args.tickers, Some(vec!["BMRI.JK".to_string()]));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn export_requires_out() {
        assert!(Cli::try_parse_from(["sf", "export", "clean"]).is_err());
    }

    #[test]
    fn datasets_map_to_config_paths() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(
            Dataset::Clean.location(&config),
            DatasetLocation::Table(&config.clean_dataset_path)
        );
        assert_eq!(
            Dataset::ValidFeng.location(&config),
            DatasetLocation::Pair(&config.valid_feng_set_path)
        );
        assert!(Dataset::Test.holds_prices());
        assert!(!Dataset::TestFeng.holds_prices());
    }
}
