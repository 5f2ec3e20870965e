//! CLI argument parsing
//!
//! # Usage
//!
//! ```bash
//! loanboost -u data/loans.parquet
//! loanboost -u file:///data/loans_parquet -c config.yaml -s 0.75
//! loanboost -u data/loans.parquet --tracking-dir ./mlruns -e loan-defaults
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::logging::LogLevel;

/// Cross-validated gradient boosted tree training for loan data
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "loanboost")]
#[command(version)]
#[command(
    about = "Train a boosted-tree loan classifier with randomized cross-validated search and log the run"
)]
pub struct Cli {
    /// Location of the loans dataset (Parquet file or directory, optionally file://)
    #[arg(short = 'u', long = "loans_parquet_uri", value_name = "URI")]
    pub loans_parquet_uri: String,

    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Fraction of rows assigned to the training partition
    #[arg(short, long = "split_prop", default_value_t = 0.8)]
    pub split_prop: f64,

    /// Directory holding experiment tracking data
    #[arg(long, default_value = "mlruns")]
    pub tracking_dir: PathBuf,

    /// Experiment name the run is recorded under
    #[arg(short, long, default_value = "Default")]
    pub experiment: String,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Log level selected by the verbose/quiet flags
    pub fn log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Quiet
        } else if self.verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }
}

/// Parse command-line arguments (useful for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = parse_args(["loanboost", "-u", "loans.parquet"]).unwrap();
        assert_eq!(cli.loans_parquet_uri, "loans.parquet");
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!((cli.split_prop - 0.8).abs() < f64::EPSILON);
        assert_eq!(cli.tracking_dir, PathBuf::from("mlruns"));
        assert_eq!(cli.experiment, "Default");
        assert_eq!(cli.log_level(), LogLevel::Normal);
    }

    #[test]
    fn test_parse_long_flags() {
        let cli = parse_args([
            "loanboost",
            "--loans_parquet_uri",
            "file:///data/loans",
            "--config",
            "conf/lgbm.yaml",
            "--split_prop",
            "0.7",
        ])
        .unwrap();
        assert_eq!(cli.loans_parquet_uri, "file:///data/loans");
        assert_eq!(cli.config, PathBuf::from("conf/lgbm.yaml"));
        assert!((cli.split_prop - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_short_flags() {
        let cli = parse_args([
            "loanboost", "-u", "loans", "-c", "c.yaml", "-s", "0.5", "-e", "exp", "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("c.yaml"));
        assert!((cli.split_prop - 0.5).abs() < f64::EPSILON);
        assert_eq!(cli.experiment, "exp");
        assert_eq!(cli.log_level(), LogLevel::Verbose);
    }

    #[test]
    fn test_uri_is_required() {
        assert!(parse_args(["loanboost"]).is_err());
    }

    #[test]
    fn test_split_prop_must_be_numeric() {
        assert!(parse_args(["loanboost", "-u", "x", "-s", "most"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(parse_args(["loanboost", "-u", "x", "-v", "-q"]).is_err());

        let cli = parse_args(["loanboost", "-u", "x", "-q"]).unwrap();
        assert_eq!(cli.log_level(), LogLevel::Quiet);
    }
}
