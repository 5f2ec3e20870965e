//! Loanboost CLI
//!
//! # Usage
//!
//! ```bash
//! loanboost -u data/loans.parquet
//! loanboost -u file:///data/loans -c config.yaml -s 0.8 --tracking-dir mlruns
//! ```

use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use loanboost::config::Cli;
use loanboost::storage::FileStorage;
use loanboost::{logging, TrainingJob};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_level()) {
        eprintln!("Warning: {e}");
    }

    match run_train(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_train(cli: &Cli) -> loanboost::Result<()> {
    let storage = Arc::new(Mutex::new(FileStorage::open(&cli.tracking_dir)?));
    let job = TrainingJob::new(storage, &cli.experiment)?;

    let outcome = job.run(&cli.loans_parquet_uri, &cli.config, cli.split_prop)?;

    println!(
        "Training: {}, test: {}",
        outcome.training_nrows, outcome.test_nrows
    );
    println!("Train ROC: {:.3}", outcome.best_score());
    println!("Test ROC: {:.3}", outcome.test_score);
    println!(
        "Run {} recorded under experiment {} (model: {})",
        outcome.run_id, outcome.experiment_id, outcome.artifact_path
    );
    Ok(())
}
