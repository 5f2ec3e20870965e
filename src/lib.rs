//! # Loanboost: Cross-Validated Boosted Trees for Loan Data
//!
//! Loanboost trains a binary loan classifier: a mean imputer followed by a
//! histogram gradient boosted tree model, tuned by randomized search with
//! stratified k-fold cross-validation on ROC-AUC, with every run recorded
//! in an experiment store.
//!
//! ## Architecture
//!
//! - **config**: YAML job configuration and CLI arguments
//! - **data**: Parquet datasets, seeded splits, in-memory tables
//! - **pipeline**: Imputation + classifier pipeline
//! - **gbdt**: Gradient boosted decision trees (logistic loss)
//! - **metrics**: ROC-AUC
//! - **search**: Parameter grids, stratified folds, randomized search
//! - **storage**: Experiment storage backends
//! - **run**: Scoped tracker runs
//! - **job**: The end-to-end training job

pub mod config;
pub mod data;
pub mod gbdt;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod run;
pub mod search;
pub mod storage;

pub mod error;

// Re-export commonly used types
pub use error::{Error, Result};
pub use job::{TrainingJob, TrainingOutcome};
