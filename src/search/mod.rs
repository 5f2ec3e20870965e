//! Hyperparameter search
//!
//! Randomized search over a discrete parameter grid, scored by
//! cross-validated ROC-AUC.
//!
//! # Example
//!
//! ```no_run
//! use loanboost::gbdt::BoosterParams;
//! use loanboost::pipeline::PipelineParams;
//! use loanboost::search::{ParameterGrid, ParameterValue, RandomizedSearch};
//! use ndarray::{Array1, Array2};
//!
//! let grid = ParameterGrid::new()
//!     .with("classifier__max_depth", vec![ParameterValue::Int(3), ParameterValue::Int(5)])
//!     .with("classifier__learning_rate", vec![ParameterValue::Float(0.1)]);
//! let template = PipelineParams::new(BoosterParams::default());
//!
//! let x = Array2::<f64>::zeros((100, 2));
//! let y = Array1::from_iter((0..100).map(|i| (i % 2) as f64));
//!
//! let result = RandomizedSearch::new(100, 5)
//!     .with_seed(7)
//!     .fit(&template, &grid, x.view(), y.view())?;
//! println!("best ROC-AUC {:.3} with {:?}", result.best_score, result.best_params);
//! # Ok::<(), loanboost::Error>(())
//! ```

mod cv;
mod random;
mod space;


pub use cv::{Fold, StratifiedKFold};
pub use random::{RandomizedSearch, SearchResult, Trial, TrialStatus};
pub use space::{sample_without_replacement, ParamSet, ParameterGrid, ParameterValue};

use thiserror::Error;

/// Search errors
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Number of folds must be at least 2, got {0}")]
    TooFewFolds(usize),

    #[error("Cannot have {n_splits} folds with only {n_samples} samples")]
    TooManyFolds { n_splits: usize, n_samples: usize },

    #[error("No class has at least {n_splits} members (largest class has {largest_class})")]
    NotEnoughMembers {
        n_splits: usize,
        largest_class: usize,
    },

    #[error("Parameter grid is empty")]
    EmptyGrid,

    #[error("All {0} candidates failed to produce a cross-validated score")]
    AllCandidatesFailed(usize),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

impl From<SearchError> for crate::Error {
    fn from(err: SearchError) -> Self {
        crate::Error::FitError(err.to_string())
    }
}
