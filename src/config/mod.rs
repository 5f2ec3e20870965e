//! Declarative YAML configuration
//!
//! # Example
//!
//! ```yaml
//! features: [annual_inc, dti, int_rate]
//! target: [bad_loan]
//!
//! parameter_space:
//!   max_depth: [3, 5, 7]
//!   gamma: [0.0, 0.1, 0.3]
//!   min_child_weight: [1, 5]
//!   learning_rate: {start: 0.02, stop: 0.2, step: 0.04}
//!   colsample_bytree: [0.7, 1.0]
//!   num_leaves: [15, 31, 63]
//!
//! search:
//!   n_iter: 100
//!   cv_folds: 5
//! ```

mod cli;
mod load;
mod schema;
mod validate;


pub use cli::{parse_args, Cli};
pub use load::{load_config, parse_config, read_config};
pub use schema::{Candidates, ClassifierSpec, JobConfig, ParameterSpace, SearchParams};
pub use validate::{validate_config, validate_split_prop, ValidationError};
