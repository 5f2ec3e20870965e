//! Gradient-boosted decision trees
//!
//! A histogram-based, leaf-wise booster for binary classification with
//! logistic loss. Features are quantized once per fit; each round grows a
//! tree on the gradients of the current raw scores.

mod binning;
mod classifier;
mod gain;
mod params;
mod tree;

pub use binning::BinMapper;
pub use classifier::GbdtClassifier;
pub use gain::GainParams;
pub use params::BoosterParams;
pub use tree::{Node, Tree};

use thiserror::Error;

/// Training and prediction errors
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Cannot fit on an empty dataset")]
    EmptyDataset,

    #[error("Feature matrix has {rows} rows but {labels} labels were given")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("Target has a single class; binary classification needs two")]
    SingleClass,

    #[error("Target has {0} classes; only binary targets are supported")]
    TooManyClasses(usize),

    #[error("Target contains missing or non-finite labels")]
    InvalidLabel,

    #[error("Unknown classifier parameter: {0}")]
    UnknownParam(String),

    #[error("Parameter {name} expects {expected} values, got {got}")]
    InvalidParamType {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Invalid classifier parameter: {0}")]
    InvalidParam(String),

    #[error("Model expects {expected} features, got {got}")]
    FeatureMismatch { expected: usize, got: usize },
}

/// Logistic function
#[inline]
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < f64::EPSILON);
        assert!(sigmoid(40.0) > 0.999_999);
        assert!(sigmoid(-40.0) < 1e-6);
        assert!(sigmoid(-1000.0) >= 0.0);
    }
}
