//! Booster hyperparameters

use serde::{Deserialize, Serialize};

use super::gain::GainParams;
use super::TrainError;
use crate::search::ParameterValue;

/// Hyperparameters of the gradient-boosted classifier
///
/// Names follow the LightGBM scikit-learn interface so that search grids
/// written for it carry over (`min_split_gain` is what XGBoost calls `gamma`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    /// Boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to every leaf value
    pub learning_rate: f64,
    /// Maximum tree depth, `-1` for unlimited
    pub max_depth: i64,
    /// Maximum leaves per tree
    pub num_leaves: usize,
    /// Minimum gain required to split a leaf
    pub min_split_gain: f64,
    /// Minimum hessian sum per leaf
    pub min_child_weight: f64,
    /// Minimum rows per leaf
    pub min_child_samples: usize,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Fraction of features sampled for each tree
    pub colsample_bytree: f64,
    /// Maximum histogram bins per feature
    pub max_bin: usize,
    /// Seed for feature subsampling
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: -1,
            num_leaves: 31,
            min_split_gain: 0.0,
            min_child_weight: 1e-3,
            min_child_samples: 20,
            reg_lambda: 0.0,
            colsample_bytree: 1.0,
            max_bin: 255,
            seed: 0,
        }
    }
}

impl BoosterParams {
    /// Names accepted by [`BoosterParams::set`]
    pub const NAMES: &'static [&'static str] = &[
        "n_estimators",
        "learning_rate",
        "max_depth",
        "num_leaves",
        "min_split_gain",
        "min_child_weight",
        "min_child_samples",
        "reg_lambda",
        "colsample_bytree",
        "max_bin",
        "seed",
    ];

    /// Set one hyperparameter by name
    ///
    /// Integer parameters reject float values; float parameters accept both.
    pub fn set(&mut self, name: &str, value: ParameterValue) -> Result<(), TrainError> {
        match name {
            "n_estimators" => self.n_estimators = non_negative(name, value)?,
            "num_leaves" => self.num_leaves = non_negative(name, value)?,
            "min_child_samples" => self.min_child_samples = non_negative(name, value)?,
            "max_bin" => self.max_bin = non_negative(name, value)?,
            "seed" => self.seed = non_negative::<u64>(name, value)?,
            "max_depth" => self.max_depth = integer(name, value)?,
            "learning_rate" => self.learning_rate = value.as_float(),
            "min_split_gain" => self.min_split_gain = value.as_float(),
            "min_child_weight" => self.min_child_weight = value.as_float(),
            "reg_lambda" => self.reg_lambda = value.as_float(),
            "colsample_bytree" => self.colsample_bytree = value.as_float(),
            _ => return Err(TrainError::UnknownParam(name.to_string())),
        }
        Ok(())
    }

    /// Check every parameter is in its valid range
    pub fn validate(&self) -> Result<(), TrainError> {
        let invalid = |name: &str, value: String, expected: &str| {
            Err(TrainError::InvalidParam(format!(
                "{name} = {value} (must be {expected})"
            )))
        };

        if self.n_estimators == 0 {
            return invalid("n_estimators", self.n_estimators.to_string(), "> 0");
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning_rate", self.learning_rate.to_string(), "> 0.0");
        }
        if self.max_depth == 0 || self.max_depth < -1 {
            return invalid("max_depth", self.max_depth.to_string(), ">= 1 or -1");
        }
        if self.num_leaves < 2 {
            return invalid("num_leaves", self.num_leaves.to_string(), ">= 2");
        }
        for (name, value) in [
            ("min_split_gain", self.min_split_gain),
            ("min_child_weight", self.min_child_weight),
            ("reg_lambda", self.reg_lambda),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(name, value.to_string(), ">= 0.0");
            }
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return invalid(
                "colsample_bytree",
                self.colsample_bytree.to_string(),
                "in (0.0, 1.0]",
            );
        }
        if !(2..=usize::from(u16::MAX)).contains(&self.max_bin) {
            return invalid("max_bin", self.max_bin.to_string(), "in [2, 65535]");
        }
        Ok(())
    }

    /// Depth limit, `None` when unlimited
    pub fn depth_limit(&self) -> Option<usize> {
        usize::try_from(self.max_depth).ok()
    }

    pub(crate) fn gain_params(&self) -> GainParams {
        GainParams {
            reg_lambda: self.reg_lambda,
            min_split_gain: self.min_split_gain,
            min_child_weight: self.min_child_weight,
            min_child_samples: self.min_child_samples.max(1),
        }
    }
}

fn integer(name: &str, value: ParameterValue) -> Result<i64, TrainError> {
    value.as_int().ok_or_else(|| TrainError::InvalidParamType {
        name: name.to_string(),
        expected: "int",
        got: value.kind(),
    })
}

fn non_negative<T: TryFrom<i64>>(name: &str, value: ParameterValue) -> Result<T, TrainError> {
    let raw = integer(name, value)?;
    T::try_from(raw)
        .map_err(|_| TrainError::InvalidParam(format!("{name} = {raw} (must be >= 0)")))
}
