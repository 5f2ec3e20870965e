//! Mean imputation of missing feature values

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gbdt::TrainError;

/// Replaces NaN with the per-column mean observed at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleImputer {
    statistics: Vec<f64>,
}

impl SimpleImputer {
    /// Learn column means, ignoring missing values
    ///
    /// A column with no observed value imputes `0.0`.
    pub fn fit(x: ArrayView2<f64>) -> Self {
        let statistics = x
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(column, values)| {
                let (sum, count) = values
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
                if count == 0 {
                    warn!(column, "column has no observed values; imputing 0.0");
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect();
        Self { statistics }
    }

    /// Fill missing values with the learned means
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, TrainError> {
        if x.ncols() != self.statistics.len() {
            return Err(TrainError::FeatureMismatch {
                expected: self.statistics.len(),
                got: x.ncols(),
            });
        }
        let mut filled = x.to_owned();
        for (mut column, &mean) in filled.axis_iter_mut(Axis(1)).zip(&self.statistics) {
            column.mapv_inplace(|v| if v.is_nan() { mean } else { v });
        }
        Ok(filled)
    }

    /// Learned fill value per column
    pub fn statistics(&self) -> &[f64] {
        &self.statistics
    }
}
