//! Binary gradient-boosted classifier with logistic loss

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::binning::BinnedMatrix;
use super::params::BoosterParams;
use super::tree::{GrowerParams, Tree, TreeGrower};
use super::{sigmoid, TrainError};

/// Fitted binary classifier
///
/// Labels may be any two distinct numbers; the larger one is the positive
/// class whose probability [`GbdtClassifier::predict_proba`] returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtClassifier {
    params: BoosterParams,
    classes: [f64; 2],
    n_features: usize,
    base_score: f64,
    trees: Vec<Tree>,
}

impl GbdtClassifier {
    /// Model type name used in artifact paths
    pub const TYPE_NAME: &'static str = "GbdtClassifier";

    /// Fit on a dense feature matrix and a label vector
    pub fn fit(
        params: &BoosterParams,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<Self, TrainError> {
        params.validate()?;

        let n_rows = x.nrows();
        if n_rows == 0 {
            return Err(TrainError::EmptyDataset);
        }
        if n_rows != y.len() {
            return Err(TrainError::ShapeMismatch {
                rows: n_rows,
                labels: y.len(),
            });
        }

        let classes = encode_classes(y)?;
        let targets: Vec<f64> = y
            .iter()
            .map(|&label| if label == classes[1] { 1.0 } else { 0.0 })
            .collect();

        let positive_rate = targets.iter().sum::<f64>() / n_rows as f64;
        let base_score = (positive_rate / (1.0 - positive_rate)).ln();

        let n_features = x.ncols();
        let data = BinnedMatrix::fit(x, params.max_bin);
        let grower_params = GrowerParams {
            gain: params.gain_params(),
            learning_rate: params.learning_rate,
            max_depth: params.depth_limit(),
            num_leaves: params.num_leaves,
        };
        let grower = TreeGrower::new(&data, &grower_params);

        let n_sampled = ((params.colsample_bytree * n_features as f64).ceil() as usize)
            .clamp(1, n_features.max(1));
        let all_features: Vec<usize> = (0..data.n_features()).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut raw = vec![base_score; n_rows];
        let mut grad = vec![0.0; n_rows];
        let mut hess = vec![0.0; n_rows];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            for row in 0..n_rows {
                let p = sigmoid(raw[row]);
                grad[row] = p - targets[row];
                hess[row] = (p * (1.0 - p)).max(f64::EPSILON);
            }

            let features = if n_sampled < n_features {
                let mut sampled = rand::seq::index::sample(&mut rng, n_features, n_sampled).into_vec();
                sampled.sort_unstable();
                sampled
            } else {
                all_features.clone()
            };

            let tree = grower.grow(&grad, &hess, &features);
            if tree.n_leaves() <= 1 {
                debug!(round, "no split improves the loss; stopping early");
                break;
            }

            for (row, score) in raw.iter_mut().enumerate() {
                *score += tree.predict_row(x.row(row));
            }
            trees.push(tree);
        }

        debug!(
            trees = trees.len(),
            features = n_features,
            rows = n_rows,
            "classifier fitted"
        );

        Ok(Self {
            params: params.clone(),
            classes,
            n_features,
            base_score,
            trees,
        })
    }

    /// Raw log-odds of the positive class
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, TrainError> {
        if x.ncols() != self.n_features {
            return Err(TrainError::FeatureMismatch {
                expected: self.n_features,
                got: x.ncols(),
            });
        }
        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                self.base_score
                    + self
                        .trees
                        .iter()
                        .map(|tree| tree.predict_row(row))
                        .sum::<f64>()
            })
            .collect())
    }

    /// Probability of the positive class, one per row
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, TrainError> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Predicted labels, in the original label encoding
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, TrainError> {
        let [negative, positive] = self.classes;
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p > 0.5 { positive } else { negative }))
    }

    /// Hyperparameters the model was fitted with
    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    /// The two labels, negative first
    pub fn classes(&self) -> [f64; 2] {
        self.classes
    }

    /// Number of input features
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fitted trees
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Check the internal consistency of a deserialized model
    pub fn check(&self) -> Result<(), TrainError> {
        match self.trees.iter().filter_map(Tree::max_feature).max() {
            Some(feature) if feature >= self.n_features => Err(TrainError::FeatureMismatch {
                expected: self.n_features,
                got: feature + 1,
            }),
            _ => Ok(()),
        }
    }
}

fn encode_classes(y: ArrayView1<f64>) -> Result<[f64; 2], TrainError> {
    if y.iter().any(|v| !v.is_finite()) {
        return Err(TrainError::InvalidLabel);
    }
    let mut classes: Vec<f64> = y.to_vec();
    classes.sort_by(f64::total_cmp);
    classes.dedup();

    match classes.as_slice() {
        [negative, positive] => Ok([*negative, *positive]),
        [_] => Err(TrainError::SingleClass),
        other => Err(TrainError::TooManyClasses(other.len())),
    }
}
