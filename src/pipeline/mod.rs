//! Two-stage model pipeline: mean imputation followed by the booster
//!
//! Parameters are addressed as `<stage>__<name>`, e.g.
//! `classifier__num_leaves`.

mod imputer;

pub use imputer::SimpleImputer;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gbdt::{BoosterParams, GbdtClassifier, TrainError};
use crate::search::{ParamSet, ParameterValue};

/// Name of the imputation stage
pub const IMPUTATION_STAGE: &str = "imputation";

/// Name of the classifier stage
pub const CLASSIFIER_STAGE: &str = "classifier";

/// Unfitted pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub classifier: BoosterParams,
}

impl PipelineParams {
    pub fn new(classifier: BoosterParams) -> Self {
        Self { classifier }
    }

    /// Set a `<stage>__<name>` parameter
    pub fn set_param(&mut self, name: &str, value: ParameterValue) -> std::result::Result<(), TrainError> {
        match name.split_once("__") {
            Some((CLASSIFIER_STAGE, param)) => self.classifier.set(param, value),
            // The imputer only supports the mean strategy and has nothing numeric to tune
            _ => Err(TrainError::UnknownParam(name.to_string())),
        }
    }

    /// Apply every parameter of a search candidate
    pub fn with_params(mut self, params: &ParamSet) -> std::result::Result<Self, TrainError> {
        for (name, value) in params {
            self.set_param(name, *value)?;
        }
        Ok(self)
    }
}

/// Fitted pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    imputer: SimpleImputer,
    classifier: GbdtClassifier,
}

impl Pipeline {
    /// Fit both stages in order
    pub fn fit(
        params: &PipelineParams,
        x: ArrayView2<f64>,
        y: ndarray::ArrayView1<f64>,
    ) -> std::result::Result<Self, TrainError> {
        let imputer = SimpleImputer::fit(x);
        let filled = imputer.transform(x)?;
        let classifier = GbdtClassifier::fit(&params.classifier, filled.view(), y)?;
        Ok(Self {
            imputer,
            classifier,
        })
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> std::result::Result<Array1<f64>, TrainError> {
        let filled = self.imputer.transform(x)?;
        self.classifier.predict_proba(filled.view())
    }

    /// Predicted labels per row
    pub fn predict(&self, x: ArrayView2<f64>) -> std::result::Result<Array1<f64>, TrainError> {
        let filled = self.imputer.transform(x)?;
        self.classifier.predict(filled.view())
    }

    pub fn imputer(&self) -> &SimpleImputer {
        &self.imputer
    }

    pub fn classifier(&self) -> &GbdtClassifier {
        &self.classifier
    }

    /// Type name of the final estimator
    pub fn classifier_type_name(&self) -> &'static str {
        GbdtClassifier::TYPE_NAME
    }

    /// Serialize the fitted pipeline
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a pipeline written by [`Pipeline::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        let pipeline: Self = serde_json::from_str(json)?;
        pipeline.classifier.check()?;
        if pipeline.imputer.statistics().len() != pipeline.classifier.n_features() {
            return Err(TrainError::FeatureMismatch {
                expected: pipeline.classifier.n_features(),
                got: pipeline.imputer.statistics().len(),
            }
            .into());
        }
        Ok(pipeline)
    }
}
