//! YAML schema definitions for the training job configuration

use serde::{Deserialize, Deserializer, Serialize};

use super::validate::ValidationError;
use crate::gbdt::BoosterParams;
use crate::search::{ParameterGrid, ParameterValue};

/// Upper bound on the number of values a `{start, stop, step}` range may expand to
const MAX_RANGE_VALUES: usize = 10_000;

/// Relative slack when counting float range steps, so `stop` is never produced by rounding
const RANGE_EPSILON: f64 = 1e-9;

/// Complete job specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Feature columns, in model input order
    pub features: Vec<String>,

    /// Target column (a bare string or a one-element list)
    #[serde(deserialize_with = "one_or_many")]
    pub target: Vec<String>,

    /// Hyperparameter ranges searched by the randomized search
    pub parameter_space: ParameterSpace,

    /// Search settings
    #[serde(default)]
    pub search: SearchParams,

    /// Fixed classifier settings shared by every candidate
    #[serde(default)]
    pub classifier: ClassifierSpec,
}

impl JobConfig {
    /// The single target column name
    pub fn target_column(&self) -> &str {
        self.target.first().map(String::as_str).unwrap_or_default()
    }

    /// Feature columns followed by the target column(s)
    pub fn columns(&self) -> Vec<String> {
        self.features
            .iter()
            .chain(self.target.iter())
            .cloned()
            .collect()
    }
}

/// Candidate values for one hyperparameter
///
/// Either an explicit list or a half-open arithmetic range:
///
/// ```yaml
/// max_depth: [3, 5, 7]
/// learning_rate: {start: 0.01, stop: 0.2, step: 0.05}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Candidates<T> {
    List(Vec<T>),
    Range { start: T, stop: T, step: T },
}

impl Candidates<i64> {
    /// Expand into the concrete candidate list
    pub fn values(&self, name: &str) -> Result<Vec<i64>, ValidationError> {
        match self {
            Candidates::List(values) => Ok(values.clone()),
            Candidates::Range { start, stop, step } => {
                if *step <= 0 {
                    return Err(ValidationError::InvalidRange {
                        name: name.to_string(),
                        reason: format!("step must be > 0, got {step}"),
                    });
                }
                let span = (*stop as i128 - *start as i128).max(0);
                let count = (span + *step as i128 - 1) / *step as i128;
                if count > MAX_RANGE_VALUES as i128 {
                    return Err(ValidationError::InvalidRange {
                        name: name.to_string(),
                        reason: format!("expands to {count} values (limit {MAX_RANGE_VALUES})"),
                    });
                }
                Ok((*start..*stop).step_by(*step as usize).collect())
            }
        }
    }
}

impl Candidates<f64> {
    /// Expand into the concrete candidate list
    pub fn values(&self, name: &str) -> Result<Vec<f64>, ValidationError> {
        match self {
            Candidates::List(values) => Ok(values.clone()),
            Candidates::Range { start, stop, step } => {
                if !(step.is_finite() && *step > 0.0) || !start.is_finite() || !stop.is_finite() {
                    return Err(ValidationError::InvalidRange {
                        name: name.to_string(),
                        reason: format!("need finite bounds and step > 0, got {start}..{stop} by {step}"),
                    });
                }
                let steps = (stop - start) / step;
                let count = (steps - RANGE_EPSILON * steps.abs().max(1.0)).ceil().max(0.0);
                if count > MAX_RANGE_VALUES as f64 {
                    return Err(ValidationError::InvalidRange {
                        name: name.to_string(),
                        reason: format!("expands to {count} values (limit {MAX_RANGE_VALUES})"),
                    });
                }
                // Multiply instead of accumulating so long ranges do not drift.
                Ok((0..count as usize)
                    .map(|i| start + i as f64 * step)
                    .take_while(|v| v < stop)
                    .collect())
            }
        }
    }
}

/// The six recognized hyperparameter ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSpace {
    /// Maximum tree depth (-1 for unlimited)
    pub max_depth: Candidates<i64>,

    /// Minimum loss reduction required to split (classifier `min_split_gain`)
    pub gamma: Candidates<f64>,

    /// Minimum hessian sum per child
    pub min_child_weight: Candidates<f64>,

    /// Shrinkage applied to each tree
    pub learning_rate: Candidates<f64>,

    /// Fraction of features sampled per tree
    pub colsample_bytree: Candidates<f64>,

    /// Maximum leaves per tree
    pub num_leaves: Candidates<i64>,
}

impl ParameterSpace {
    /// Expand every range and route it to its pipeline parameter name
    pub fn grid(&self) -> Result<ParameterGrid, ValidationError> {
        let ints = |name: &str, c: &Candidates<i64>| -> Result<Vec<ParameterValue>, ValidationError> {
            Ok(c.values(name)?.into_iter().map(ParameterValue::Int).collect())
        };
        let floats = |name: &str, c: &Candidates<f64>| -> Result<Vec<ParameterValue>, ValidationError> {
            Ok(c.values(name)?.into_iter().map(ParameterValue::Float).collect())
        };

        let grid = ParameterGrid::new()
            .with("classifier__max_depth", ints("max_depth", &self.max_depth)?)
            .with("classifier__min_split_gain", floats("gamma", &self.gamma)?)
            .with(
                "classifier__min_child_weight",
                floats("min_child_weight", &self.min_child_weight)?,
            )
            .with(
                "classifier__learning_rate",
                floats("learning_rate", &self.learning_rate)?,
            )
            .with(
                "classifier__colsample_bytree",
                floats("colsample_bytree", &self.colsample_bytree)?,
            )
            .with("classifier__num_leaves", ints("num_leaves", &self.num_leaves)?);

        Ok(grid)
    }
}

/// Randomized search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Number of sampled parameter combinations
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,

    /// Number of stratified cross-validation folds
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,

    /// Worker threads evaluating candidates
    #[serde(default = "default_n_jobs")]
    pub n_jobs: usize,

    /// Seed for the split, the sampler and the classifier
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            n_iter: default_n_iter(),
            cv_folds: default_cv_folds(),
            n_jobs: default_n_jobs(),
            seed: default_seed(),
        }
    }
}

/// Classifier settings that are not searched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSpec {
    /// Boosting rounds
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Minimum rows per leaf
    #[serde(default = "default_min_child_samples")]
    pub min_child_samples: usize,

    /// L2 regularization on leaf weights
    #[serde(default)]
    pub reg_lambda: f64,

    /// Maximum histogram bins per feature
    #[serde(default = "default_max_bin")]
    pub max_bin: usize,
}

impl Default for ClassifierSpec {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            min_child_samples: default_min_child_samples(),
            reg_lambda: 0.0,
            max_bin: default_max_bin(),
        }
    }
}

impl ClassifierSpec {
    /// Base booster parameters every candidate starts from
    pub fn booster_params(&self, seed: u64) -> BoosterParams {
        BoosterParams {
            n_estimators: self.n_estimators,
            min_child_samples: self.min_child_samples,
            reg_lambda: self.reg_lambda,
            max_bin: self.max_bin,
            seed,
            ..BoosterParams::default()
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(column) => vec![column],
        OneOrMany::Many(columns) => columns,
    })
}

fn default_n_iter() -> usize {
    100
}

fn default_cv_folds() -> usize {
    5
}

fn default_n_jobs() -> usize {
    4
}

fn default_seed() -> u64 {
    7
}

fn default_n_estimators() -> usize {
    100
}

fn default_min_child_samples() -> usize {
    20
}

fn default_max_bin() -> usize {
    255
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
features: [f1, f2]
target: [target]
parameter_space:
  max_depth: [3, 5]
  gamma: [0, 0.1]
  min_child_weight: [1]
  learning_rate: [0.1]
  colsample_bytree: [1.0]
  num_leaves: [31]
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: JobConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.features, vec!["f1", "f2"]);
        assert_eq!(config.target_column(), "target");
        assert_eq!(
            config.parameter_space.max_depth,
            Candidates::List(vec![3, 5])
        );
        assert_eq!(
            config.parameter_space.gamma,
            Candidates::List(vec![0.0, 0.1])
        );
        assert_eq!(config.search, SearchParams::default());
        assert_eq!(config.classifier, ClassifierSpec::default());
    }

    #[test]
    fn test_target_as_bare_string() {
        let yaml = MINIMAL.replace("target: [target]", "target: default_flag");
        let config: JobConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.target, vec!["default_flag"]);
    }

    #[test]
    fn test_missing_target_is_rejected() {
        let yaml = MINIMAL.replace("target: [target]\n", "");
        let err = serde_yaml::from_str::<JobConfig>(&yaml).unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_unknown_hyperparameter_is_rejected() {
        let yaml = MINIMAL.replace("num_leaves: [31]", "num_leaves: [31]\n  subsample: [0.5]");
        assert!(serde_yaml::from_str::<JobConfig>(&yaml).is_err());
    }

    #[test]
    fn test_float_for_integer_range_is_rejected() {
        let yaml = MINIMAL.replace("max_depth: [3, 5]", "max_depth: [3.5]");
        assert!(serde_yaml::from_str::<JobConfig>(&yaml).is_err());
    }

    #[test]
    fn test_range_form() {
        let yaml = MINIMAL.replace(
            "max_depth: [3, 5]",
            "max_depth: {start: 2, stop: 9, step: 3}",
        );
        let config: JobConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            config.parameter_space.max_depth.values("max_depth").unwrap(),
            vec![2, 5, 8]
        );
    }

    #[test]
    fn test_float_range_expansion() {
        let range = Candidates::Range {
            start: 0.0,
            stop: 0.3,
            step: 0.1,
        };
        let values = range.values("gamma").unwrap();
        assert_eq!(values.len(), 3);
        assert!((values[2] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_float_range_excludes_stop_despite_rounding() {
        let yaml = MINIMAL.replace(
            "learning_rate: [0.1]",
            "learning_rate: {start: 0.1, stop: 0.4, step: 0.1}",
        );
        let config = crate::config::parse_config(&yaml).unwrap();
        let values = config
            .parameter_space
            .learning_rate
            .values("learning_rate")
            .unwrap();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| *v < 0.4), "{values:?}");

        let colsample = Candidates::Range {
            start: 0.5,
            stop: 1.1,
            step: 0.2,
        };
        let values = colsample.values("colsample_bytree").unwrap();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| *v <= 1.0), "{values:?}");
    }

    #[test]
    fn test_float_range_keeps_exact_multiples() {
        let range = Candidates::Range {
            start: 0.0,
            stop: 1.0,
            step: 0.25,
        };
        assert_eq!(range.values("gamma").unwrap(), vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_range_with_zero_step_is_rejected() {
        let range = Candidates::Range {
            start: 1i64,
            stop: 5,
            step: 0,
        };
        assert!(range.values("num_leaves").is_err());
    }

    #[test]
    fn test_grid_routes_gamma_to_min_split_gain() {
        let config: JobConfig = serde_yaml::from_str(MINIMAL).unwrap();
        let grid = config.parameter_space.grid().unwrap();

        assert_eq!(grid.len(), 4);
        let names: Vec<&str> = grid.dims().map(|(name, _)| name).collect();
        assert!(names.contains(&"classifier__min_split_gain"));
        assert!(!names.iter().any(|n| n.ends_with("gamma")));
    }

    #[test]
    fn test_search_and_classifier_sections() {
        let yaml = format!(
            "{MINIMAL}search:\n  n_iter: 10\n  cv_folds: 3\nclassifier:\n  n_estimators: 50\n"
        );
        let config: JobConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.search.n_iter, 10);
        assert_eq!(config.search.cv_folds, 3);
        assert_eq!(config.search.seed, 7);
        assert_eq!(config.classifier.n_estimators, 50);
        assert_eq!(config.classifier.min_child_samples, 20);

        let params = config.classifier.booster_params(config.search.seed);
        assert_eq!(params.n_estimators, 50);
        assert_eq!(params.seed, 7);
    }

    #[test]
    fn test_columns_order() {
        let config: JobConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.columns(), vec!["f1", "f2", "target"]);
    }
}
