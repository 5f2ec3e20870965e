//! Configuration validation

use std::collections::HashSet;

use super::schema::JobConfig;

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No feature columns configured")]
    NoFeatures,

    #[error("Feature column listed twice: {0}")]
    DuplicateFeature(String),

    #[error("Expected exactly one target column, got {0}")]
    InvalidTargetCount(usize),

    #[error("Target column {0} is also listed as a feature")]
    TargetIsFeature(String),

    #[error("Hyperparameter range {0} has no candidate values")]
    EmptyRange(String),

    #[error("Invalid range for {name}: {reason}")]
    InvalidRange { name: String, reason: String },

    #[error("Invalid value {value} for {name} (must be {expected})")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid split proportion: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidSplitProp(f64),

    #[error("Invalid fold count: {0} (must be >= 2)")]
    InvalidFolds(usize),

    #[error("Invalid {name}: {value} (must be > 0)")]
    NotPositive { name: &'static str, value: usize },

    #[error("Invalid max_bin: {0} (must be between 2 and 65535)")]
    InvalidMaxBin(usize),

    #[error("Invalid reg_lambda: {0} (must be >= 0.0)")]
    InvalidRegLambda(f64),
}

/// Validate a job configuration
///
/// Checks:
/// - Column lists are non-empty and consistent
/// - Every hyperparameter range expands to valid values
/// - Search and classifier settings are in range
pub fn validate_config(config: &JobConfig) -> Result<(), ValidationError> {
    if config.features.is_empty() {
        return Err(ValidationError::NoFeatures);
    }

    let mut seen = HashSet::new();
    for feature in &config.features {
        if !seen.insert(feature.as_str()) {
            return Err(ValidationError::DuplicateFeature(feature.clone()));
        }
    }

    if config.target.len() != 1 {
        return Err(ValidationError::InvalidTargetCount(config.target.len()));
    }
    let target = config.target_column();
    if seen.contains(target) {
        return Err(ValidationError::TargetIsFeature(target.to_string()));
    }

    let space = &config.parameter_space;
    check_ints(
        "max_depth",
        &space.max_depth.values("max_depth")?,
        |v| v == -1 || v >= 1,
        ">= 1 or -1",
    )?;
    check_floats("gamma", &space.gamma.values("gamma")?, |v| v >= 0.0, ">= 0.0")?;
    check_floats(
        "min_child_weight",
        &space.min_child_weight.values("min_child_weight")?,
        |v| v >= 0.0,
        ">= 0.0",
    )?;
    check_floats(
        "learning_rate",
        &space.learning_rate.values("learning_rate")?,
        |v| v > 0.0,
        "> 0.0",
    )?;
    check_floats(
        "colsample_bytree",
        &space.colsample_bytree.values("colsample_bytree")?,
        |v| v > 0.0 && v <= 1.0,
        "in (0.0, 1.0]",
    )?;
    check_ints(
        "num_leaves",
        &space.num_leaves.values("num_leaves")?,
        |v| v >= 2,
        ">= 2",
    )?;

    if config.search.cv_folds < 2 {
        return Err(ValidationError::InvalidFolds(config.search.cv_folds));
    }
    for (name, value) in [
        ("n_iter", config.search.n_iter),
        ("n_jobs", config.search.n_jobs),
        ("n_estimators", config.classifier.n_estimators),
    ] {
        if value == 0 {
            return Err(ValidationError::NotPositive { name, value });
        }
    }

    if !(2..=usize::from(u16::MAX)).contains(&config.classifier.max_bin) {
        return Err(ValidationError::InvalidMaxBin(config.classifier.max_bin));
    }
    let reg_lambda = config.classifier.reg_lambda;
    if reg_lambda.is_nan() || reg_lambda < 0.0 {
        return Err(ValidationError::InvalidRegLambda(reg_lambda));
    }

    Ok(())
}

/// Validate the train/test split proportion passed on the command line
pub fn validate_split_prop(split_prop: f64) -> Result<(), ValidationError> {
    if split_prop > 0.0 && split_prop < 1.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidSplitProp(split_prop))
    }
}

fn check_ints(
    name: &str,
    values: &[i64],
    valid: impl Fn(i64) -> bool,
    expected: &'static str,
) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::EmptyRange(name.to_string()));
    }
    match values.iter().find(|v| !valid(**v)) {
        Some(v) => Err(ValidationError::InvalidValue {
            name: name.to_string(),
            value: v.to_string(),
            expected,
        }),
        None => Ok(()),
    }
}

fn check_floats(
    name: &str,
    values: &[f64],
    valid: impl Fn(f64) -> bool,
    expected: &'static str,
) -> Result<(), ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::EmptyRange(name.to_string()));
    }
    // NaN fails every predicate above
    match values.iter().find(|v| !(v.is_finite() && valid(**v))) {
        Some(v) => Err(ValidationError::InvalidValue {
            name: name.to_string(),
            value: v.to_string(),
            expected,
        }),
        None => Ok(()),
    }
}
