//! The training job
//!
//! Reads the loans dataset, splits it, runs the randomized cross-validated
//! search, scores the refitted best pipeline on the held-out rows and
//! records everything under one tracker run.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{info, info_span};

use crate::config::{read_config, validate_config, validate_split_prop, JobConfig};
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::metrics::roc_auc;
use crate::pipeline::{Pipeline, PipelineParams};
use crate::run::Run;
use crate::search::{ParamSet, RandomizedSearch, SearchResult};
use crate::storage::{ExperimentStorage, RunStatus, StorageError};

/// What a finished job reports back
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub run_id: String,
    pub experiment_id: String,
    pub training_nrows: usize,
    pub test_nrows: usize,
    /// ROC-AUC of the best pipeline's predicted labels on the test partition
    pub test_score: f64,
    /// Artifact path of the serialized best pipeline
    pub artifact_path: String,
    pub search: SearchResult,
}

impl TrainingOutcome {
    pub fn best_estimator(&self) -> &Pipeline {
        &self.search.best_estimator
    }

    /// Mean cross-validated ROC-AUC of the best candidate
    pub fn best_score(&self) -> f64 {
        self.search.best_score
    }

    pub fn best_params(&self) -> &ParamSet {
        &self.search.best_params
    }
}

/// Artifact directory for the best model: `best-<k>-fold-cross-validated-<Type>`
pub fn artifact_dir(cv_folds: usize, classifier_type: &str) -> String {
    format!("best-{cv_folds}-fold-cross-validated-{classifier_type}")
}

/// Runs training jobs against one experiment
#[derive(Debug)]
pub struct TrainingJob<S: ExperimentStorage> {
    storage: Arc<Mutex<S>>,
    experiment_id: String,
}

impl<S: ExperimentStorage> TrainingJob<S> {
    /// Record runs under the experiment called `experiment_name`, creating it if needed
    pub fn new(storage: Arc<Mutex<S>>, experiment_name: &str) -> Result<Self> {
        let experiment_id = {
            let mut store = storage
                .lock()
                .map_err(|e| StorageError::Backend(format!("storage lock poisoned: {e}")))?;
            match store.find_experiment(experiment_name)? {
                Some(id) => id,
                None => store.create_experiment(experiment_name, None)?,
            }
        };
        Ok(Self::for_experiment(storage, experiment_id))
    }

    /// Record runs under an existing experiment id
    pub fn for_experiment(storage: Arc<Mutex<S>>, experiment_id: impl Into<String>) -> Self {
        Self {
            storage,
            experiment_id: experiment_id.into(),
        }
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Read the YAML configuration at `config_path` and run the job
    pub fn run(
        &self,
        dataset_uri: &str,
        config_path: impl AsRef<Path>,
        split_prop: f64,
    ) -> Result<TrainingOutcome> {
        let config = read_config(config_path)?;
        self.run_with_config(dataset_uri, &config, split_prop)
    }

    /// Run the job with an already parsed configuration
    ///
    /// Nothing is read from `dataset_uri` until the configuration and
    /// `split_prop` are known to be valid.
    pub fn run_with_config(
        &self,
        dataset_uri: &str,
        config: &JobConfig,
        split_prop: f64,
    ) -> Result<TrainingOutcome> {
        validate_split_prop(split_prop).map_err(|e| Error::ConfigError(e.to_string()))?;
        validate_config(config).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;
        let grid = config
            .parameter_space
            .grid()
            .map_err(|e| Error::ConfigError(format!("Invalid parameter space: {e}")))?;
        let seed = config.search.seed;
        let columns = config.columns();

        let dataset = Dataset::open(dataset_uri)?;
        dataset.require_columns(&columns)?;
        let (train_rows, test_rows) = dataset.random_split(split_prop, seed)?;

        let mut run = Run::start(&self.experiment_id, Arc::clone(&self.storage))?;
        let _entered = run.span().clone().entered();

        run.log_metric("training_nrows", train_rows.len() as f64)?;
        run.log_metric("test_nrows", test_rows.len() as f64)?;
        info!(
            training = train_rows.len(),
            test = test_rows.len(),
            "Partitioned dataset"
        );

        let target = config.target_column();
        let (x_train, y_train) = dataset
            .materialize(&train_rows, &columns)?
            .features_and_labels(&config.features, target)?;
        let (x_test, y_test) = dataset
            .materialize(&test_rows, &columns)?
            .features_and_labels(&config.features, target)?;

        run.log_param("features", &serde_json::to_string(&config.features)?)?;
        run.log_param("split_prop", &split_prop.to_string())?;

        let template = PipelineParams::new(config.classifier.booster_params(seed));
        let search = info_span!("search", candidates = config.search.n_iter.min(grid.len()))
            .in_scope(|| {
                RandomizedSearch::from_params(&config.search).fit(
                    &template,
                    &grid,
                    x_train.view(),
                    y_train.view(),
                )
            })?;

        let artifact_path = format!(
            "{}/model.json",
            artifact_dir(search.n_splits, search.best_estimator.classifier_type_name())
        );
        run.log_artifact(&artifact_path, search.best_estimator.to_json()?.as_bytes())?;

        let predicted = search.best_estimator.predict(x_test.view())?;
        let test_score = roc_auc(y_test.view(), predicted.view()).ok_or_else(|| {
            Error::FitError("test partition holds a single class, ROC-AUC is undefined".to_string())
        })?;
        info!(
            train_roc = search.best_score,
            test_roc = test_score,
            "Scored best pipeline"
        );

        run.log_metrics([("ROC_AUC_train", search.best_score), ("ROC_AUC_test", test_score)])?;
        for (key, value) in &search.best_params {
            run.log_param(key, &value.to_string())?;
        }

        let outcome = TrainingOutcome {
            run_id: run.id().to_string(),
            experiment_id: run.experiment_id().to_string(),
            training_nrows: train_rows.len(),
            test_nrows: test_rows.len(),
            test_score,
            artifact_path,
            search,
        };
        run.finish(RunStatus::Success)?;
        Ok(outcome)
    }
}
