//! Randomized search with cross-validation

use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cv::{Fold, StratifiedKFold};
use super::space::{sample_without_replacement, ParamSet, ParameterGrid};
use super::SearchError;
use crate::config::SearchParams;
use crate::error::{Error, Result};
use crate::metrics::roc_auc;
use crate::pipeline::{Pipeline, PipelineParams};

/// Trial status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    /// Every fold was fitted (a fold may still have an undefined score)
    Completed,
    /// At least one fold failed to fit
    Failed,
}

/// A single evaluated candidate (configuration + fold scores)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Position in the sampled candidate list
    pub id: usize,
    /// Parameter configuration
    pub params: ParamSet,
    /// ROC-AUC per fold (NaN when a fold failed or was undefined)
    pub fold_scores: Vec<f64>,
    /// Mean fold score (NaN if any fold is NaN)
    pub mean_score: f64,
    /// Population standard deviation of the fold scores
    pub std_score: f64,
    /// Trial status
    pub status: TrialStatus,
}

impl Trial {
    fn new(id: usize, params: ParamSet, fold_scores: Vec<f64>, status: TrialStatus) -> Self {
        let n = fold_scores.len().max(1) as f64;
        let mean_score = fold_scores.iter().sum::<f64>() / n;
        let std_score = (fold_scores
            .iter()
            .map(|s| (s - mean_score).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();

        Self {
            id,
            params,
            fold_scores,
            mean_score,
            std_score,
            status,
        }
    }

    /// Whether the trial produced a usable mean score
    pub fn is_scored(&self) -> bool {
        !self.mean_score.is_nan()
    }
}

/// Outcome of a randomized search
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best pipeline, refitted on the full training data
    pub best_estimator: Pipeline,
    /// Mean cross-validated ROC-AUC of the best candidate
    pub best_score: f64,
    /// Parameters of the best candidate
    pub best_params: ParamSet,
    /// Index of the best candidate in `trials`
    pub best_index: usize,
    /// Every evaluated candidate, in sampling order
    pub trials: Vec<Trial>,
    /// Number of cross-validation folds
    pub n_splits: usize,
}

impl SearchResult {
    /// Number of evaluated candidates
    pub fn n_candidates(&self) -> usize {
        self.trials.len()
    }

    /// Trial indices ordered best first; unscored trials come last
    pub fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.trials.len()).collect();
        order.sort_by(|&a, &b| {
            let (sa, sb) = (self.trials[a].mean_score, self.trials[b].mean_score);
            match (sa.is_nan(), sb.is_nan()) {
                (false, false) => sb.total_cmp(&sa),
                (a_nan, b_nan) => a_nan.cmp(&b_nan),
            }
        });
        order
    }
}

/// Randomized search over a parameter grid with stratified k-fold CV
///
/// Candidates are evaluated on a dedicated thread pool of `n_jobs`
/// workers. Sampling and every fit are seeded, so the result does not
/// depend on scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomizedSearch {
    n_iter: usize,
    cv: StratifiedKFold,
    seed: u64,
    n_jobs: usize,
}

impl RandomizedSearch {
    /// Create a search sampling `n_iter` candidates scored on `n_splits` folds
    pub fn new(n_iter: usize, n_splits: usize) -> Self {
        Self {
            n_iter,
            cv: StratifiedKFold::new(n_splits),
            seed: 0,
            n_jobs: 1,
        }
    }

    /// Build from the `search` section of the job configuration
    pub fn from_params(params: &SearchParams) -> Self {
        Self::new(params.n_iter, params.cv_folds)
            .with_seed(params.seed)
            .with_n_jobs(params.n_jobs)
    }

    /// Set the sampler seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of worker threads
    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs.max(1);
        self
    }

    /// Number of candidates requested
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Sample candidates, cross-validate each and refit the best one
    pub fn fit(
        &self,
        template: &PipelineParams,
        grid: &ParameterGrid,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<SearchResult> {
        if grid.is_empty() {
            return Err(SearchError::EmptyGrid.into());
        }
        if x.nrows() != y.len() {
            return Err(Error::FitError(format!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let candidates = sample_without_replacement(grid, self.n_iter, &mut rng)
            .into_iter()
            .map(|params| -> Result<(ParamSet, PipelineParams)> {
                let pipeline = template.clone().with_params(&params)?;
                Ok((params, pipeline))
            })
            .collect::<Result<Vec<_>>>()?;

        let folds = self.cv.split(&y.to_vec())?;

        info!(
            candidates = candidates.len(),
            folds = folds.len(),
            n_jobs = self.n_jobs,
            "starting randomized search"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs)
            .build()
            .map_err(|e| SearchError::WorkerPool(e.to_string()))?;

        let trials: Vec<Trial> = pool.install(|| {
            candidates
                .par_iter()
                .enumerate()
                .map(|(id, (params, pipeline))| {
                    evaluate_candidate(id, params, pipeline, &folds, x, y)
                })
                .collect()
        });

        let best_index = select_best(&trials)
            .ok_or_else(|| SearchError::AllCandidatesFailed(trials.len()))?;
        let best = &trials[best_index];

        info!(
            best_index,
            best_score = best.mean_score,
            best_std = best.std_score,
            "randomized search finished; refitting best candidate"
        );

        let best_estimator = Pipeline::fit(&candidates[best_index].1, x, y)?;

        Ok(SearchResult {
            best_estimator,
            best_score: best.mean_score,
            best_params: best.params.clone(),
            best_index,
            n_splits: folds.len(),
            trials,
        })
    }
}

fn evaluate_candidate(
    id: usize,
    params: &ParamSet,
    pipeline: &PipelineParams,
    folds: &[Fold],
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Trial {
    let mut status = TrialStatus::Completed;

    let fold_scores = folds
        .iter()
        .enumerate()
        .map(|(fold_index, fold)| {
            let x_train = x.select(Axis(0), &fold.train);
            let y_train = y.select(Axis(0), &fold.train);
            let x_test = x.select(Axis(0), &fold.test);
            let y_test = y.select(Axis(0), &fold.test);

            let scored = Pipeline::fit(pipeline, x_train.view(), y_train.view())
                .and_then(|model| model.predict_proba(x_test.view()));

            match scored {
                Ok(scores) => roc_auc(y_test.view(), scores.view()).unwrap_or(f64::NAN),
                Err(e) => {
                    warn!(candidate = id, fold = fold_index, error = %e, "fit failed; fold scored as NaN");
                    status = TrialStatus::Failed;
                    f64::NAN
                }
            }
        })
        .collect();

    let trial = Trial::new(id, params.clone(), fold_scores, status);
    debug!(
        candidate = id,
        mean_score = trial.mean_score,
        std_score = trial.std_score,
        "candidate evaluated"
    );
    trial
}

/// Highest mean score wins; the earliest candidate wins ties
fn select_best(trials: &[Trial]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, trial) in trials.iter().enumerate() {
        if !trial.is_scored() {
            continue;
        }
        match best {
            Some(current) if trial.mean_score <= trials[current].mean_score => {}
            _ => best = Some(index),
        }
    }
    best
}
