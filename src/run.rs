//! Scoped tracker runs
//!
//! A [`Run`] owns one open run in an [`ExperimentStorage`]. Everything
//! logged through it lands under that run, and the run is always closed:
//! explicitly via [`Run::finish`], or as `Failed` when the handle is
//! dropped on an error path.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use loanboost::storage::{ExperimentStorage, InMemoryStorage, RunStatus};
//! use loanboost::run::Run;
//!
//! let mut storage = InMemoryStorage::new();
//! let exp_id = storage.create_experiment("loans", None).unwrap();
//! let storage = Arc::new(Mutex::new(storage));
//!
//! let mut run = Run::start(&exp_id, storage.clone()).unwrap();
//! run.log_metric("training_nrows", 800.0).unwrap();
//! run.log_param("split_prop", "0.8").unwrap();
//! run.finish(RunStatus::Success).unwrap();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::Span;

use crate::storage::{ExperimentStorage, Result, RunStatus, StorageError};

/// An open run, closed on [`finish`](Run::finish) or drop
pub struct Run<S: ExperimentStorage> {
    id: String,
    experiment_id: String,
    storage: Arc<Mutex<S>>,
    span: Span,
    step_counters: HashMap<String, u64>,
    finished: bool,
}

impl<S: ExperimentStorage> Run<S> {
    /// Create a run under `experiment_id` and move it to `Running`
    pub fn start(experiment_id: &str, storage: Arc<Mutex<S>>) -> Result<Self> {
        let run_id = {
            let mut store = lock(&storage)?;
            let run_id = store.create_run(experiment_id)?;
            store.start_run(&run_id)?;
            run_id
        };

        let span = tracing::info_span!("run", run_id = %run_id, experiment_id = %experiment_id);
        span.in_scope(|| tracing::info!("Run started"));

        Ok(Self {
            id: run_id,
            experiment_id: experiment_id.to_string(),
            storage,
            span,
            step_counters: HashMap::new(),
            finished: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Tracing span covering the run's lifetime
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next step a [`log_metric`](Run::log_metric) call for `key` would use
    pub fn current_step(&self, key: &str) -> u64 {
        self.step_counters.get(key).copied().unwrap_or(0)
    }

    /// Log a metric, auto-incrementing its step from 0
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        let step = self.current_step(key);
        self.log_metric_at(key, step, value)?;
        self.step_counters.insert(key.to_string(), step + 1);
        Ok(())
    }

    /// Log a metric at an explicit step
    pub fn log_metric_at(&mut self, key: &str, step: u64, value: f64) -> Result<()> {
        self.ensure_open()?;
        lock(&self.storage)?.log_metric(&self.id, key, step, value)?;
        self.span
            .in_scope(|| tracing::debug!(key, step, value, "Logged metric"));
        Ok(())
    }

    /// Log several metrics at once
    pub fn log_metrics<'a, I>(&mut self, metrics: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (key, value) in metrics {
            self.log_metric(key, value)?;
        }
        Ok(())
    }

    pub fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        lock(&self.storage)?.log_param(&self.id, key, value)?;
        self.span
            .in_scope(|| tracing::debug!(key, value, "Logged param"));
        Ok(())
    }

    /// Store an artifact and return its content hash
    pub fn log_artifact(&mut self, path: &str, data: &[u8]) -> Result<String> {
        self.ensure_open()?;
        let hash = lock(&self.storage)?.log_artifact(&self.id, path, data)?;
        self.span.in_scope(|| {
            tracing::info!(path, bytes = data.len(), hash = %hash, "Logged artifact")
        });
        Ok(hash)
    }

    /// Close the run with a terminal status
    pub fn finish(mut self, status: RunStatus) -> Result<()> {
        self.close(status)
    }

    fn close(&mut self, status: RunStatus) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        // Mark first so a failing backend doesn't trigger a second close on drop
        self.finished = true;
        lock(&self.storage)?.complete_run(&self.id, status)?;
        self.span
            .in_scope(|| tracing::info!(status = ?status, "Run finished"));
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            Err(StorageError::InvalidState(format!(
                "Run {} is already finished",
                self.id
            )))
        } else {
            Ok(())
        }
    }
}

impl<S: ExperimentStorage> Drop for Run<S> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.close(RunStatus::Failed) {
                tracing::error!(run_id = %self.id, "Failed to close run: {e}");
            }
        }
    }
}

impl<S: ExperimentStorage> std::fmt::Debug for Run<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("id", &self.id)
            .field("experiment_id", &self.experiment_id)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

fn lock<S>(storage: &Mutex<S>) -> Result<MutexGuard<'_, S>> {
    storage
        .lock()
        .map_err(|e| StorageError::Backend(format!("storage lock poisoned: {e}")))
}
