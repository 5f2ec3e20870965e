//! Experiment storage
//!
//! The `ExperimentStorage` trait records experiments, runs and everything
//! logged under a run: metrics, write-once parameters and artifacts.
//!
//! # Backends
//!
//! - `FileStorage`: directory tree on local disk, used by the CLI
//! - `InMemoryStorage`: in-process maps, used by tests
//!
//! # Example
//!
//! ```
//! use loanboost::storage::{ExperimentStorage, InMemoryStorage, RunStatus};
//!
//! let mut storage = InMemoryStorage::new();
//! let exp_id = storage.create_experiment("loans", None).unwrap();
//! let run_id = storage.create_run(&exp_id).unwrap();
//! storage.start_run(&run_id).unwrap();
//! storage.log_metric(&run_id, "ROC_AUC_test", 0, 0.81).unwrap();
//! storage.log_param(&run_id, "split_prop", "0.8").unwrap();
//! storage.complete_run(&run_id, RunStatus::Success).unwrap();
//! ```

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

use std::collections::BTreeMap;
use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Parameter {key} already logged as {existing:?}, refusing to overwrite with {new:?}")]
    ParamConflict {
        key: String,
        existing: String,
        new: String,
    },

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Corrupt(err.to_string())
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is created but not yet started
    Pending,
    /// Run is currently executing
    Running,
    /// Run completed successfully
    Success,
    /// Run failed with an error
    Failed,
    /// Run was cancelled
    Cancelled,
}

impl RunStatus {
    /// Whether the run is closed for good
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// A single metric data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Step the value was logged at
    pub step: u64,
    /// Metric value
    pub value: f64,
    /// Timestamp when recorded
    pub timestamp: DateTime<Utc>,
}

impl MetricPoint {
    /// Create a new metric point with current timestamp
    pub fn new(step: u64, value: f64) -> Self {
        Self {
            step,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Create a metric point with specific timestamp
    pub fn with_timestamp(step: u64, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            step,
            value,
            timestamp,
        }
    }
}

/// Trait for experiment storage backends
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; callers share them behind
/// `Arc<Mutex<_>>`.
///
/// # Run lifecycle
///
/// Runs are created `Pending`, move to `Running` on [`start_run`] and end
/// in a terminal status on [`complete_run`]. Nothing can be logged to a
/// run once it is terminal.
///
/// [`start_run`]: ExperimentStorage::start_run
/// [`complete_run`]: ExperimentStorage::complete_run
pub trait ExperimentStorage: Send + Sync {
    /// Create a new experiment and return its ID
    fn create_experiment(
        &mut self,
        name: &str,
        config: Option<serde_json::Value>,
    ) -> Result<String>;

    /// ID of the experiment with this name, if any
    fn find_experiment(&self, name: &str) -> Result<Option<String>>;

    /// Create a new `Pending` run within an experiment
    fn create_run(&mut self, experiment_id: &str) -> Result<String>;

    /// Start a run, transitioning from Pending to Running
    fn start_run(&mut self, run_id: &str) -> Result<()>;

    /// Complete a running run with a terminal status
    fn complete_run(&mut self, run_id: &str, status: RunStatus) -> Result<()>;

    /// Append a metric value
    fn log_metric(&mut self, run_id: &str, key: &str, step: u64, value: f64) -> Result<()>;

    /// Record a parameter
    ///
    /// Parameters are write-once: logging the same value again is a no-op,
    /// a different value is a [`StorageError::ParamConflict`].
    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()>;

    /// Store an artifact under a relative path and return its content hash
    fn log_artifact(&mut self, run_id: &str, path: &str, data: &[u8]) -> Result<String>;

    /// Metric history for one key, ordered by step
    fn get_metrics(&self, run_id: &str, key: &str) -> Result<Vec<MetricPoint>>;

    /// All parameters of a run
    fn get_params(&self, run_id: &str) -> Result<BTreeMap<String, String>>;

    /// Current status of a run
    fn get_run_status(&self, run_id: &str) -> Result<RunStatus>;

    /// Relative paths of every artifact of a run, sorted
    fn list_artifacts(&self, run_id: &str) -> Result<Vec<String>>;

    /// Contents of one artifact
    fn get_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>>;
}

/// Content hash reported for stored artifacts
pub(crate) fn artifact_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("sha256-{}", hex::encode(&digest[..16]))
}

/// Metric and parameter keys: non-empty, no path separators
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Artifact paths: relative, `/`-separated, without `..`
pub(crate) fn validate_artifact_path(path: &str) -> Result<()> {
    let invalid = || StorageError::InvalidKey(path.to_string());
    if path.is_empty() || path.contains('\\') {
        return Err(invalid());
    }
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(invalid)?;
                validate_key(part).map_err(|_| invalid())?;
            }
            _ => return Err(invalid()),
        }
    }
    Ok(())
}

/// Check a lifecycle transition from `current`
pub(crate) fn check_transition(run_id: &str, current: RunStatus, next: RunStatus) -> Result<()> {
    let allowed = match next {
        RunStatus::Running => current == RunStatus::Pending,
        RunStatus::Success | RunStatus::Failed | RunStatus::Cancelled => {
            current == RunStatus::Running
        }
        RunStatus::Pending => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(StorageError::InvalidState(format!(
            "Run {run_id} cannot move from {current:?} to {next:?}"
        )))
    }
}

/// Reject writes to closed runs
pub(crate) fn check_writable(run_id: &str, status: RunStatus) -> Result<()> {
    if status.is_terminal() {
        Err(StorageError::InvalidState(format!(
            "Run {run_id} is {status:?} and can no longer be modified"
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_point_new() {
        let point = MetricPoint::new(10, 0.5);
        assert_eq!(point.step, 10);
        assert!((point.value - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metric_point_with_timestamp() {
        let ts = Utc::now();
        let point = MetricPoint::with_timestamp(5, 0.3, ts);
        assert_eq!(point.step, 5);
        assert_eq!(point.timestamp, ts);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(check_transition("r", RunStatus::Pending, RunStatus::Running).is_ok());
        assert!(check_transition("r", RunStatus::Running, RunStatus::Failed).is_ok());
        assert!(check_transition("r", RunStatus::Pending, RunStatus::Success).is_err());
        assert!(check_transition("r", RunStatus::Success, RunStatus::Failed).is_err());
        assert!(check_transition("r", RunStatus::Running, RunStatus::Pending).is_err());
    }

    #[test]
    fn test_artifact_hash_format() {
        let hash = artifact_hash(b"model");
        assert!(hash.starts_with("sha256-"));
        assert_eq!(hash.len(), "sha256-".len() + 32);
        assert_eq!(hash, artifact_hash(b"model"));
        assert_ne!(hash, artifact_hash(b"other"));
    }

    #[test]
    fn test_keys() {
        assert!(validate_key("ROC_AUC_test").is_ok());
        assert!(validate_key("classifier__num_leaves").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("a/b").is_err());
    }

    #[test]
    fn test_artifact_paths() {
        assert!(validate_artifact_path("best-5-fold-cross-validated-GbdtClassifier/model.json").is_ok());
        assert!(validate_artifact_path("model.json").is_ok());
        assert!(validate_artifact_path("/etc/passwd").is_err());
        assert!(validate_artifact_path("../escape").is_err());
        assert!(validate_artifact_path("a/../b").is_err());
        assert!(validate_artifact_path("a\\b").is_err());
        assert!(validate_artifact_path("").is_err());
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::ExperimentNotFound("exp-1".to_string());
        assert!(err.to_string().contains("exp-1"));

        let err = StorageError::ParamConflict {
            key: "split_prop".to_string(),
            existing: "0.8".to_string(),
            new: "0.7".to_string(),
        };
        assert!(err.to_string().contains("split_prop"));
    }
}
