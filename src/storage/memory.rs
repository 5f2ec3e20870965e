//! In-Memory Storage Backend
//!
//! Keeps every experiment and run in process memory. Used by tests and
//! anywhere a throwaway tracker is enough.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use super::{
    artifact_hash, check_transition, check_writable, validate_artifact_path, validate_key,
    ExperimentStorage, MetricPoint, Result, RunStatus, StorageError,
};

/// In-memory experiment storage backend
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    experiments: HashMap<String, ExperimentData>,
    runs: HashMap<String, RunData>,
    metrics: HashMap<String, Vec<MetricData>>, // run_id:key -> metrics
    next_exp_id: AtomicU64,
    next_run_id: AtomicU64,
}

#[derive(Debug, Clone)]
struct ExperimentData {
    name: String,
    config: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
struct RunData {
    experiment_id: String,
    status: RunStatus,
    params: BTreeMap<String, String>,
    artifacts: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Clone)]
struct MetricData {
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of experiments
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// IDs of the runs of one experiment, sorted
    pub fn runs_of(&self, experiment_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .runs
            .iter()
            .filter(|(_, run)| run.experiment_id == experiment_id)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Configuration recorded with an experiment
    pub fn experiment_config(&self, experiment_id: &str) -> Result<Option<&serde_json::Value>> {
        self.experiments
            .get(experiment_id)
            .map(|e| e.config.as_ref())
            .ok_or_else(|| StorageError::ExperimentNotFound(experiment_id.to_string()))
    }

    fn run(&self, run_id: &str) -> Result<&RunData> {
        self.runs
            .get(run_id)
            .ok_or_else(|| StorageError::RunNotFound(run_id.to_string()))
    }

    fn writable_run(&mut self, run_id: &str) -> Result<&mut RunData> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StorageError::RunNotFound(run_id.to_string()))?;
        check_writable(run_id, run.status)?;
        Ok(run)
    }
}

impl ExperimentStorage for InMemoryStorage {
    fn create_experiment(
        &mut self,
        name: &str,
        config: Option<serde_json::Value>,
    ) -> Result<String> {
        let id = self.next_exp_id.fetch_add(1, Ordering::SeqCst);
        let exp_id = format!("exp-{id}");

        self.experiments.insert(
            exp_id.clone(),
            ExperimentData {
                name: name.to_string(),
                config,
            },
        );

        Ok(exp_id)
    }

    fn find_experiment(&self, name: &str) -> Result<Option<String>> {
        let mut matches: Vec<&String> = self
            .experiments
            .iter()
            .filter(|(_, e)| e.name == name)
            .map(|(id, _)| id)
            .collect();
        // Oldest experiment wins when names repeat
        matches.sort_by_key(|id| (id.len(), id.to_string()));
        Ok(matches.first().map(|id| id.to_string()))
    }

    fn create_run(&mut self, experiment_id: &str) -> Result<String> {
        if !self.experiments.contains_key(experiment_id) {
            return Err(StorageError::ExperimentNotFound(experiment_id.to_string()));
        }

        let id = self.next_run_id.fetch_add(1, Ordering::SeqCst);
        let run_id = format!("run-{id}");

        self.runs.insert(
            run_id.clone(),
            RunData {
                experiment_id: experiment_id.to_string(),
                status: RunStatus::Pending,
                params: BTreeMap::new(),
                artifacts: BTreeMap::new(),
            },
        );

        Ok(run_id)
    }

    fn start_run(&mut self, run_id: &str) -> Result<()> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StorageError::RunNotFound(run_id.to_string()))?;
        check_transition(run_id, run.status, RunStatus::Running)?;
        run.status = RunStatus::Running;
        Ok(())
    }

    fn complete_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StorageError::RunNotFound(run_id.to_string()))?;
        check_transition(run_id, run.status, status)?;
        run.status = status;
        Ok(())
    }

    fn log_metric(&mut self, run_id: &str, key: &str, step: u64, value: f64) -> Result<()> {
        validate_key(key)?;
        self.writable_run(run_id)?;

        let metric_key = format!("{run_id}:{key}");
        self.metrics.entry(metric_key).or_default().push(MetricData {
            step,
            value,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let run = self.writable_run(run_id)?;

        match run.params.get(key) {
            Some(existing) if existing != value => Err(StorageError::ParamConflict {
                key: key.to_string(),
                existing: existing.clone(),
                new: value.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                run.params.insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    fn log_artifact(&mut self, run_id: &str, path: &str, data: &[u8]) -> Result<String> {
        validate_artifact_path(path)?;
        let run = self.writable_run(run_id)?;
        run.artifacts.insert(path.to_string(), data.to_vec());
        Ok(artifact_hash(data))
    }

    fn get_metrics(&self, run_id: &str, key: &str) -> Result<Vec<MetricPoint>> {
        self.run(run_id)?;

        let metric_key = format!("{run_id}:{key}");
        let mut points: Vec<MetricPoint> = self
            .metrics
            .get(&metric_key)
            .map(|metrics| {
                metrics
                    .iter()
                    .map(|m| MetricPoint::with_timestamp(m.step, m.value, m.timestamp))
                    .collect()
            })
            .unwrap_or_default();

        // Stable: equal steps keep logging order
        points.sort_by_key(|p| p.step);

        Ok(points)
    }

    fn get_params(&self, run_id: &str) -> Result<BTreeMap<String, String>> {
        Ok(self.run(run_id)?.params.clone())
    }

    fn get_run_status(&self, run_id: &str) -> Result<RunStatus> {
        Ok(self.run(run_id)?.status)
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<String>> {
        Ok(self.run(run_id)?.artifacts.keys().cloned().collect())
    }

    fn get_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        self.run(run_id)?
            .artifacts
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::ArtifactNotFound(format!("{run_id}/{path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(storage: &mut InMemoryStorage) -> String {
        let exp_id = storage.create_experiment("test-exp", None).unwrap();
        let run_id = storage.create_run(&exp_id).unwrap();
        storage.start_run(&run_id).unwrap();
        run_id
    }

    #[test]
    fn test_in_memory_storage_new() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.experiment_count(), 0);
        assert_eq!(storage.run_count(), 0);
    }

    #[test]
    fn test_create_experiment() {
        let mut storage = InMemoryStorage::new();
        let exp_id = storage.create_experiment("test-exp", None).unwrap();

        assert!(exp_id.starts_with("exp-"));
        assert_eq!(storage.experiment_count(), 1);
    }

    #[test]
    fn test_create_experiment_with_config() {
        let mut storage = InMemoryStorage::new();
        let config = serde_json::json!({"features": ["f1", "f2"]});
        let exp_id = storage.create_experiment("test-exp", Some(config.clone())).unwrap();

        assert_eq!(storage.experiment_config(&exp_id).unwrap(), Some(&config));
    }

    #[test]
    fn test_find_experiment() {
        let mut storage = InMemoryStorage::new();
        assert_eq!(storage.find_experiment("Default").unwrap(), None);

        let exp_id = storage.create_experiment("Default", None).unwrap();
        storage.create_experiment("other", None).unwrap();
        assert_eq!(storage.find_experiment("Default").unwrap(), Some(exp_id));
    }

    #[test]
    fn test_create_run_unknown_experiment() {
        let mut storage = InMemoryStorage::new();
        let err = storage.create_run("exp-404").unwrap_err();
        assert!(matches!(err, StorageError::ExperimentNotFound(_)));
    }

    #[test]
    fn test_run_lifecycle() {
        let mut storage = InMemoryStorage::new();
        let exp_id = storage.create_experiment("test-exp", None).unwrap();
        let run_id = storage.create_run(&exp_id).unwrap();

        assert_eq!(storage.get_run_status(&run_id).unwrap(), RunStatus::Pending);
        assert!(storage.complete_run(&run_id, RunStatus::Success).is_err());

        storage.start_run(&run_id).unwrap();
        assert_eq!(storage.get_run_status(&run_id).unwrap(), RunStatus::Running);
        assert!(storage.start_run(&run_id).is_err());

        storage.complete_run(&run_id, RunStatus::Failed).unwrap();
        assert_eq!(storage.get_run_status(&run_id).unwrap(), RunStatus::Failed);
        assert!(storage.complete_run(&run_id, RunStatus::Success).is_err());
        assert_eq!(storage.runs_of(&exp_id), vec![run_id]);
    }

    #[test]
    fn test_metrics_ordered_by_step() {
        let mut storage = InMemoryStorage::new();
        let run_id = running(&mut storage);

        storage.log_metric(&run_id, "loss", 2, 0.3).unwrap();
        storage.log_metric(&run_id, "loss", 0, 0.5).unwrap();
        storage.log_metric(&run_id, "loss", 1, 0.4).unwrap();

        let steps: Vec<u64> = storage
            .get_metrics(&run_id, "loss")
            .unwrap()
            .iter()
            .map(|p| p.step)
            .collect();
        assert_eq!(steps, vec![0, 1, 2]);
        assert!(storage.get_metrics(&run_id, "unknown").unwrap().is_empty());
    }

    #[test]
    fn test_params_are_write_once() {
        let mut storage = InMemoryStorage::new();
        let run_id = running(&mut storage);

        storage.log_param(&run_id, "split_prop", "0.8").unwrap();
        storage.log_param(&run_id, "split_prop", "0.8").unwrap();
        let err = storage.log_param(&run_id, "split_prop", "0.7").unwrap_err();
        assert!(matches!(err, StorageError::ParamConflict { .. }));

        let params = storage.get_params(&run_id).unwrap();
        assert_eq!(params.get("split_prop").map(String::as_str), Some("0.8"));
    }

    #[test]
    fn test_artifacts() {
        let mut storage = InMemoryStorage::new();
        let run_id = running(&mut storage);

        let hash = storage
            .log_artifact(&run_id, "best/model.json", b"{}")
            .unwrap();
        assert!(hash.starts_with("sha256-"));
        assert_eq!(storage.list_artifacts(&run_id).unwrap(), vec!["best/model.json"]);
        assert_eq!(storage.get_artifact(&run_id, "best/model.json").unwrap(), b"{}");
        assert!(matches!(
            storage.get_artifact(&run_id, "missing"),
            Err(StorageError::ArtifactNotFound(_))
        ));
        assert!(storage.log_artifact(&run_id, "../x", b"").is_err());
    }

    #[test]
    fn test_closed_run_rejects_writes() {
        let mut storage = InMemoryStorage::new();
        let run_id = running(&mut storage);
        storage.complete_run(&run_id, RunStatus::Success).unwrap();

        assert!(matches!(
            storage.log_metric(&run_id, "loss", 0, 0.1),
            Err(StorageError::InvalidState(_))
        ));
        assert!(storage.log_param(&run_id, "a", "b").is_err());
        assert!(storage.log_artifact(&run_id, "a", b"b").is_err());
    }

    #[test]
    fn test_unknown_run() {
        let mut storage = InMemoryStorage::new();
        assert!(matches!(
            storage.log_metric("run-9", "loss", 0, 0.1),
            Err(StorageError::RunNotFound(_))
        ));
        assert!(storage.get_run_status("run-9").is_err());
        assert!(storage.get_params("run-9").is_err());
    }
}
