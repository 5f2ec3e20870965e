//! File-System Storage Backend
//!
//! Persists experiments as a directory tree:
//!
//! ```text
//! <root>/<experiment_id>/meta.json
//! <root>/<experiment_id>/<run_id>/meta.json
//! <root>/<experiment_id>/<run_id>/metrics/<key>     "<timestamp_ms> <value> <step>" per line
//! <root>/<experiment_id>/<run_id>/params/<key>      raw value
//! <root>/<experiment_id>/<run_id>/artifacts/<path>  raw bytes
//! ```
//!
//! Experiment ids are sequential integers; run ids are 32 hex characters.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{
    artifact_hash, check_transition, check_writable, validate_artifact_path, validate_key,
    ExperimentStorage, MetricPoint, Result, RunStatus, StorageError,
};

const META_FILE: &str = "meta.json";
const METRICS_DIR: &str = "metrics";
const PARAMS_DIR: &str = "params";
const ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Serialize, Deserialize)]
struct ExperimentMeta {
    experiment_id: String,
    name: String,
    config: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunMeta {
    run_id: String,
    experiment_id: String,
    status: RunStatus,
    created_at: DateTime<Utc>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

/// Directory-backed experiment storage
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    run_counter: AtomicU64,
}

impl FileStorage {
    /// Open (creating if needed) a tracking directory
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            run_counter: AtomicU64::new(0),
        })
    }

    /// Tracking directory root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a run's records
    pub fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        if run_id.len() != 32 || !run_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::RunNotFound(run_id.to_string()));
        }
        for experiment in self.experiment_dirs()? {
            let candidate = experiment.join(run_id);
            if candidate.join(META_FILE).is_file() {
                return Ok(candidate);
            }
        }
        Err(StorageError::RunNotFound(run_id.to_string()))
    }

    fn experiment_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs: Vec<(u64, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let id = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(id) = id {
                if path.join(META_FILE).is_file() {
                    dirs.push((id, path));
                }
            }
        }
        dirs.sort();
        Ok(dirs.into_iter().map(|(_, path)| path).collect())
    }

    fn new_run_id(&self, experiment_id: &str) -> String {
        let counter = self.run_counter.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let digest = Sha256::digest(format!("{experiment_id}:{now}:{counter}:{}", std::process::id()));
        hex::encode(&digest[..16])
    }

    fn read_run_meta(&self, run_id: &str) -> Result<(PathBuf, RunMeta)> {
        let dir = self.run_dir(run_id)?;
        let meta = read_json(&dir.join(META_FILE))?;
        Ok((dir, meta))
    }

    fn writable_run_dir(&self, run_id: &str) -> Result<PathBuf> {
        let (dir, meta) = self.read_run_meta(run_id)?;
        check_writable(run_id, meta.status)?;
        Ok(dir)
    }

    fn transition(&self, run_id: &str, next: RunStatus) -> Result<()> {
        let (dir, mut meta) = self.read_run_meta(run_id)?;
        check_transition(run_id, meta.status, next)?;
        meta.status = next;
        if next == RunStatus::Running {
            meta.start_time = Some(Utc::now());
        } else {
            meta.end_time = Some(Utc::now());
        }
        write_json(&dir.join(META_FILE), &meta)
    }
}

impl ExperimentStorage for FileStorage {
    fn create_experiment(
        &mut self,
        name: &str,
        config: Option<serde_json::Value>,
    ) -> Result<String> {
        let next = self
            .experiment_dirs()?
            .iter()
            .filter_map(|p| p.file_name()?.to_str()?.parse::<u64>().ok())
            .max()
            .map_or(0, |id| id + 1);
        let experiment_id = next.to_string();

        let dir = self.root.join(&experiment_id);
        fs::create_dir_all(&dir)?;
        write_json(
            &dir.join(META_FILE),
            &ExperimentMeta {
                experiment_id: experiment_id.clone(),
                name: name.to_string(),
                config,
                created_at: Utc::now(),
            },
        )?;
        Ok(experiment_id)
    }

    fn find_experiment(&self, name: &str) -> Result<Option<String>> {
        for dir in self.experiment_dirs()? {
            let meta: ExperimentMeta = read_json(&dir.join(META_FILE))?;
            if meta.name == name {
                return Ok(Some(meta.experiment_id));
            }
        }
        Ok(None)
    }

    fn create_run(&mut self, experiment_id: &str) -> Result<String> {
        let experiment_dir = self.root.join(experiment_id);
        if experiment_id.parse::<u64>().is_err() || !experiment_dir.join(META_FILE).is_file() {
            return Err(StorageError::ExperimentNotFound(experiment_id.to_string()));
        }

        let run_id = self.new_run_id(experiment_id);
        let dir = experiment_dir.join(&run_id);
        for sub in [METRICS_DIR, PARAMS_DIR, ARTIFACTS_DIR] {
            fs::create_dir_all(dir.join(sub))?;
        }
        write_json(
            &dir.join(META_FILE),
            &RunMeta {
                run_id: run_id.clone(),
                experiment_id: experiment_id.to_string(),
                status: RunStatus::Pending,
                created_at: Utc::now(),
                start_time: None,
                end_time: None,
            },
        )?;
        Ok(run_id)
    }

    fn start_run(&mut self, run_id: &str) -> Result<()> {
        self.transition(run_id, RunStatus::Running)
    }

    fn complete_run(&mut self, run_id: &str, status: RunStatus) -> Result<()> {
        self.transition(run_id, status)
    }

    fn log_metric(&mut self, run_id: &str, key: &str, step: u64, value: f64) -> Result<()> {
        validate_key(key)?;
        let dir = self.writable_run_dir(run_id)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(METRICS_DIR).join(key))?;
        writeln!(file, "{} {} {}", Utc::now().timestamp_millis(), value, step)?;
        Ok(())
    }

    fn log_param(&mut self, run_id: &str, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.writable_run_dir(run_id)?.join(PARAMS_DIR).join(key);

        match fs::read_to_string(&path) {
            Ok(existing) if existing == value => Ok(()),
            Ok(existing) => Err(StorageError::ParamConflict {
                key: key.to_string(),
                existing,
                new: value.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(fs::write(&path, value)?),
            Err(e) => Err(e.into()),
        }
    }

    fn log_artifact(&mut self, run_id: &str, path: &str, data: &[u8]) -> Result<String> {
        validate_artifact_path(path)?;
        let target = self.writable_run_dir(run_id)?.join(ARTIFACTS_DIR).join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, data)?;
        Ok(artifact_hash(data))
    }

    fn get_metrics(&self, run_id: &str, key: &str) -> Result<Vec<MetricPoint>> {
        validate_key(key)?;
        let path = self.run_dir(run_id)?.join(METRICS_DIR).join(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut points = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_metric_line(line).ok_or_else(|| {
                StorageError::Corrupt(format!("{}: bad metric line {line:?}", path.display()))
            }))
            .collect::<Result<Vec<_>>>()?;
        points.sort_by_key(|p| p.step);
        Ok(points)
    }

    fn get_params(&self, run_id: &str) -> Result<BTreeMap<String, String>> {
        let dir = self.run_dir(run_id)?.join(PARAMS_DIR);
        let mut params = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                params.insert(name.to_string(), fs::read_to_string(&path)?);
            }
        }
        Ok(params)
    }

    fn get_run_status(&self, run_id: &str) -> Result<RunStatus> {
        Ok(self.read_run_meta(run_id)?.1.status)
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<String>> {
        let base = self.run_dir(run_id)?.join(ARTIFACTS_DIR);
        let mut found = Vec::new();
        collect_files(&base, &base, &mut found)?;
        found.sort();
        Ok(found)
    }

    fn get_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        validate_artifact_path(path)?;
        let target = self.run_dir(run_id)?.join(ARTIFACTS_DIR).join(path);
        fs::read(&target).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::ArtifactNotFound(format!("{run_id}/{path}")),
            _ => e.into(),
        })
    }
}

fn parse_metric_line(line: &str) -> Option<MetricPoint> {
    let mut fields = line.split_whitespace();
    let timestamp = DateTime::from_timestamp_millis(fields.next()?.parse().ok()?)?;
    let value: f64 = fields.next()?.parse().ok()?;
    let step: u64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(MetricPoint::with_timestamp(step, value, timestamp))
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write through a temporary file so readers never see a partial record
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (TempDir, FileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path().join("mlruns")).unwrap();
        (dir, storage)
    }

    fn running(storage: &mut FileStorage) -> String {
        let exp_id = storage.create_experiment("Default", None).unwrap();
        let run_id = storage.create_run(&exp_id).unwrap();
        storage.start_run(&run_id).unwrap();
        run_id
    }

    #[test]
    fn test_experiment_ids_are_sequential() {
        let (_dir, mut storage) = storage();
        assert_eq!(storage.create_experiment("Default", None).unwrap(), "0");
        assert_eq!(storage.create_experiment("loans", None).unwrap(), "1");
        assert_eq!(storage.find_experiment("loans").unwrap(), Some("1".to_string()));
        assert_eq!(storage.find_experiment("missing").unwrap(), None);
    }

    #[test]
    fn test_run_layout_on_disk() {
        let (_dir, mut storage) = storage();
        let run_id = running(&mut storage);
        assert_eq!(run_id.len(), 32);

        let run_dir = storage.run_dir(&run_id).unwrap();
        assert_eq!(run_dir, storage.root().join("0").join(&run_id));
        assert!(run_dir.join("meta.json").is_file());

        storage.log_metric(&run_id, "ROC_AUC_test", 0, 0.75).unwrap();
        let line = fs::read_to_string(run_dir.join("metrics/ROC_AUC_test")).unwrap();
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], "0.75");
        assert_eq!(fields[2], "0");
    }

    #[test]
    fn test_lifecycle_persists() {
        let (dir, mut storage) = storage();
        let run_id = running(&mut storage);
        storage.complete_run(&run_id, RunStatus::Success).unwrap();

        let reopened = FileStorage::open(dir.path().join("mlruns")).unwrap();
        assert_eq!(reopened.get_run_status(&run_id).unwrap(), RunStatus::Success);

        let meta: RunMeta = read_json(&reopened.run_dir(&run_id).unwrap().join(META_FILE)).unwrap();
        assert!(meta.start_time.is_some());
        assert!(meta.end_time.is_some());
    }

    #[test]
    fn test_metrics_round_trip() {
        let (_dir, mut storage) = storage();
        let run_id = running(&mut storage);
        storage.log_metric(&run_id, "loss", 1, 0.25).unwrap();
        storage.log_metric(&run_id, "loss", 0, f64::NAN).unwrap();

        let points = storage.get_metrics(&run_id, "loss").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].step, 0);
        assert!(points[0].value.is_nan());
        assert!((points[1].value - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_params_are_write_once() {
        let (_dir, mut storage) = storage();
        let run_id = running(&mut storage);
        storage.log_param(&run_id, "features", "[\"f1\",\"f2\"]").unwrap();
        storage.log_param(&run_id, "features", "[\"f1\",\"f2\"]").unwrap();
        assert!(matches!(
            storage.log_param(&run_id, "features", "[]"),
            Err(StorageError::ParamConflict { .. })
        ));
        let params = storage.get_params(&run_id).unwrap();
        assert_eq!(params["features"], "[\"f1\",\"f2\"]");
    }

    #[test]
    fn test_nested_artifacts() {
        let (_dir, mut storage) = storage();
        let run_id = running(&mut storage);
        storage
            .log_artifact(&run_id, "best-5-fold-cross-validated-GbdtClassifier/model.json", b"{}")
            .unwrap();
        storage.log_artifact(&run_id, "notes.txt", b"hi").unwrap();

        assert_eq!(
            storage.list_artifacts(&run_id).unwrap(),
            vec![
                "best-5-fold-cross-validated-GbdtClassifier/model.json".to_string(),
                "notes.txt".to_string()
            ]
        );
        assert_eq!(storage.get_artifact(&run_id, "notes.txt").unwrap(), b"hi");
        assert!(matches!(
            storage.get_artifact(&run_id, "nope"),
            Err(StorageError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn test_closed_run_rejects_writes() {
        let (_dir, mut storage) = storage();
        let run_id = running(&mut storage);
        storage.complete_run(&run_id, RunStatus::Failed).unwrap();
        assert!(matches!(
            storage.log_metric(&run_id, "loss", 0, 1.0),
            Err(StorageError::InvalidState(_))
        ));
    }

    #[test]
    fn test_unknown_ids() {
        let (_dir, mut storage) = storage();
        assert!(matches!(
            storage.create_run("7"),
            Err(StorageError::ExperimentNotFound(_))
        ));
        assert!(matches!(
            storage.get_run_status("../../etc"),
            Err(StorageError::RunNotFound(_))
        ));
        assert!(matches!(
            storage.get_run_status(&"0".repeat(32)),
            Err(StorageError::RunNotFound(_))
        ));
    }
}
