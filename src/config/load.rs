//! Loading the job configuration from YAML

use std::fs;
use std::path::Path;

use super::schema::JobConfig;
use super::validate::validate_config;
use crate::error::{Error, Result};

/// Load and validate a job configuration file
///
/// # Example
///
/// ```no_run
/// use loanboost::config::load_config;
///
/// let config = load_config("config.yaml")?;
/// println!("{} features", config.features.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<JobConfig> {
    let config = read_config(config_path)?;
    validate(&config)?;
    Ok(config)
}

/// Read and deserialize a configuration file without validating it
///
/// Missing or mistyped keys still fail here; range and value checks are
/// left to the caller.
pub fn read_config<P: AsRef<Path>>(config_path: P) -> Result<JobConfig> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    deserialize(&yaml_content)
}

/// Parse and validate a job configuration from a YAML string
pub fn parse_config(yaml: &str) -> Result<JobConfig> {
    let config = deserialize(yaml)?;
    validate(&config)?;
    Ok(config)
}

fn deserialize(yaml: &str) -> Result<JobConfig> {
    serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {e}")))
}

fn validate(config: &JobConfig) -> Result<()> {
    validate_config(config).map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))
}
