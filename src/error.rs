//! Error types for loanboost

use thiserror::Error;

use crate::data::DatasetError;
use crate::gbdt::TrainError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data access error: {0}")]
    DataAccessError(#[from] DatasetError),

    #[error("Fit error: {0}")]
    FitError(String),

    #[error("Experiment storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<TrainError> for Error {
    fn from(err: TrainError) -> Self {
        Error::FitError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_error_becomes_fit_error() {
        let err: Error = TrainError::SingleClass.into();
        assert!(matches!(err, Error::FitError(_)));
        assert!(err.to_string().starts_with("Fit error"));
    }

    #[test]
    fn test_dataset_error_becomes_data_access_error() {
        let err: Error = DatasetError::MissingColumn("income".to_string()).into();
        assert!(matches!(err, Error::DataAccessError(_)));
        assert!(err.to_string().contains("income"));
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::ConfigError("missing field `target`".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing field `target`"
        );
    }
}
