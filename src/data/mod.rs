//! Columnar dataset access
//!
//! A [`Dataset`] is a Parquet file or a directory of Parquet part files
//! sharing one schema (the layout Spark writes). Opening reads only the
//! footers; column values are decoded on [`Dataset::materialize`].

mod reader;
mod split;
mod table;

pub use split::Partition;
pub use table::Table;

use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use ndarray::Array2;
use thiserror::Error;
use tracing::{debug, info};

/// Dataset loading errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Unsupported dataset URI: {0} (expected a local path or file:// URI)")]
    UnsupportedUri(String),

    #[error("No parquet files found in {0}")]
    NoDataFiles(String),

    #[error("Schema validation failed: {0}")]
    Schema(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Unsupported column type for {column}: expected a numeric or boolean column, got {got}")]
    UnsupportedType { column: String, got: String },

    #[error("Invalid split weight: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidSplit(f64),

    #[error("Target column {column} has {count} missing values")]
    MissingTarget { column: String, count: usize },

    #[error("Target column {column} has {classes} distinct values; expected a binary target")]
    NonBinaryTarget { column: String, classes: usize },
}

/// A Parquet dataset on the local file system
#[derive(Debug, Clone)]
pub struct Dataset {
    uri: String,
    files: Vec<PathBuf>,
    schema: SchemaRef,
    n_rows: usize,
}

impl Dataset {
    /// Open a Parquet file or a directory of part files
    ///
    /// Accepts plain paths and `file://` URIs. Part files are the
    /// `*.parquet` entries of the directory, excluding hidden and
    /// underscore-prefixed names (`_SUCCESS`, `.crc` files).
    pub fn open(uri: &str) -> Result<Self, DatasetError> {
        let path = local_path(uri)?;
        let files = data_files(&path)?;

        let mut schema: Option<SchemaRef> = None;
        let mut n_rows = 0;
        for file in &files {
            let (file_schema, rows) = reader::read_footer(file)?;
            match &schema {
                Some(expected) if expected.fields() != file_schema.fields() => {
                    return Err(DatasetError::Schema(format!(
                        "{} does not match the schema of the other part files",
                        file.display()
                    )));
                }
                Some(_) => {}
                None => schema = Some(file_schema),
            }
            n_rows += rows;
        }
        let schema = schema.ok_or_else(|| DatasetError::NoDataFiles(uri.to_string()))?;

        info!(uri, files = files.len(), rows = n_rows, "opened dataset");
        Ok(Self {
            uri: uri.to_string(),
            files,
            schema,
            n_rows,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Total number of rows across part files
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Check that every column exists and can be read as numbers
    pub fn require_columns(&self, columns: &[String]) -> Result<(), DatasetError> {
        for name in columns {
            let field = self
                .schema
                .field_with_name(name)
                .map_err(|_| DatasetError::MissingColumn(name.clone()))?;
            if !reader::is_numeric(field.data_type()) {
                return Err(DatasetError::UnsupportedType {
                    column: name.clone(),
                    got: field.data_type().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Seeded random split into `(first, second)` partitions
    ///
    /// Each row lands in `first` with probability `weight`.
    pub fn random_split(&self, weight: f64, seed: u64) -> Result<(Partition, Partition), DatasetError> {
        if !(weight > 0.0 && weight < 1.0) {
            return Err(DatasetError::InvalidSplit(weight));
        }
        let (first, second) = split::random_split(self.n_rows, weight, seed);
        debug!(first = first.len(), second = second.len(), weight, seed, "split dataset");
        Ok((first, second))
    }

    /// Decode the given columns for the rows of one partition
    pub fn materialize(&self, partition: &Partition, columns: &[String]) -> Result<Table, DatasetError> {
        self.require_columns(columns)?;
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();

        let mut full: Vec<Vec<f64>> = vec![Vec::with_capacity(self.n_rows); columns.len()];
        for file in &self.files {
            for (out, part) in full.iter_mut().zip(reader::read_columns(file, &names)?) {
                out.extend(part);
            }
        }

        let mut data = Array2::from_elem((partition.len(), columns.len()), f64::NAN);
        for (j, values) in full.iter().enumerate() {
            if values.len() != self.n_rows {
                return Err(DatasetError::Schema(format!(
                    "column {} has {} values, expected {}",
                    columns[j],
                    values.len(),
                    self.n_rows
                )));
            }
            for (i, &row) in partition.rows().iter().enumerate() {
                data[[i, j]] = values[row];
            }
        }

        Table::new(columns.to_vec(), data)
    }
}

fn local_path(uri: &str) -> Result<PathBuf, DatasetError> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if uri.contains("://") {
        return Err(DatasetError::UnsupportedUri(uri.to_string()));
    }
    Ok(PathBuf::from(uri))
}

fn data_files(path: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    if !path.is_dir() {
        // Let the open surface a not-found error for missing paths
        std::fs::metadata(path)?;
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry_path = entry?.path();
        let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }
        if entry_path.is_file() && name.ends_with(".parquet") {
            files.push(entry_path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(DatasetError::NoDataFiles(path.display().to_string()));
    }
    Ok(files)
}
