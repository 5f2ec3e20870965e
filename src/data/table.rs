//! In-memory column tables

use ndarray::{Array1, Array2, ArrayView1, Axis};

use super::DatasetError;

/// Named `f64` columns over a row-major matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl Table {
    /// Build from column names and a `(rows, columns)` matrix
    pub fn new(columns: Vec<String>, data: Array2<f64>) -> Result<Self, DatasetError> {
        if columns.len() != data.ncols() {
            return Err(DatasetError::Schema(format!(
                "{} column names for a matrix with {} columns",
                columns.len(),
                data.ncols()
            )));
        }
        Ok(Self { columns, data })
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Values of one column
    pub fn column(&self, name: &str) -> Option<ArrayView1<f64>> {
        self.position(name).ok().map(|index| self.data.column(index))
    }

    fn position(&self, name: &str) -> Result<usize, DatasetError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    /// Feature matrix (in `features` order) and binary label vector
    ///
    /// Labels must be non-missing and take at most two distinct values.
    /// They are returned unchanged; downstream the larger value is the
    /// positive class.
    pub fn features_and_labels(
        &self,
        features: &[String],
        target: &str,
    ) -> Result<(Array2<f64>, Array1<f64>), DatasetError> {
        let indices = features
            .iter()
            .map(|name| self.position(name))
            .collect::<Result<Vec<_>, _>>()?;
        let x = self.data.select(Axis(1), &indices);
        let y = self.data.column(self.position(target)?).to_owned();

        let missing = y.iter().filter(|v| v.is_nan()).count();
        if missing > 0 {
            return Err(DatasetError::MissingTarget {
                column: target.to_string(),
                count: missing,
            });
        }

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup();
        if classes.len() > 2 {
            return Err(DatasetError::NonBinaryTarget {
                column: target.to_string(),
                classes: classes.len(),
            });
        }

        Ok((x, y))
    }
}
