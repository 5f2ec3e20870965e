//! Parquet file access through the Arrow reader

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, SchemaRef};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;

use super::DatasetError;

/// Schema and row count of one part file, read from its footer
pub(super) fn read_footer(path: &Path) -> Result<(SchemaRef, usize), DatasetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let rows = builder.metadata().file_metadata().num_rows();
    let rows = usize::try_from(rows)
        .map_err(|_| DatasetError::Schema(format!("{}: negative row count", path.display())))?;
    Ok((builder.schema().clone(), rows))
}

/// Whether a column of this type can be read as `f64`
pub(super) fn is_numeric(data_type: &DataType) -> bool {
    data_type.is_numeric() || matches!(data_type, DataType::Boolean | DataType::Null)
}

/// Read the named columns of one part file as `f64`, nulls as NaN
///
/// Only the requested columns are decoded. The result holds one vector per
/// requested column, in request order.
pub(super) fn read_columns(path: &Path, columns: &[&str]) -> Result<Vec<Vec<f64>>, DatasetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;

    let schema = builder.schema().clone();
    let indices = columns
        .iter()
        .map(|name| {
            schema
                .index_of(name)
                .map_err(|_| DatasetError::MissingColumn(name.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
    let reader = builder.with_projection(mask).build()?;

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
    for batch in reader {
        let batch = batch?;
        for (name, out) in columns.iter().zip(values.iter_mut()) {
            let column = batch
                .column_by_name(name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
            let as_float = cast(column.as_ref(), &DataType::Float64)?;
            let as_float = as_float
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| DatasetError::UnsupportedType {
                    column: name.to_string(),
                    got: column.data_type().to_string(),
                })?;
            out.extend(as_float.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
    }
    Ok(values)
}
