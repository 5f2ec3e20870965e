//! Feature quantization into histogram bins

use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Maps raw feature values of one column to bin indices
///
/// Bin `i` holds values in `(upper_bounds[i - 1], upper_bounds[i]]`. The last
/// bound is always `+inf`. Missing values (NaN) fall in bin 0, so they end
/// up on the left side of every split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMapper {
    upper_bounds: Vec<f64>,
}

impl BinMapper {
    /// Derive bin bounds from a column of training values
    ///
    /// With at most `max_bin` distinct values every value gets its own bin,
    /// bounded by the midpoint to the next value. Otherwise bounds are taken
    /// at evenly spaced quantiles of the distinct values.
    pub fn fit(values: ArrayView1<f64>, max_bin: usize) -> Self {
        let mut distinct: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();

        let max_bin = max_bin.max(2);
        let mut upper_bounds: Vec<f64> = if distinct.len() <= max_bin {
            distinct
                .windows(2)
                .map(|pair| pair[0] + (pair[1] - pair[0]) / 2.0)
                .collect()
        } else {
            let n_cuts = max_bin - 1;
            let mut cuts: Vec<f64> = (1..=n_cuts)
                .map(|i| distinct[(i * distinct.len() / (n_cuts + 1)).min(distinct.len() - 1)])
                .collect();
            cuts.dedup();
            cuts
        };
        upper_bounds.retain(|b| b.is_finite());
        upper_bounds.push(f64::INFINITY);

        Self { upper_bounds }
    }

    /// Number of bins
    pub fn n_bins(&self) -> usize {
        self.upper_bounds.len()
    }

    /// Bin index of a raw value
    #[inline]
    pub fn bin(&self, value: f64) -> u16 {
        if value.is_nan() {
            return 0;
        }
        let index = self.upper_bounds.partition_point(|&bound| bound < value);
        index.min(self.upper_bounds.len() - 1) as u16
    }

    /// Split threshold equivalent to "bin <= `bin`"
    pub fn threshold(&self, bin: u16) -> f64 {
        self.upper_bounds[usize::from(bin)]
    }
}

/// Training matrix quantized column by column
#[derive(Debug, Clone)]
pub(crate) struct BinnedMatrix {
    mappers: Vec<BinMapper>,
    columns: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    pub(crate) fn fit(x: ArrayView2<f64>, max_bin: usize) -> Self {
        let (mappers, columns) = x
            .axis_iter(Axis(1))
            .map(|column| {
                let mapper = BinMapper::fit(column, max_bin);
                let bins: Vec<u16> = column.iter().map(|&v| mapper.bin(v)).collect();
                (mapper, bins)
            })
            .unzip();
        Self { mappers, columns }
    }

    pub(crate) fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn mapper(&self, feature: usize) -> &BinMapper {
        &self.mappers[feature]
    }

    pub(crate) fn column(&self, feature: usize) -> &[u16] {
        &self.columns[feature]
    }
}
