//! Parameter grids and sampling without replacement

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameter value (one grid coordinate)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    /// Get as float (converts int to float if needed)
    pub fn as_float(&self) -> f64 {
        match self {
            ParameterValue::Float(v) => *v,
            ParameterValue::Int(v) => *v as f64,
        }
    }

    /// Get as int; floats are not truncated
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(_) => None,
        }
    }

    /// Type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ParameterValue::Int(_) => "int",
            ParameterValue::Float(_) => "float",
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{v}"),
            // Debug keeps the trailing ".0" on whole floats
            ParameterValue::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// One point of a parameter grid, keyed by pipeline parameter name
pub type ParamSet = BTreeMap<String, ParameterValue>;

/// Cartesian grid of candidate values
///
/// Dimensions keep insertion order; the last dimension varies fastest
/// when points are enumerated by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    dims: Vec<(String, Vec<ParameterValue>)>,
}

impl ParameterGrid {
    /// Create an empty grid (a single empty point)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dimension, replacing any existing one with the same name
    pub fn add(&mut self, name: &str, values: Vec<ParameterValue>) {
        match self.dims.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.dims.push((name.to_string(), values)),
        }
    }

    /// Builder form of [`ParameterGrid::add`]
    pub fn with(mut self, name: &str, values: Vec<ParameterValue>) -> Self {
        self.add(name, values);
        self
    }

    /// Iterate over dimensions in insertion order
    pub fn dims(&self) -> impl Iterator<Item = (&str, &[ParameterValue])> {
        self.dims.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Number of grid points (saturates at `usize::MAX`)
    pub fn len(&self) -> usize {
        self.dims
            .iter()
            .fold(1usize, |acc, (_, values)| acc.saturating_mul(values.len()))
    }

    /// True when some dimension has no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the point at `index` (mixed radix over the dimensions)
    pub fn get(&self, index: usize) -> Option<ParamSet> {
        if index >= self.len() {
            return None;
        }

        let mut remainder = index;
        let mut point = ParamSet::new();
        for (name, values) in self.dims.iter().rev() {
            let radix = values.len();
            point.insert(name.clone(), values[remainder % radix]);
            remainder /= radix;
        }
        Some(point)
    }

    /// Whether every coordinate of `params` is a declared value of its dimension
    pub fn contains(&self, params: &ParamSet) -> bool {
        params.len() == self.dims.len()
            && self.dims.iter().all(|(name, values)| {
                params
                    .get(name)
                    .is_some_and(|value| values.contains(value))
            })
    }

    /// Enumerate every grid point
    pub fn configurations(&self) -> Vec<ParamSet> {
        Self::cartesian_product(&self.dims)
    }

    fn cartesian_product(dims: &[(String, Vec<ParameterValue>)]) -> Vec<ParamSet> {
        let Some(((name, values), rest)) = dims.split_first() else {
            return vec![ParamSet::new()];
        };

        let rest_configs = Self::cartesian_product(rest);

        values
            .iter()
            .flat_map(|v| {
                rest_configs.iter().map(move |config| {
                    let mut new_config = config.clone();
                    new_config.insert(name.clone(), *v);
                    new_config
                })
            })
            .collect()
    }
}

/// Sample up to `n_iter` distinct grid points
///
/// When the grid holds fewer than `n_iter` points every point is returned
/// (in random order).
pub fn sample_without_replacement<R: Rng + ?Sized>(
    grid: &ParameterGrid,
    n_iter: usize,
    rng: &mut R,
) -> Vec<ParamSet> {
    let size = grid.len();
    if size < n_iter {
        tracing::warn!(
            grid_size = size,
            n_iter,
            "parameter grid is smaller than n_iter; evaluating every point"
        );
    }
    let amount = n_iter.min(size);

    rand::seq::index::sample(rng, size, amount)
        .into_iter()
        .filter_map(|index| grid.get(index))
        .collect()
}
