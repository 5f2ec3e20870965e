//! Seeded random row partitioning

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A subset of dataset rows, in ascending row order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    rows: Vec<usize>,
}

impl Partition {
    pub fn new(rows: Vec<usize>) -> Self {
        Self { rows }
    }

    /// Row indices into the full dataset
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Send each row to the first partition with probability `weight`
///
/// Rows draw from one generator in row order, so the same row count,
/// weight and seed always give the same split.
pub(super) fn random_split(n_rows: usize, weight: f64, seed: u64) -> (Partition, Partition) {
    let mut rng = StdRng::seed_from_u64(seed);
    let (first, second): (Vec<usize>, Vec<usize>) =
        (0..n_rows).partition(|_| rng.random::<f64>() < weight);
    (Partition::new(first), Partition::new(second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_is_deterministic() {
        assert_eq!(random_split(500, 0.8, 7), random_split(500, 0.8, 7));
        assert_ne!(random_split(500, 0.8, 7), random_split(500, 0.8, 8));
    }

    #[test]
    fn test_split_covers_every_row_once() {
        let (train, test) = random_split(1000, 0.8, 7);
        assert_eq!(train.len() + test.len(), 1000);

        let mut all: Vec<usize> = train.rows().iter().chain(test.rows()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
        assert!(train.rows().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_split_proportion() {
        let (train, test) = random_split(10_000, 0.8, 7);
        let share = train.len() as f64 / 10_000.0;
        assert!((share - 0.8).abs() < 0.02, "train share {share}");
        assert!(!test.is_empty());
    }
}
