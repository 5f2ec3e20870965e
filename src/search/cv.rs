//! Stratified k-fold cross-validation splits

use super::SearchError;

/// Train/test row indices of one fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified k-fold splitter without shuffling
///
/// Each fold keeps roughly the class proportions of the full label
/// vector. Rows keep their original order within every fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    /// Create a splitter producing `n_splits` folds
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Number of folds
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Split rows into folds given their class labels
    pub fn split(&self, labels: &[f64]) -> Result<Vec<Fold>, SearchError> {
        let n_samples = labels.len();
        let n_splits = self.n_splits;

        if n_splits < 2 {
            return Err(SearchError::TooFewFolds(n_splits));
        }
        if n_splits > n_samples {
            return Err(SearchError::TooManyFolds {
                n_splits,
                n_samples,
            });
        }

        let mut classes: Vec<f64> = labels.to_vec();
        classes.sort_by(f64::total_cmp);
        classes.dedup_by(|a, b| a.total_cmp(b).is_eq());

        let encoded: Vec<usize> = labels
            .iter()
            .map(|l| {
                classes
                    .binary_search_by(|c| c.total_cmp(l))
                    .unwrap_or_default()
            })
            .collect();

        let mut counts = vec![0usize; classes.len()];
        for &class in &encoded {
            counts[class] += 1;
        }

        let largest = counts.iter().copied().max().unwrap_or_default();
        if n_splits > largest {
            return Err(SearchError::NotEnoughMembers {
                n_splits,
                largest_class: largest,
            });
        }
        let smallest = counts.iter().copied().min().unwrap_or_default();
        if n_splits > smallest {
            tracing::warn!(
                smallest_class = smallest,
                n_splits,
                "the least populated class has fewer members than the number of folds"
            );
        }

        // Deal the class-sorted labels round robin across folds, which fixes
        // how many members of each class every fold receives.
        let mut sorted = encoded.clone();
        sorted.sort_unstable();
        let mut allocation = vec![vec![0usize; classes.len()]; n_splits];
        for (position, &class) in sorted.iter().enumerate() {
            allocation[position % n_splits][class] += 1;
        }

        // Hand out each class's rows, in row order, fold by fold.
        let mut test_fold = vec![0usize; n_samples];
        for class in 0..classes.len() {
            let mut members = (0..n_samples).filter(|&row| encoded[row] == class);
            for (fold, per_class) in allocation.iter().enumerate() {
                for row in members.by_ref().take(per_class[class]) {
                    test_fold[row] = fold;
                }
            }
        }

        Ok((0..n_splits)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&row| test_fold[row] == fold);
                Fold { train, test }
            })
            .collect())
    }
}
