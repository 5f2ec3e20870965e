//! Evaluation metrics

use ndarray::ArrayView1;

/// Area under the ROC curve
///
/// Computed from the Mann-Whitney U statistic with average ranks, so tied
/// scores count half. The larger of the two label values is the positive
/// class. Returns `None` when the AUC is undefined: mismatched lengths,
/// NaN labels or scores, or anything other than exactly two classes.
pub fn roc_auc(labels: ArrayView1<f64>, scores: ArrayView1<f64>) -> Option<f64> {
    if labels.len() != scores.len() || labels.is_empty() {
        return None;
    }
    if labels.iter().chain(scores.iter()).any(|v| v.is_nan()) {
        return None;
    }

    let mut classes: Vec<f64> = labels.to_vec();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    let &[_, positive] = classes.as_slice() else {
        return None;
    };

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Sum of 1-based average ranks over the positive rows
    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let average_rank = (start + 1 + end) as f64 / 2.0;
        rank_sum += order[start..end]
            .iter()
            .filter(|&&row| labels[row] == positive)
            .count() as f64
            * average_rank;
        start = end;
    }

    let n_pos = labels.iter().filter(|&&l| l == positive).count() as f64;
    let n_neg = labels.len() as f64 - n_pos;
    let u = rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    #[test]
    fn test_auc_perfect() {
        let auc = roc_auc(
            array![1.0, 1.0, 0.0, 0.0].view(),
            array![0.9, 0.8, 0.3, 0.2].view(),
        );
        assert_relative_eq!(auc.unwrap(), 1.0);
    }

    #[test]
    fn test_auc_worst() {
        let auc = roc_auc(
            array![1.0, 1.0, 0.0, 0.0].view(),
            array![0.2, 0.3, 0.8, 0.9].view(),
        );
        assert_relative_eq!(auc.unwrap(), 0.0);
    }

    #[test]
    fn test_auc_all_tied() {
        let auc = roc_auc(
            array![1.0, 0.0, 1.0, 0.0].view(),
            array![0.5, 0.5, 0.5, 0.5].view(),
        );
        assert_relative_eq!(auc.unwrap(), 0.5);
    }

    #[test]
    fn test_auc_partial_ties() {
        // Pairs (pos, neg): (0.8, 0.4) win, (0.8, 0.8) tie, (0.4, 0.4) tie, (0.4, 0.8) loss
        let auc = roc_auc(
            array![1.0, 1.0, 0.0, 0.0].view(),
            array![0.8, 0.4, 0.4, 0.8].view(),
        );
        assert_relative_eq!(auc.unwrap(), 0.5);

        let auc = roc_auc(
            array![1.0, 0.0, 0.0, 1.0, 0.0].view(),
            array![0.9, 0.1, 0.9, 0.5, 0.3].view(),
        );
        // pos 0.9 vs negs {0.1, 0.9, 0.3}: 1 + 0.5 + 1; pos 0.5: 1 + 0 + 1
        assert_relative_eq!(auc.unwrap(), 4.5 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_auc_matches_pairwise_count() {
        let labels = array![0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let scores = array![0.1, 0.7, 0.3, 0.3, 0.9, 0.65, 0.2, 0.65];

        let mut concordant = 0.0;
        let mut pairs = 0.0;
        for i in 0..labels.len() {
            for j in 0..labels.len() {
                if labels[i] == 1.0 && labels[j] == 0.0 {
                    pairs += 1.0;
                    if scores[i] > scores[j] {
                        concordant += 1.0;
                    } else if scores[i] == scores[j] {
                        concordant += 0.5;
                    }
                }
            }
        }
        assert_relative_eq!(
            roc_auc(labels.view(), scores.view()).unwrap(),
            concordant / pairs,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_positive_class_is_larger_label() {
        let auc = roc_auc(array![2.0, -1.0].view(), array![0.9, 0.1].view());
        assert_relative_eq!(auc.unwrap(), 1.0);
    }

    #[test]
    fn test_auc_undefined() {
        assert!(roc_auc(array![1.0, 1.0].view(), array![0.2, 0.4].view()).is_none());
        assert!(roc_auc(array![0.0, 1.0, 2.0].view(), array![0.1, 0.2, 0.3].view()).is_none());
        assert!(roc_auc(array![0.0, 1.0].view(), array![0.1].view()).is_none());
        assert!(roc_auc(array![0.0, 1.0].view(), array![0.1, f64::NAN].view()).is_none());
        let empty = Array1::<f64>::zeros(0);
        assert!(roc_auc(empty.view(), empty.view()).is_none());
    }
}
