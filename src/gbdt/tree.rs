//! Regression trees and the leaf-wise grower

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::binning::BinnedMatrix;
use super::gain::GainParams;

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` (or missing) go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node holding a raw-score contribution
    Leaf { value: f64 },
}

/// A single regression tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Tree with a single leaf
    pub fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { value }],
        }
    }

    /// All nodes, root first
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Length of the longest root-to-leaf path (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        walk(&self.nodes, 0)
    }

    /// Contribution of one row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // NaN compares false and goes left
                    index = if row[feature] > threshold { right } else { left };
                }
            }
        }
    }

    /// Largest feature index referenced by a split
    pub(crate) fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

/// Growth limits for one tree
#[derive(Debug, Clone)]
pub(crate) struct GrowerParams {
    pub gain: GainParams,
    pub learning_rate: f64,
    pub max_depth: Option<usize>,
    pub num_leaves: usize,
}

#[derive(Debug, Clone, Copy)]
struct SplitInfo {
    feature: usize,
    bin: u16,
    gain: f64,
}

#[derive(Debug)]
struct LeafCandidate {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    split: Option<SplitInfo>,
}

/// Grows trees best-first: the leaf with the largest gain is split next
pub(crate) struct TreeGrower<'a> {
    data: &'a BinnedMatrix,
    params: &'a GrowerParams,
}

impl<'a> TreeGrower<'a> {
    pub(crate) fn new(data: &'a BinnedMatrix, params: &'a GrowerParams) -> Self {
        Self { data, params }
    }

    /// Fit one tree to the given gradients, splitting only on `features`
    pub(crate) fn grow(&self, grad: &[f64], hess: &[f64], features: &[usize]) -> Tree {
        let rows: Vec<usize> = (0..grad.len()).collect();
        let mut nodes = vec![Node::Leaf {
            value: self.leaf_value(grad, hess, &rows),
        }];

        let root_split = self.find_split(grad, hess, &rows, 0, features);
        let mut leaves = vec![LeafCandidate {
            node: 0,
            rows,
            depth: 0,
            split: root_split,
        }];

        while leaves.len() < self.params.num_leaves {
            let Some(position) = best_candidate(&leaves) else {
                break;
            };
            let candidate = leaves.swap_remove(position);
            let Some(split) = candidate.split else {
                break;
            };

            let column = self.data.column(split.feature);
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = candidate
                .rows
                .iter()
                .partition(|&&row| column[row] <= split.bin);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf {
                value: self.leaf_value(grad, hess, &left_rows),
            });
            nodes.push(Node::Leaf {
                value: self.leaf_value(grad, hess, &right_rows),
            });
            nodes[candidate.node] = Node::Split {
                feature: split.feature,
                threshold: self.data.mapper(split.feature).threshold(split.bin),
                left,
                right,
            };

            let depth = candidate.depth + 1;
            for (node, rows) in [(left, left_rows), (right, right_rows)] {
                let split = self.find_split(grad, hess, &rows, depth, features);
                leaves.push(LeafCandidate {
                    node,
                    rows,
                    depth,
                    split,
                });
            }
        }

        Tree { nodes }
    }

    fn leaf_value(&self, grad: &[f64], hess: &[f64], rows: &[usize]) -> f64 {
        let (g, h) = rows
            .iter()
            .fold((0.0, 0.0), |(g, h), &row| (g + grad[row], h + hess[row]));
        self.params.gain.leaf_weight(g, h) * self.params.learning_rate
    }

    /// Best histogram split of a leaf, if any has positive gain
    fn find_split(
        &self,
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        depth: usize,
        features: &[usize],
    ) -> Option<SplitInfo> {
        if self.params.max_depth.is_some_and(|limit| depth >= limit) {
            return None;
        }
        let gain_params = &self.params.gain;
        if rows.len() < 2 * gain_params.min_child_samples {
            return None;
        }

        let (grad_total, hess_total) = rows
            .iter()
            .fold((0.0, 0.0), |(g, h), &row| (g + grad[row], h + hess[row]));

        let mut best: Option<SplitInfo> = None;
        for &feature in features {
            let n_bins = self.data.mapper(feature).n_bins();
            if n_bins < 2 {
                continue;
            }

            let column = self.data.column(feature);
            let mut histogram = vec![(0.0f64, 0.0f64, 0usize); n_bins];
            for &row in rows {
                let slot = &mut histogram[usize::from(column[row])];
                slot.0 += grad[row];
                slot.1 += hess[row];
                slot.2 += 1;
            }

            let (mut grad_left, mut hess_left, mut count_left) = (0.0, 0.0, 0usize);
            for (bin, &(g, h, c)) in histogram.iter().enumerate().take(n_bins - 1) {
                grad_left += g;
                hess_left += h;
                count_left += c;
                let count_right = rows.len() - count_left;
                let hess_right = hess_total - hess_left;

                if !gain_params.is_valid_split(hess_left, hess_right, count_left, count_right) {
                    continue;
                }
                let gain = gain_params.compute_gain(
                    grad_left,
                    hess_left,
                    grad_total - grad_left,
                    hess_right,
                );
                if gain > best.map_or(0.0, |b| b.gain) {
                    best = Some(SplitInfo {
                        feature,
                        bin: bin as u16,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Index of the splittable leaf with the largest gain (first wins ties)
fn best_candidate(leaves: &[LeafCandidate]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (position, leaf) in leaves.iter().enumerate() {
        if let Some(split) = leaf.split {
            if best.map_or(true, |(_, gain)| split.gain > gain) {
                best = Some((position, split.gain));
            }
        }
    }
    best.map(|(position, _)| position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn grower_params(num_leaves: usize, max_depth: Option<usize>) -> GrowerParams {
        GrowerParams {
            gain: GainParams {
                min_child_samples: 1,
                ..GainParams::default()
            },
            learning_rate: 1.0,
            max_depth,
            num_leaves,
        }
    }

    /// Gradients of a squared loss pulling rows toward `targets`
    fn gradients(targets: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (targets.iter().map(|t| -t).collect(), vec![1.0; targets.len()])
    }

    #[test]
    fn test_single_split_recovers_step() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let data = BinnedMatrix::fit(x.view(), 255);
        let params = grower_params(2, None);
        let (grad, hess) = gradients(&[-1.0, -1.0, 1.0, 1.0]);

        let tree = TreeGrower::new(&data, &params).grow(&grad, &hess, &[0]);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        assert!((tree.predict_row(array![1.5].view()) + 1.0).abs() < 1e-12);
        assert!((tree.predict_row(array![3.5].view()) - 1.0).abs() < 1e-12);
        match tree.nodes()[0] {
            Node::Split { threshold, .. } => assert!((threshold - 2.5).abs() < 1e-12),
            Node::Leaf { .. } => panic!("root should split"),
        }
    }

    #[test]
    fn test_missing_value_goes_left() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let data = BinnedMatrix::fit(x.view(), 255);
        let params = grower_params(2, None);
        let (grad, hess) = gradients(&[-1.0, -1.0, 1.0, 1.0]);

        let tree = TreeGrower::new(&data, &params).grow(&grad, &hess, &[0]);
        assert!((tree.predict_row(array![f64::NAN].view()) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_num_leaves_limit() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let targets: Vec<f64> = (0..16).map(|i| (i % 4) as f64).collect();
        let data = BinnedMatrix::fit(x.view(), 255);
        let (grad, hess) = gradients(&targets);

        for limit in [2, 3, 5] {
            let params = grower_params(limit, None);
            let tree = TreeGrower::new(&data, &params).grow(&grad, &hess, &[0]);
            assert!(tree.n_leaves() <= limit);
        }
    }

    #[test]
    fn test_max_depth_limit() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let targets: Vec<f64> = (0..32).map(|i| ((i * 7) % 5) as f64).collect();
        let data = BinnedMatrix::fit(x.view(), 255);
        let (grad, hess) = gradients(&targets);
        let params = grower_params(31, Some(2));

        let tree = TreeGrower::new(&data, &params).grow(&grad, &hess, &[0]);
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_min_child_samples_blocks_split() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let data = BinnedMatrix::fit(x.view(), 255);
        let mut params = grower_params(31, None);
        params.gain.min_child_samples = 3;
        let (grad, hess) = gradients(&[-1.0, -1.0, 1.0, 1.0]);

        let tree = TreeGrower::new(&data, &params).grow(&grad, &hess, &[0]);
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_min_split_gain_blocks_split() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let data = BinnedMatrix::fit(x.view(), 255);
        let mut params = grower_params(31, None);
        params.gain.min_split_gain = 100.0;
        let (grad, hess) = gradients(&[-1.0, -1.0, 1.0, 1.0]);

        let tree = TreeGrower::new(&data, &params).grow(&grad, &hess, &[0]);
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_only_allowed_features_are_used() {
        let x = Array2::from_shape_fn((8, 2), |(i, j)| if j == 0 { i as f64 } else { 0.0 });
        let data = BinnedMatrix::fit(x.view(), 255);
        let params = grower_params(4, None);
        let targets: Vec<f64> = (0..8).map(|i| if i < 4 { -1.0 } else { 1.0 }).collect();
        let (grad, hess) = gradients(&targets);

        let tree = TreeGrower::new(&data, &params).grow(&grad, &hess, &[1]);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.max_feature(), None);
    }

    #[test]
    fn test_tree_serde_round_trip() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let data = BinnedMatrix::fit(x.view(), 255);
        let params = grower_params(2, None);
        let (grad, hess) = gradients(&[-1.0, -1.0, 1.0, 1.0]);
        let tree = TreeGrower::new(&data, &params).grow(&grad, &hess, &[0]);

        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains("\"kind\":\"split\""));
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
