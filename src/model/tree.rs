//! Regression tree (CART, squared-error splits)

use ndarray::{Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeConfig {
    /// Maximum depth of tree
    pub max_depth: usize,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Maximum features to consider for split (None = all)
    pub max_features: Option<usize>,
    /// Random seed for feature sampling
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        n_samples: usize,
        impurity: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

struct BestSplit {
    feature_idx: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
    gain: f64,
}

/// Decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
    feature_importances: Vec<f64>,
}

impl DecisionTree {
    /// Create a new decision tree with config
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            root: None,
            feature_importances: Vec::new(),
        }
    }

    /// Fit on the rows of `x` selected by `indices` (repeats allowed)
    pub fn fit_indices(&mut self, x: &Array2<f64>, y: &[f64], indices: &[usize]) {
        self.feature_importances = vec![0.0; x.ncols()];
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let root = self.build_tree(x, y, indices, 0, &mut rng);
        self.root = Some(root);

        // Normalize feature importances
        let sum: f64 = self.feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= sum;
            }
        }
    }

    /// Fit on every row of `x`
    pub fn fit(&mut self, x: &Array2<f64>, y: &[f64]) {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_indices(x, y, &indices);
    }

    /// Build tree recursively
    fn build_tree(
        &mut self,
        x: &Array2<f64>,
        y: &[f64],
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = indices.len();
        let (mean, impurity) = mean_and_mse(indices.iter().map(|&i| y[i]));

        if depth >= self.config.max_depth
            || n < self.config.min_samples_split
            || impurity < 1e-10
        {
            return TreeNode::Leaf {
                value: mean,
                n_samples: n,
            };
        }

        match self.find_best_split(x, y, indices, impurity, rng) {
            Some(split) => {
                self.feature_importances[split.feature_idx] += split.gain * n as f64;

                let left = self.build_tree(x, y, &split.left, depth + 1, rng);
                let right = self.build_tree(x, y, &split.right, depth + 1, rng);

                TreeNode::Split {
                    feature_idx: split.feature_idx,
                    threshold: split.threshold,
                    n_samples: n,
                    impurity,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => TreeNode::Leaf {
                value: mean,
                n_samples: n,
            },
        }
    }

    /// Best variance-reducing split over a random subset of features.
    ///
    /// Each candidate feature is scanned once in sorted order with running
    /// sums, so a node costs O(n log n) per feature.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &[f64],
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let n_features = x.ncols();
        let max_features = self.config.max_features.unwrap_or(n_features).clamp(1, n_features.max(1));
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut feature_indices: Vec<usize> = (0..n_features).collect();
        feature_indices.shuffle(rng);
        feature_indices.truncate(max_features);

        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();

        let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, gain)
        let mut sorted = indices.to_vec();

        for &feature_idx in &feature_indices {
            sorted.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for k in 1..n {
                let prev = sorted[k - 1];
                left_sum += y[prev];
                left_sq += y[prev] * y[prev];

                let (lo, hi) = (x[[prev, feature_idx]], x[[sorted[k], feature_idx]]);
                if lo == hi || k < min_leaf || n - k < min_leaf {
                    continue;
                }

                let n_left = k as f64;
                let n_right = (n - k) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;

                let sse_left = left_sq - left_sum * left_sum / n_left;
                let sse_right = right_sq - right_sum * right_sum / n_right;
                let gain = parent_impurity - (sse_left + sse_right) / n as f64;

                if gain > best.map_or(0.0, |(_, _, g)| g) {
                    best = Some((feature_idx, (lo + hi) / 2.0, gain));
                }
            }
        }

        best.map(|(feature_idx, threshold, gain)| {
            let (left, right) = indices
                .iter()
                .partition(|&&i| x[[i, feature_idx]] <= threshold);
            BestSplit {
                feature_idx,
                threshold,
                left,
                right,
                gain,
            }
        })
    }

    /// Predict for a single sample
    pub fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
        let mut node = match &self.root {
            Some(node) => node,
            None => return 0.0,
        };

        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if features[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Predict every row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows().into_iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// Mean and population variance in one pass
fn mean_and_mse(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut n, mut sum, mut sq) = (0usize, 0.0, 0.0);
    for v in values {
        n += 1;
        sum += v;
        sq += v * v;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    (mean, (sq / n as f64 - mean * mean).max(0.0))
}
