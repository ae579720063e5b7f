//! Random Forest regressor

use super::tree::{DecisionTree, TreeConfig};
use crate::config::ForestSettings;
use crate::data::Dataset;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features tried per split (all if None)
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl From<&ForestSettings> for ForestConfig {
    fn from(settings: &ForestSettings) -> Self {
        Self {
            n_trees: settings.n_trees,
            max_depth: settings.max_depth,
            min_samples_split: settings.min_samples_split,
            min_samples_leaf: settings.min_samples_leaf,
            seed: settings.seed,
            ..Default::default()
        }
    }
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    feature_names: Vec<String>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Create a new random forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            feature_names: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    /// Train on a feature matrix and targets. Trees are built in parallel;
    /// tree `i` draws its bootstrap sample and feature order from `seed + i`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &[f64], feature_names: &[String]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(Error::InsufficientData("cannot fit forest on zero rows".into()));
        }

        self.feature_names = feature_names.to_vec();
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let trees: Vec<DecisionTree> = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| {
                let seed = self.config.seed.wrapping_add(i as u64);
                let mut tree = DecisionTree::new(TreeConfig {
                    max_depth: self.config.max_depth,
                    min_samples_split: self.config.min_samples_split,
                    min_samples_leaf: self.config.min_samples_leaf,
                    max_features: self.config.max_features,
                    seed,
                });

                if self.config.bootstrap {
                    tree.fit_indices(x, y, &Dataset::bootstrap_indices(n_samples, seed));
                } else {
                    tree.fit(x, y);
                }
                tree
            })
            .collect();

        self.trees = trees;

        // Aggregate feature importances
        self.feature_importances = vec![0.0; n_features];
        for tree in &self.trees {
            for (i, &imp) in tree.feature_importances().iter().enumerate() {
                self.feature_importances[i] += imp;
            }
        }

        let sum: f64 = self.feature_importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= sum;
            }
        }

        debug!(trees = self.trees.len(), samples = n_samples, "forest fitted");
        Ok(())
    }

    /// Average of every tree's prediction
    pub fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_one(features)).sum();
        sum / self.trees.len() as f64
    }

    /// Predict every row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(Error::NotFitted("random forest has no trees".into()));
        }
        let rows: Vec<ArrayView1<f64>> = x.rows().into_iter().collect();
        Ok(rows.par_iter().map(|row| self.predict_one(*row)).collect())
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Feature names with importances, most important first
    pub fn feature_importance_ranking(&self) -> Vec<(&str, f64)> {
        let mut ranking: Vec<(&str, f64)> = self
            .feature_names
            .iter()
            .zip(self.feature_importances.iter())
            .map(|(n, &i)| (n.as_str(), i))
            .collect();

        ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranking
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
