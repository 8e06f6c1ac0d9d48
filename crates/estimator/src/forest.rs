//! Random forest regressor.
//!
//! Bagged CART trees: each tree is grown on a bootstrap resample of the
//! training rows, splitting on the threshold that minimizes the summed squared
//! error of the two children. Trees are grown until nodes are pure, too
//! small to split, or `max_depth` is reached. The forest predicts the mean
//! of its trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::TrainingError;
use crate::features::{Dataset, Features, FEATURE_COUNT};

/// Growth parameters shared by every tree of a forest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            min_samples_split: 2,
            max_depth: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// A single regression tree stored as an arena of nodes; index 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Grow a tree over the given row indices (duplicates allowed).
    pub fn fit(data: &Dataset, rows: Vec<usize>, params: &ForestParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, rows, 0, params);
        tree
    }

    pub fn predict(&self, x: &Features) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if x[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn grow(
        &mut self,
        data: &Dataset,
        rows: Vec<usize>,
        depth: usize,
        params: &ForestParams,
    ) -> usize {
        let value = rows.iter().map(|&i| data.targets[i]).sum::<f64>() / rows.len() as f64;
        let index = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value });

        let depth_reached = params.max_depth.is_some_and(|max| depth >= max);
        let pure = rows.iter().all(|&i| data.targets[i] == data.targets[rows[0]]);
        if rows.len() < params.min_samples_split || depth_reached || pure {
            return index;
        }

        let Some(split) = best_split(data, &rows) else {
            return index;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| data.features[i][split.feature] <= split.threshold);

        let left = self.grow(data, left_rows, depth + 1, params);
        let right = self.grow(data, right_rows, depth + 1, params);
        self.nodes[index] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }
}

/// Best split over all features.
///
/// Minimizing child SSE is equivalent to maximizing
/// `sum_l^2 / n_l + sum_r^2 / n_r`, which needs no second pass.
fn best_split(data: &Dataset, rows: &[usize]) -> Option<SplitCandidate> {
    let total: f64 = rows.iter().map(|&i| data.targets[i]).sum();
    let n = rows.len();
    let mut best: Option<SplitCandidate> = None;

    for feature in 0..FEATURE_COUNT {
        let mut order = rows.to_vec();
        order.sort_by(|&a, &b| data.features[a][feature].total_cmp(&data.features[b][feature]));

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += data.targets[order[pos]];
            let here = data.features[order[pos]][feature];
            let next = data.features[order[pos + 1]][feature];
            if here == next {
                continue;
            }

            let left_n = (pos + 1) as f64;
            let right_n = (n - pos - 1) as f64;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / left_n + right_sum * right_sum / right_n;

            if best.map_or(true, |b| score > b.score) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    score,
                });
            }
        }
    }

    best
}

/// Mean of bootstrap-grown regression trees.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(data: &Dataset, params: &ForestParams) -> Result<Self, TrainingError> {
        if data.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        if params.n_estimators == 0 {
            return Err(TrainingError::InvalidConfig(
                "n_estimators must be positive".to_string(),
            ));
        }

        let n = data.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(data, rows, params)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn predict(&self, x: &Features) -> f64 {
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> Dataset {
        // Duration jumps from ~100 to ~500 once feature 2 passes 12.
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for hour in 8..18 {
            for rep in 0..3 {
                features.push([rep as f64, 1.0, hour as f64]);
                targets.push(if hour < 12 { 100.0 } else { 500.0 });
            }
        }
        Dataset::new(features, targets)
    }

    #[test]
    fn test_single_tree_learns_step() {
        let data = step_data();
        let rows: Vec<usize> = (0..data.len()).collect();
        let tree = RegressionTree::fit(&data, rows, &ForestParams::default());
        assert_eq!(tree.predict(&[0.0, 1.0, 9.0]), 100.0);
        assert_eq!(tree.predict(&[0.0, 1.0, 15.0]), 500.0);
    }

    #[test]
    fn test_pure_node_is_a_leaf() {
        let data = Dataset::new(vec![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]], vec![7.0, 7.0]);
        let tree = RegressionTree::fit(&data, vec![0, 1], &ForestParams::default());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[9.0, 9.0, 9.0]), 7.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let data = step_data();
        let params = ForestParams {
            max_depth: Some(0),
            ..Default::default()
        };
        let rows: Vec<usize> = (0..data.len()).collect();
        let tree = RegressionTree::fit(&data, rows, &params);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let data = step_data();
        let params = ForestParams {
            n_estimators: 20,
            ..Default::default()
        };
        let a = RandomForest::fit(&data, &params).unwrap();
        let b = RandomForest::fit(&data, &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 20);

        let low = a.predict(&[1.0, 1.0, 9.0]);
        let high = a.predict(&[1.0, 1.0, 16.0]);
        assert!(low < 200.0, "low = {low}");
        assert!(high > 400.0, "high = {high}");
    }

    #[test]
    fn test_forest_rejects_empty_data() {
        assert_eq!(
            RandomForest::fit(&Dataset::default(), &ForestParams::default()),
            Err(TrainingError::EmptyDataset)
        );
    }
}
