//! Isolation forest density model
//!
//! Scores points by how quickly random axis splits isolate them from the
//! bulk of the training data. Points with short average path lengths are
//! outliers. The decision threshold is the `(1 - contamination)` quantile
//! of the training scores, so roughly `contamination` of the training set
//! sits above it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Euler-Mascheroni constant used by the average path length estimate
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Subsample size cap per tree
const DEFAULT_MAX_SAMPLES: usize = 256;

/// Unsupervised outlier model that is refit from a full training set
///
/// Implementations must be cheap enough to refit on every qualifying tick;
/// an incremental model can replace the forest without changing callers.
pub trait DensityModel: Send {
    /// Discard any previous state and train on `samples`
    fn fit(&mut self, samples: &[f64]);

    /// Classify a value against the most recent fit
    fn is_outlier(&self, value: f64) -> bool;

    /// Whether `fit` has been called with a non-empty training set
    fn is_fitted(&self) -> bool;
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { size: usize },
    Split { at: f64, left: usize, right: usize },
}

/// A single isolation tree stored as an arena of nodes
#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
    root: usize,
}

impl IsolationTree {
    fn grow(data: Vec<f64>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        let root = Self::grow_node(&mut nodes, data, 0, height_limit, rng);
        Self { nodes, root }
    }

    fn grow_node(
        nodes: &mut Vec<Node>,
        data: Vec<f64>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let (min, max) = bounds(&data);

        if depth >= height_limit || data.len() <= 1 || min >= max {
            nodes.push(Node::Leaf { size: data.len() });
            return nodes.len() - 1;
        }

        let at = rng.gen_range(min..max);
        let (left_data, right_data): (Vec<f64>, Vec<f64>) =
            data.into_iter().partition(|v| *v < at);

        let left = Self::grow_node(nodes, left_data, depth + 1, height_limit, rng);
        let right = Self::grow_node(nodes, right_data, depth + 1, height_limit, rng);

        nodes.push(Node::Split { at, left, right });
        nodes.len() - 1
    }

    /// Depth at which `value` lands, adjusted for unsplit leaf sizes
    fn path_length(&self, value: f64) -> f64 {
        let mut index = self.root;
        let mut depth = 0usize;

        loop {
            match &self.nodes[index] {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
                Node::Split { at, left, right } => {
                    index = if value < *at { *left } else { *right };
                    depth += 1;
                }
            }
        }
    }
}

/// Isolation forest over scalar samples
pub struct IsolationForest {
    n_trees: usize,
    max_samples: usize,
    contamination: f64,
    rng: StdRng,
    trees: Vec<IsolationTree>,
    sample_size: usize,
    threshold: Option<f64>,
}

impl IsolationForest {
    /// Create an untrained forest
    ///
    /// `contamination` is clamped to `[0, 0.5]`.
    pub fn new(n_trees: usize, contamination: f64, seed: u64) -> Self {
        Self {
            n_trees: n_trees.max(1),
            max_samples: DEFAULT_MAX_SAMPLES,
            contamination: contamination.clamp(0.0, 0.5),
            rng: StdRng::seed_from_u64(seed),
            trees: Vec::new(),
            sample_size: 0,
            threshold: None,
        }
    }

    /// Set the per-tree subsample cap
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples.max(2);
        self
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Anomaly score in (0, 1]; higher is more isolated
    pub fn score(&self, value: f64) -> Option<f64> {
        if self.trees.is_empty() {
            return None;
        }

        let normalizer = average_path_length(self.sample_size);
        if normalizer == 0.0 {
            return Some(0.5);
        }

        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(value))
            .sum::<f64>()
            / self.trees.len() as f64;

        Some(2f64.powf(-mean_path / normalizer))
    }

    /// Score above which a value is an outlier
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }
}

impl DensityModel for IsolationForest {
    fn fit(&mut self, samples: &[f64]) {
        self.trees.clear();
        self.threshold = None;
        self.sample_size = 0;

        if samples.is_empty() {
            return;
        }

        let sample_size = samples.len().min(self.max_samples);
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;

        for _ in 0..self.n_trees {
            let subsample: Vec<f64> =
                rand::seq::index::sample(&mut self.rng, samples.len(), sample_size)
                    .into_iter()
                    .map(|i| samples[i])
                    .collect();
            self.trees
                .push(IsolationTree::grow(subsample, height_limit, &mut self.rng));
        }
        self.sample_size = sample_size;

        let mut scores: Vec<f64> = samples.iter().filter_map(|v| self.score(*v)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.threshold = quantile(&scores, 1.0 - self.contamination);
    }

    fn is_outlier(&self, value: f64) -> bool {
        match (self.score(value), self.threshold) {
            (Some(score), Some(threshold)) => score > threshold,
            _ => false,
        }
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

/// Average unsuccessful search length in a binary search tree of `n` nodes
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn bounds(data: &[f64]) -> (f64, f64) {
    data.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
            (min.min(*v), max.max(*v))
        })
}

/// Linearly interpolated quantile of an ascending slice
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfitted_forest_flags_nothing() {
        let forest = IsolationForest::new(50, 0.05, 7);
        assert!(!forest.is_fitted());
        assert!(!forest.is_outlier(1_000.0));
        assert!(forest.score(1.0).is_none());
    }

    #[test]
    fn test_constant_series_has_no_outliers() {
        let mut forest = IsolationForest::new(100, 0.1, 7);
        forest.fit(&[15.0; 30]);

        assert!(forest.is_fitted());
        assert!((forest.score(15.0).unwrap() - 0.5).abs() < 1e-9);
        assert!(!forest.is_outlier(15.0));
    }

    #[test]
    fn test_isolates_injected_spike() {
        let mut samples = vec![15.0; 19];
        samples.push(95.0);

        let mut forest = IsolationForest::new(100, 0.05, 42);
        forest.fit(&samples);

        assert!(forest.is_outlier(95.0));
        assert!(!forest.is_outlier(15.0));
        assert!(forest.score(95.0).unwrap() > forest.score(15.0).unwrap());
    }

    #[test]
    fn test_noisy_bulk_scores_below_far_outlier() {
        let mut samples: Vec<f64> = (0..60).map(|i| 30.0 + (i % 7) as f64 * 0.5).collect();
        samples.push(90.0);

        let mut forest = IsolationForest::new(100, 0.05, 3);
        forest.fit(&samples);

        assert!(forest.is_outlier(90.0));
        assert!(!forest.is_outlier(31.5));
    }

    #[test]
    fn test_refit_discards_previous_training() {
        let mut forest = IsolationForest::new(50, 0.05, 1);
        let mut spiky = vec![10.0; 19];
        spiky.push(80.0);
        forest.fit(&spiky);
        assert!(forest.is_outlier(80.0));

        forest.fit(&[50.0; 20]);
        assert!(!forest.is_outlier(80.0));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(20));
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(quantile(&sorted, 0.0), Some(0.0));
        assert_eq!(quantile(&sorted, 1.0), Some(40.0));
        assert_eq!(quantile(&sorted, 0.5), Some(20.0));
        assert!((quantile(&sorted, 0.95).unwrap() - 38.0).abs() < 1e-9);
        assert!(quantile(&[], 0.5).is_none());
    }
}
