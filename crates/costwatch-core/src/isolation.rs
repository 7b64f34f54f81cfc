//! Density-outlier detection via a seeded isolation forest.
//!
//! Points are isolated by random recursive axis-aligned splits; points that
//! need fewer splits to isolate sit in sparse regions of feature space and
//! score as more anomalous. Scoring follows the standard formulation:
//! `score(x) = 2^(−E[h(x)] / c(n))` where `E[h(x)]` is the mean isolation
//! depth across trees and `c(n)` the average path length of an unsuccessful
//! BST search over `n` points.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::{percentile, FeatureRow, FEATURE_DIM};

/// Euler–Mascheroni constant, used in the harmonic-number approximation.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// ── IsolationForestConfig ─────────────────────────────────────────────────────

/// Configuration for the isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForestConfig {
    /// Number of trees in the ensemble.
    pub trees: usize,
    /// Maximum subsample size per tree.
    pub sample_size: usize,
    /// Expected fraction of outliers; the score threshold is placed at the
    /// `(1 − contamination)` quantile of the score distribution.
    pub contamination: f64,
    /// RNG seed. The forest is fully deterministic for a fixed seed.
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            sample_size: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

// ── IsolationForest ───────────────────────────────────────────────────────────

/// A trained ensemble of isolation trees.
pub struct IsolationForest {
    trees: Vec<Node>,
    /// Effective per-tree sample size used during training.
    sample_size: usize,
}

enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

impl IsolationForest {
    /// Train a forest on `data` with the supplied configuration.
    pub fn fit(data: &[FeatureRow], config: &IsolationForestConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let sample_size = config.sample_size.min(data.len()).max(1);
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..config.trees)
            .map(|_| {
                let sample = draw_sample(data, sample_size, &mut rng);
                build_tree(sample, 0, max_depth, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Anomaly score in `(0, 1]`; higher means easier to isolate.
    pub fn score(&self, point: &FeatureRow) -> f64 {
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(point, tree, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalizer = average_path_length(self.sample_size);
        if normalizer <= 0.0 {
            return 1.0;
        }
        2.0_f64.powf(-mean_path / normalizer)
    }

    /// Score every point and flag those above the contamination-quantile
    /// threshold.
    ///
    /// The comparison is strict, so a perfectly uniform dataset (all scores
    /// equal) flags nothing rather than everything.
    pub fn detect(data: &[FeatureRow], config: &IsolationForestConfig) -> Vec<bool> {
        if data.is_empty() {
            return Vec::new();
        }
        let forest = Self::fit(data, config);
        let scores: Vec<f64> = data.iter().map(|p| forest.score(p)).collect();

        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("scores are finite"));
        let threshold = percentile(&sorted, (1.0 - config.contamination) * 100.0);

        scores.iter().map(|&s| s > threshold).collect()
    }
}

// ── Tree construction ─────────────────────────────────────────────────────────

/// Draw a subsample of `size` points without replacement.
fn draw_sample(data: &[FeatureRow], size: usize, rng: &mut StdRng) -> Vec<FeatureRow> {
    if size >= data.len() {
        return data.to_vec();
    }
    rand::seq::index::sample(rng, data.len(), size)
        .into_iter()
        .map(|i| data[i])
        .collect()
}

/// Recursively partition `points` with random axis/threshold splits until
/// isolation or the depth cap.
fn build_tree(points: Vec<FeatureRow>, depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if points.len() <= 1 || depth >= max_depth {
        return Node::Leaf {
            size: points.len(),
        };
    }

    // Only features with spread can be split on.
    let ranges: Vec<(usize, f64, f64)> = (0..FEATURE_DIM)
        .filter_map(|col| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for p in &points {
                min = min.min(p[col]);
                max = max.max(p[col]);
            }
            (max > min).then_some((col, min, max))
        })
        .collect();

    if ranges.is_empty() {
        // All remaining points are identical.
        return Node::Leaf {
            size: points.len(),
        };
    }

    let (feature, min, max) = ranges[rng.gen_range(0..ranges.len())];
    let threshold = rng.gen_range(min..max);

    let (left, right): (Vec<FeatureRow>, Vec<FeatureRow>) =
        points.into_iter().partition(|p| p[feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(right, depth + 1, max_depth, rng)),
    }
}

/// Isolation depth of `point` in one tree. Leaves holding more than one
/// point contribute the average depth of the subtree they truncate.
fn path_length(point: &FeatureRow, node: &Node, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if point[*feature] < *threshold {
                path_length(point, left, depth + 1)
            } else {
                path_length(point, right, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points:
/// `c(n) = 2·H(n−1) − 2(n−1)/n`.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * (harmonic(n - 1.0)) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Harmonic-number approximation `H(x) ≈ ln(x) + γ`.
fn harmonic(x: f64) -> f64 {
    x.ln() + EULER_GAMMA
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A tight cluster with deterministic jitter plus one far outlier at the
    /// end.
    fn cluster_with_outlier(n: usize) -> Vec<FeatureRow> {
        let mut data: Vec<FeatureRow> = (0..n)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.01;
                [jitter, 1.0 - jitter, jitter * 0.5, 0.5 + jitter]
            })
            .collect();
        data.push([10.0, 10.0, 10.0, 10.0]);
        data
    }

    #[test]
    fn test_outlier_scores_highest() {
        let data = cluster_with_outlier(50);
        let config = IsolationForestConfig::default();
        let forest = IsolationForest::fit(&data, &config);

        let outlier_score = forest.score(&data[data.len() - 1]);
        let max_cluster_score = data[..data.len() - 1]
            .iter()
            .map(|p| forest.score(p))
            .fold(f64::NEG_INFINITY, f64::max);

        assert!(
            outlier_score > max_cluster_score,
            "outlier {outlier_score} vs cluster max {max_cluster_score}"
        );
    }

    #[test]
    fn test_detect_flags_outlier() {
        let data = cluster_with_outlier(50);
        let config = IsolationForestConfig::default();
        let flags = IsolationForest::detect(&data, &config);

        assert_eq!(flags.len(), data.len());
        assert!(flags[data.len() - 1], "outlier must be flagged");

        // Calibrated to ~5% of 51 points.
        let flagged = flags.iter().filter(|&&f| f).count();
        assert!((1..=5).contains(&flagged), "flagged = {flagged}");
    }

    #[test]
    fn test_detect_reproducible_for_fixed_seed() {
        let data = cluster_with_outlier(40);
        let config = IsolationForestConfig::default();
        let first = IsolationForest::detect(&data, &config);
        let second = IsolationForest::detect(&data, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_detect_uniform_data_flags_nothing() {
        // All points identical: no split possible, all scores equal, and the
        // strict threshold comparison flags none of them.
        let data: Vec<FeatureRow> = vec![[1.0, 2.0, 3.0, 4.0]; 30];
        let flags = IsolationForest::detect(&data, &IsolationForestConfig::default());
        assert!(flags.iter().all(|&f| !f));
    }

    #[test]
    fn test_detect_empty_data() {
        let flags = IsolationForest::detect(&[], &IsolationForestConfig::default());
        assert!(flags.is_empty());
    }

    #[test]
    fn test_scores_are_in_unit_interval() {
        let data = cluster_with_outlier(30);
        let forest = IsolationForest::fit(&data, &IsolationForestConfig::default());
        for point in &data {
            let score = forest.score(point);
            assert!(score > 0.0 && score <= 1.0, "score = {score}");
        }
    }

    #[test]
    fn test_average_path_length_small_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(n) grows with n.
        assert!(average_path_length(100) > average_path_length(10));
    }
}
