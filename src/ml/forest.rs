use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Tuning knobs for the bagged tree ensemble.
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` means `sqrt(total)`.
    pub max_features: Option<usize>,
    /// Base seed; tree `i` derives its own stream from `seed + i`.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        label: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    root: Node,
}

impl Tree {
    fn predict_one(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { label } => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

/// Binary classifier: bootstrap-sampled CART trees split on Gini impurity,
/// combined by majority vote.
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    config: ForestConfig,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
        }
    }

    /// Fits the ensemble on labeled rows. Labels must be 0.0 or 1.0.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<(), String> {
        let n = x.nrows();
        if n == 0 {
            return Err("empty training set".to_string());
        }
        if y.len() != n {
            return Err(format!("{} rows but {} labels", n, y.len()));
        }
        if x.iter().any(|v| !v.is_finite()) || y.iter().any(|v| !v.is_finite()) {
            return Err("non-finite value in training data".to_string());
        }

        let config = &self.config;
        self.trees = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                Tree {
                    root: build_node(x, y, &indices, 0, config, &mut rng),
                }
            })
            .collect();

        Ok(())
    }

    /// Majority vote over the fitted trees; a tie falls to 0.
    pub fn predict_one(&self, row: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let up_votes = self
            .trees
            .iter()
            .filter(|t| t.predict_one(row) > 0.5)
            .count();
        if up_votes * 2 > self.trees.len() {
            1.0
        } else {
            0.0
        }
    }
}

fn build_node(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    indices: &[usize],
    depth: usize,
    config: &ForestConfig,
    rng: &mut ChaCha8Rng,
) -> Node {
    let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
    let impurity = gini(&labels);

    if depth >= config.max_depth || indices.len() < config.min_samples_split || impurity < 1e-10 {
        return Node::Leaf {
            label: majority(&labels),
        };
    }

    match best_split(x, y, indices, config, rng) {
        Some((feature, threshold, left_idx, right_idx))
            if left_idx.len() >= config.min_samples_leaf
                && right_idx.len() >= config.min_samples_leaf =>
        {
            let left = build_node(x, y, &left_idx, depth + 1, config, rng);
            let right = build_node(x, y, &right_idx, depth + 1, config, rng);
            Node::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => Node::Leaf {
            label: majority(&labels),
        },
    }
}

type Split = (usize, f64, Vec<usize>, Vec<usize>);

fn best_split(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    indices: &[usize],
    config: &ForestConfig,
    rng: &mut ChaCha8Rng,
) -> Option<Split> {
    let n_features = x.ncols();
    let k = config
        .max_features
        .unwrap_or_else(|| ((n_features as f64).sqrt().round() as usize).max(1))
        .min(n_features);

    let mut candidates: Vec<usize> = (0..n_features).collect();
    candidates.shuffle(rng);
    candidates.truncate(k);

    let labels: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
    let parent_impurity = gini(&labels);

    let mut best_gain = 0.0;
    let mut best: Option<Split> = None;

    for &feature in &candidates {
        let mut values: Vec<f64> = indices.iter().map(|&i| x[[i, feature]]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup();

        for window in values.windows(2) {
            let threshold = (window[0] + window[1]) / 2.0;
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                continue;
            }

            let left_labels: Vec<f64> = left_idx.iter().map(|&i| y[i]).collect();
            let right_labels: Vec<f64> = right_idx.iter().map(|&i| y[i]).collect();

            let n_left = left_idx.len() as f64;
            let n_right = right_idx.len() as f64;
            let weighted = (n_left * gini(&left_labels) + n_right * gini(&right_labels))
                / (n_left + n_right);
            let gain = parent_impurity - weighted;

            if gain > best_gain {
                best_gain = gain;
                best = Some((feature, threshold, left_idx, right_idx));
            }
        }
    }

    best
}

fn gini(labels: &[f64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let n = labels.len() as f64;
    let ones = labels.iter().filter(|&&l| l > 0.5).count() as f64;
    let p1 = ones / n;
    let p0 = 1.0 - p1;
    1.0 - p0 * p0 - p1 * p1
}

fn majority(labels: &[f64]) -> f64 {
    let ones = labels.iter().filter(|&&l| l > 0.5).count();
    if ones * 2 > labels.len() {
        1.0
    } else {
        0.0
    }
}
