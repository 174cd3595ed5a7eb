use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::ForecastError;

/// How candidate thresholds are chosen at each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splitter {
    /// Exhaustive scan of midpoints between sorted distinct values.
    Best,
    /// One uniform threshold per feature between its min and max.
    Random,
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub splitter: Splitter,
}

impl TreeParams {
    pub fn best(max_depth: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            splitter: Splitter::Best,
        }
    }

    pub fn random(max_depth: usize) -> Self {
        Self {
            splitter: Splitter::Random,
            ..Self::best(max_depth)
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn depth(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

/// CART regression tree minimizing squared error.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// `rng` is only drawn from by the random splitter.
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self, ForecastError> {
        if rows.is_empty() {
            return Err(ForecastError::insufficient(1, 0));
        }
        if rows.len() != targets.len() {
            return Err(ForecastError::invalid_param(
                "targets",
                format!("{} rows but {} targets", rows.len(), targets.len()),
            ));
        }
        if params.max_depth == 0 {
            return Err(ForecastError::invalid_param("max_depth", "must be > 0"));
        }
        let indices: Vec<usize> = (0..rows.len()).collect();
        let root = build(rows, targets, &indices, 0, &params, rng);
        Ok(Self { root })
    }

    /// Fit on a bootstrap sample given as row indices (duplicates allowed).
    pub fn fit_indices(
        rows: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Result<Self, ForecastError> {
        if indices.is_empty() {
            return Err(ForecastError::insufficient(1, 0));
        }
        if params.max_depth == 0 {
            return Err(ForecastError::invalid_param("max_depth", "must be > 0"));
        }
        let root = build(rows, targets, indices, 0, &params, rng);
        Ok(Self { root })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = row.get(*feature).copied().unwrap_or(f64::NAN);
                    node = if x <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

fn build(
    rows: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    depth: usize,
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Node {
    let value = mean_of(targets, indices);
    if depth >= params.max_depth
        || indices.len() < params.min_samples_split
        || indices.len() < 2 * params.min_samples_leaf
    {
        return Node::Leaf(value);
    }

    let parent_sse = sse_of(targets, indices);
    if parent_sse <= f64::EPSILON {
        return Node::Leaf(value);
    }

    let candidate = match params.splitter {
        Splitter::Best => best_split(rows, targets, indices, params.min_samples_leaf),
        Splitter::Random => random_split(rows, targets, indices, params.min_samples_leaf, rng),
    };
    let Some(split) = candidate else {
        return Node::Leaf(value);
    };
    if split.sse >= parent_sse {
        return Node::Leaf(value);
    }

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| rows[i][split.feature] <= split.threshold);
    if left_idx.is_empty() || right_idx.is_empty() {
        return Node::Leaf(value);
    }

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(build(rows, targets, &left_idx, depth + 1, params, rng)),
        right: Box::new(build(rows, targets, &right_idx, depth + 1, params, rng)),
    }
}

fn best_split(
    rows: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n_features = rows[indices[0]].len();
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();
    let mut best: Option<SplitCandidate> = None;

    for feature in 0..n_features {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let y = targets[order[k]];
            left_sum += y;
            left_sq += y * y;
            let left_n = k + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let here = rows[order[k]][feature];
            let next = rows[order[k + 1]][feature];
            if next <= here {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);
            if best.map_or(true, |b| sse < b.sse) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    sse,
                });
            }
        }
    }
    best
}

fn random_split(
    rows: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
    rng: &mut ChaCha8Rng,
) -> Option<SplitCandidate> {
    let n_features = rows[indices[0]].len();
    let mut best: Option<SplitCandidate> = None;

    for feature in 0..n_features {
        let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let x = rows[i][feature];
            (lo.min(x), hi.max(x))
        });
        if !(hi > lo) {
            continue;
        }
        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().copied().partition(|&i| rows[i][feature] <= threshold);
        if left.len() < min_leaf.max(1) || right.len() < min_leaf.max(1) {
            continue;
        }
        let sse = sse_of(targets, &left) + sse_of(targets, &right);
        if best.map_or(true, |b| sse < b.sse) {
            best = Some(SplitCandidate {
                feature,
                threshold,
                sse,
            });
        }
    }
    best
}

fn mean_of(targets: &[f64], indices: &[usize]) -> f64 {
    indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
}

fn sse_of(targets: &[f64], indices: &[usize]) -> f64 {
    let mean = mean_of(targets, indices);
    indices
        .iter()
        .map(|&i| {
            let d = targets[i] - mean;
            d * d
        })
        .sum()
}
