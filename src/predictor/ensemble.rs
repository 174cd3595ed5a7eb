use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::tree::{RegressionTree, TreeParams};
use crate::error::ForecastError;

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub seed: u64,
}

fn check_ensemble(rows: &[Vec<f64>], targets: &[f64], n_estimators: usize) -> Result<(), ForecastError> {
    if n_estimators == 0 {
        return Err(ForecastError::invalid_param("n_estimators", "must be > 0"));
    }
    if rows.is_empty() {
        return Err(ForecastError::insufficient(1, 0));
    }
    if rows.len() != targets.len() {
        return Err(ForecastError::invalid_param(
            "targets",
            format!("{} rows but {} targets", rows.len(), targets.len()),
        ));
    }
    Ok(())
}

fn average(trees: &[RegressionTree], row: &[f64]) -> f64 {
    trees.iter().map(|t| t.predict(row)).sum::<f64>() / trees.len() as f64
}

/// Bagged CART trees. Tree `i` draws its bootstrap from `seed + i`, so the
/// forest is identical however rayon schedules the fits.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], params: ForestParams) -> Result<Self, ForecastError> {
        check_ensemble(rows, targets, params.n_estimators)?;
        let n = rows.len();
        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit_indices(rows, targets, &sample, TreeParams::best(params.max_depth), &mut rng)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { trees })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        average(&self.trees, row)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Extremely randomized trees: whole training set per tree, random thresholds.
#[derive(Debug, Clone)]
pub struct ExtraTrees {
    trees: Vec<RegressionTree>,
}

impl ExtraTrees {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], params: ForestParams) -> Result<Self, ForecastError> {
        check_ensemble(rows, targets, params.n_estimators)?;
        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
                RegressionTree::fit(rows, targets, TreeParams::random(params.max_depth), &mut rng)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { trees })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        average(&self.trees, row)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

/// Squared-loss gradient boosting: start from the target mean, then fit each
/// round's tree to the current residuals and add it with shrinkage.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], params: BoostingParams) -> Result<Self, ForecastError> {
        check_ensemble(rows, targets, params.n_estimators)?;
        if !(params.learning_rate > 0.0 && params.learning_rate <= 1.0) {
            return Err(ForecastError::invalid_param(
                "learning_rate",
                format!("must be in (0, 1], got {}", params.learning_rate),
            ));
        }
        let init = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut current = vec![init; targets.len()];
        let mut stages = Vec::with_capacity(params.n_estimators);
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = targets.iter().zip(&current).map(|(y, f)| y - f).collect();
            let tree = RegressionTree::fit(rows, &residuals, TreeParams::best(params.max_depth), &mut rng)?;
            for (f, row) in current.iter_mut().zip(rows) {
                *f += params.learning_rate * tree.predict(row);
            }
            stages.push(tree);
        }

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            stages,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.init
            + self
                .stages
                .iter()
                .map(|t| self.learning_rate * t.predict(row))
                .sum::<f64>()
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let targets: Vec<f64> = (0..60).map(|i| (i as f64 / 6.0).sin() * 10.0).collect();
        (rows, targets)
    }

    #[test]
    fn forest_is_reproducible_for_a_seed() {
        let (rows, targets) = wave();
        let params = ForestParams {
            n_estimators: 8,
            max_depth: 4,
            seed: 3,
        };
        let a = RandomForest::fit(&rows, &targets, params).unwrap();
        let b = RandomForest::fit(&rows, &targets, params).unwrap();
        assert_eq!(a.n_trees(), 8);
        for r in &rows {
            assert_eq!(a.predict(r).to_bits(), b.predict(r).to_bits());
        }
    }

    #[test]
    fn extra_trees_stay_within_target_range() {
        let (rows, targets) = wave();
        let model = ExtraTrees::fit(
            &rows,
            &targets,
            ForestParams {
                n_estimators: 5,
                max_depth: 5,
                seed: 0,
            },
        )
        .unwrap();
        for r in &rows {
            let p = model.predict(r);
            assert!((-10.0..=10.0).contains(&p));
        }
    }

    #[test]
    fn boosting_reduces_training_error() {
        let (rows, targets) = wave();
        let sse = |m: &GradientBoosting| -> f64 {
            rows.iter()
                .zip(&targets)
                .map(|(r, y)| (m.predict(r) - y).powi(2))
                .sum()
        };
        let params = BoostingParams {
            n_estimators: 1,
            max_depth: 3,
            learning_rate: 0.1,
            seed: 0,
        };
        let short = GradientBoosting::fit(&rows, &targets, params).unwrap();
        let long = GradientBoosting::fit(
            &rows,
            &targets,
            BoostingParams {
                n_estimators: 50,
                ..params
            },
        )
        .unwrap();
        assert_eq!(long.n_stages(), 50);
        assert!(sse(&long) < sse(&short));
    }

    #[test]
    fn zero_estimators_is_rejected() {
        let (rows, targets) = wave();
        let params = ForestParams {
            n_estimators: 0,
            max_depth: 3,
            seed: 0,
        };
        assert!(matches!(
            RandomForest::fit(&rows, &targets, params),
            Err(ForecastError::InvalidParameter { .. })
        ));
    }
}
