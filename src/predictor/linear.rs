use nalgebra::{DMatrix, DVector};

use crate::error::ForecastError;

const SVD_EPS: f64 = 1e-10;

/// Ordinary least squares with intercept, solved through SVD so rank-deficient
/// lag windows yield the minimum-norm solution instead of failing.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearRegression {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64]) -> Result<Self, ForecastError> {
        let (x, y) = design(rows, targets)?;
        let n = x.nrows();
        let width = x.ncols();
        let mut augmented = DMatrix::from_element(n, width + 1, 1.0);
        augmented.columns_mut(1, width).copy_from(&x);

        let beta = least_squares(augmented, &y)?;
        Ok(Self {
            intercept: beta[0],
            coefficients: beta.iter().skip(1).copied().collect(),
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept + dot(&self.coefficients, row)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

/// L2-penalized least squares. The intercept is left unpenalized by centering.
#[derive(Debug, Clone)]
pub struct RidgeRegression {
    alpha: f64,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl RidgeRegression {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], alpha: f64) -> Result<Self, ForecastError> {
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(ForecastError::invalid_param(
                "ridge_alpha",
                format!("must be finite and >= 0, got {}", alpha),
            ));
        }
        let (mut x, y) = design(rows, targets)?;
        let n = x.nrows() as f64;

        let x_mean: Vec<f64> = x.column_iter().map(|c| c.sum() / n).collect();
        let y_mean = y.sum() / n;
        for (j, mean) in x_mean.iter().enumerate() {
            x.column_mut(j).add_scalar_mut(-mean);
        }
        let y_centered = y.add_scalar(-y_mean);

        let xt = x.transpose();
        let mut gram = &xt * &x;
        for j in 0..gram.ncols() {
            gram[(j, j)] += alpha;
        }
        let rhs = &xt * y_centered;

        let beta = match gram.clone().cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => least_squares(gram, &rhs)?,
        };
        let coefficients: Vec<f64> = beta.iter().copied().collect();
        let intercept = y_mean - dot(&coefficients, &x_mean);
        Ok(Self {
            alpha,
            intercept,
            coefficients,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept + dot(&self.coefficients, row)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

/// Minimum-norm solution of `x * beta = y`.
pub(crate) fn least_squares(x: DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, ForecastError> {
    let beta = x
        .svd(true, true)
        .solve(y, SVD_EPS)
        .map_err(|e| ForecastError::invalid_param("design_matrix", e))?;
    if beta.iter().all(|b| b.is_finite()) {
        Ok(beta)
    } else {
        Err(ForecastError::invalid_param(
            "design_matrix",
            "least squares produced non-finite coefficients",
        ))
    }
}

fn design(rows: &[Vec<f64>], targets: &[f64]) -> Result<(DMatrix<f64>, DVector<f64>), ForecastError> {
    if rows.is_empty() {
        return Err(ForecastError::insufficient(1, 0));
    }
    if rows.len() != targets.len() {
        return Err(ForecastError::invalid_param(
            "targets",
            format!("{} rows but {} targets", rows.len(), targets.len()),
        ));
    }
    let width = rows[0].len();
    if rows.iter().any(|r| r.len() != width) {
        return Err(ForecastError::invalid_param("rows", "ragged feature rows"));
    }
    let x = DMatrix::from_fn(rows.len(), width, |i, j| rows[i][j]);
    let y = DVector::from_column_slice(targets);
    Ok((x, y))
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_relation() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i * i) as f64]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| 3.0 + 2.0 * r[0] - 0.5 * r[1]).collect();
        let model = LinearRegression::fit(&rows, &targets).unwrap();
        assert!((model.intercept() - 3.0).abs() < 1e-6);
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-6);
        assert!((model.coefficients()[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn collinear_columns_do_not_fail() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, i as f64 + 1.0]).collect();
        let targets: Vec<f64> = (0..10).map(|i| i as f64 + 2.0).collect();
        let model = LinearRegression::fit(&rows, &targets).unwrap();
        assert!((model.predict(&[20.0, 21.0]) - 22.0).abs() < 1e-6);
    }

    #[test]
    fn ridge_shrinks_towards_mean() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| 2.0 * i as f64).collect();
        let ols = RidgeRegression::fit(&rows, &targets, 0.0).unwrap();
        let ridge = RidgeRegression::fit(&rows, &targets, 100.0).unwrap();
        assert!((ols.coefficients()[0] - 2.0).abs() < 1e-9);
        assert!(ridge.coefficients()[0] < ols.coefficients()[0]);
        assert!(ridge.coefficients()[0] > 0.0);
        // The fitted line passes through the centroid.
        assert!((ridge.predict(&[4.5]) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn ridge_rejects_negative_alpha() {
        let rows = vec![vec![1.0], vec![2.0]];
        assert!(RidgeRegression::fit(&rows, &[1.0, 2.0], -1.0).is_err());
    }
}
