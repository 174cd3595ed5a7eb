//! ARIMA(p, d, q) with Hannan-Rissanen estimation and a walk-forward state machine.
//!
//! Coefficients are estimated once on the training partition. Out of sample,
//! each step forecasts one bar ([`ArimaFitted::forecast`]), then folds the
//! revealed value back into the differencing and residual state
//! ([`ArimaPending::observe`]) without re-estimating. No stationarity or
//! invertibility constraint is imposed; a design that cannot be solved falls
//! back to a lower order, and a non-finite forecast falls back to the last
//! observed value.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::linear::least_squares;
use crate::error::ForecastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(1, 1, 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ArmaCoefficients {
    constant: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl ArmaCoefficients {
    fn mean_only(series: &[f64]) -> Self {
        let constant = if series.is_empty() {
            0.0
        } else {
            series.iter().sum::<f64>() / series.len() as f64
        };
        Self {
            constant,
            ar: Vec::new(),
            ma: Vec::new(),
        }
    }

    /// One-step prediction for the value following `diffs`, using trailing residuals.
    fn one_step(&self, diffs: &[f64], residuals: &[f64]) -> f64 {
        let mut out = self.constant;
        for (i, phi) in self.ar.iter().enumerate() {
            if let Some(x) = lag(diffs, i + 1) {
                out += phi * x;
            }
        }
        for (j, theta) in self.ma.iter().enumerate() {
            if let Some(e) = lag(residuals, j + 1) {
                out += theta * e;
            }
        }
        out
    }
}

fn lag(series: &[f64], k: usize) -> Option<f64> {
    series.len().checked_sub(k).map(|i| series[i])
}

/// Apply the first difference `d` times.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        if out.len() < 2 {
            return Vec::new();
        }
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// Fitted ARIMA waiting for the next forecast request.
#[derive(Debug, Clone)]
pub struct ArimaFitted {
    order: ArimaOrder,
    effective: ArimaOrder,
    coef: ArmaCoefficients,
    /// `levels[k]` is the latest value of the k-th differenced series, k < d.
    levels: Vec<f64>,
    diffs: Vec<f64>,
    residuals: Vec<f64>,
    last_observed: f64,
    fitted: Vec<Option<f64>>,
}

/// Forecast issued, waiting for the true value of the forecast bar.
#[derive(Debug, Clone)]
pub struct ArimaPending {
    state: ArimaFitted,
    raw_diff: f64,
    forecast: f64,
}

impl ArimaFitted {
    pub fn fit(train: &[f64], order: ArimaOrder) -> Result<Self, ForecastError> {
        if train.len() <= order.d {
            return Err(ForecastError::insufficient(order.d + 1, train.len()));
        }
        if train.iter().any(|x| !x.is_finite()) {
            return Err(ForecastError::invalid_param("train", "series contains non-finite values"));
        }

        let orders: Vec<Vec<f64>> = (0..=order.d).map(|k| difference(train, k)).collect();
        let diffs = orders[order.d].clone();
        let levels: Vec<f64> = orders[..order.d]
            .iter()
            .filter_map(|s| s.last().copied())
            .collect();

        let (effective, coef, residuals) = estimate_with_fallback(&diffs, order);
        if effective != order {
            tracing::debug!(
                requested = ?order,
                effective = ?effective,
                "arima order degraded during estimation"
            );
        }

        let mut fitted = vec![None; train.len()];
        for (j, (x, e)) in diffs.iter().zip(&residuals).enumerate() {
            if j < effective.p {
                continue;
            }
            let i = j + order.d;
            if i == 0 {
                continue;
            }
            let base: f64 = (0..order.d).map(|k| orders[k][i - 1 - k]).sum();
            fitted[i] = Some(x - e + base);
        }

        Ok(Self {
            order,
            effective,
            coef,
            levels,
            diffs,
            residuals,
            last_observed: train[train.len() - 1],
            fitted,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Order actually estimated; lower than requested when the design degraded.
    pub fn effective_order(&self) -> ArimaOrder {
        self.effective
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.coef.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.coef.ma
    }

    pub fn constant(&self) -> f64 {
        self.coef.constant
    }

    /// In-sample one-step predictions aligned to the training series.
    pub fn fitted_values(&self) -> &[Option<f64>] {
        &self.fitted
    }

    pub fn last_observed(&self) -> f64 {
        self.last_observed
    }

    fn raw_diff_forecast(&self) -> f64 {
        self.coef.one_step(&self.diffs, &self.residuals)
    }

    fn integrate(&self, diff_forecast: f64) -> f64 {
        let level = self.levels.iter().rev().fold(diff_forecast, |x, l| l + x);
        if level.is_finite() {
            level
        } else {
            self.last_observed
        }
    }

    /// Forecast for the next bar without advancing the state.
    pub fn peek(&self) -> f64 {
        self.integrate(self.raw_diff_forecast())
    }

    pub fn forecast(self) -> ArimaPending {
        let raw_diff = self.raw_diff_forecast();
        let forecast = self.integrate(raw_diff);
        ArimaPending {
            state: self,
            raw_diff,
            forecast,
        }
    }
}

impl ArimaPending {
    pub fn value(&self) -> f64 {
        self.forecast
    }

    /// Append the revealed value; coefficients stay fixed.
    pub fn observe(self, actual: f64) -> ArimaFitted {
        let mut state = self.state;
        let mut current = actual;
        for level in state.levels.iter_mut() {
            let next = current - *level;
            *level = current;
            current = next;
        }
        let residual = current - self.raw_diff;
        state.diffs.push(current);
        state
            .residuals
            .push(if residual.is_finite() { residual } else { 0.0 });
        state.last_observed = actual;
        state
    }
}

/// Forecast each value of `test` one step ahead, revealing it afterwards.
/// Returns exactly `test.len()` forecasts and the state after the last observation.
pub fn walk_forward(mut state: ArimaFitted, test: &[f64]) -> (Vec<f64>, ArimaFitted) {
    let mut out = Vec::with_capacity(test.len());
    for &actual in test {
        let pending = state.forecast();
        out.push(pending.value());
        state = pending.observe(actual);
    }
    (out, state)
}

fn estimate_with_fallback(diffs: &[f64], order: ArimaOrder) -> (ArimaOrder, ArmaCoefficients, Vec<f64>) {
    let (mut p, mut q) = (order.p, order.q);
    loop {
        if let Some((coef, residuals)) = estimate(diffs, p, q) {
            return (ArimaOrder::new(p, order.d, q), coef, residuals);
        }
        if q > 0 {
            q -= 1;
        } else if p > 0 {
            p -= 1;
        } else {
            let coef = ArmaCoefficients::mean_only(diffs);
            let residuals = diffs.iter().map(|x| x - coef.constant).collect();
            return (ArimaOrder::new(0, order.d, 0), coef, residuals);
        }
    }
}

fn estimate(diffs: &[f64], p: usize, q: usize) -> Option<(ArmaCoefficients, Vec<f64>)> {
    if diffs.is_empty() {
        return None;
    }
    let coef = match (p, q) {
        (0, 0) => ArmaCoefficients::mean_only(diffs),
        (_, 0) => {
            let beta = regress(diffs, p, &[], 0, p)?;
            ArmaCoefficients {
                constant: beta[0],
                ar: beta[1..].to_vec(),
                ma: Vec::new(),
            }
        }
        _ => hannan_rissanen(diffs, p, q)?,
    };
    let residuals = recursive_residuals(diffs, &coef)?;
    Some((coef, residuals))
}

/// Long AR fit for innovations, then OLS on lagged values and lagged innovations.
fn hannan_rissanen(diffs: &[f64], p: usize, q: usize) -> Option<ArmaCoefficients> {
    let n = diffs.len();
    let m = (p + q).max(10.min(n / 4)).max(1);
    let long_ar = regress(diffs, m, &[], 0, m)?;
    let long = ArmaCoefficients {
        constant: long_ar[0],
        ar: long_ar[1..].to_vec(),
        ma: Vec::new(),
    };
    let mut innovations = vec![0.0; n];
    for t in m..n {
        innovations[t] = diffs[t] - long.one_step(&diffs[..t], &[]);
    }

    let start = (m + q).max(p);
    let beta = regress(diffs, p, &innovations, q, start)?;
    Some(ArmaCoefficients {
        constant: beta[0],
        ar: beta[1..=p].to_vec(),
        ma: beta[p + 1..].to_vec(),
    })
}

/// OLS of `y[t]` on `[1, y[t-1..=t-p], e[t-1..=t-q]]` for `t >= start`.
fn regress(y: &[f64], p: usize, e: &[f64], q: usize, start: usize) -> Option<Vec<f64>> {
    let n = y.len();
    let width = 1 + p + q;
    if n <= start || n - start < width + 1 {
        return None;
    }
    let rows = n - start;
    let x = DMatrix::from_fn(rows, width, |r, c| {
        let t = start + r;
        match c {
            0 => 1.0,
            c if c <= p => y[t - c],
            c => e[t - (c - p)],
        }
    });
    let target = DVector::from_column_slice(&y[start..]);
    least_squares(x, &target).ok().map(|b| b.iter().copied().collect())
}

/// Conditional residuals; the first `p` are zero. `None` if they blow up.
fn recursive_residuals(diffs: &[f64], coef: &ArmaCoefficients) -> Option<Vec<f64>> {
    let p = coef.ar.len();
    let mut residuals = Vec::with_capacity(diffs.len());
    for t in 0..diffs.len() {
        let e = if t < p {
            0.0
        } else {
            diffs[t] - coef.one_step(&diffs[..t], &residuals)
        };
        if !e.is_finite() {
            return None;
        }
        residuals.push(e);
    }
    Some(residuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn difference_twice() {
        assert_eq!(difference(&[1.0, 4.0, 9.0, 16.0], 2), vec![2.0, 2.0]);
        assert!(difference(&[1.0], 1).is_empty());
    }

    #[test]
    fn ar1_recovers_coefficient() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut x = vec![1.0];
        for _ in 0..400 {
            let prev = *x.last().unwrap();
            x.push(0.6 * prev + rng.gen_range(-0.5..0.5));
        }
        let fitted = ArimaFitted::fit(&x, ArimaOrder::new(1, 0, 0)).unwrap();
        assert_eq!(fitted.effective_order(), ArimaOrder::new(1, 0, 0));
        assert!((fitted.ar_coefficients()[0] - 0.6).abs() < 0.15);
    }

    #[test]
    fn random_walk_drift_forecast_extends_line() {
        let train: Vec<f64> = (0..50).map(|i| 10.0 + 2.0 * i as f64).collect();
        let fitted = ArimaFitted::fit(&train, ArimaOrder::new(0, 1, 0)).unwrap();
        assert!((fitted.peek() - 110.0).abs() < 1e-9);
    }

    #[test]
    fn constant_series_forecasts_constant() {
        let train = vec![5.0; 30];
        let fitted = ArimaFitted::fit(&train, ArimaOrder::new(2, 0, 1)).unwrap();
        assert!(fitted.peek().is_finite());
        assert!((fitted.peek() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn too_short_train_is_rejected() {
        assert!(matches!(
            ArimaFitted::fit(&[1.0], ArimaOrder::new(1, 1, 0)),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn observe_updates_levels_like_full_difference() {
        let series: Vec<f64> = (0..40).map(|i| (i as f64 * 0.4).sin() * 3.0 + i as f64).collect();
        let fitted = ArimaFitted::fit(&series[..30], ArimaOrder::new(1, 2, 0)).unwrap();
        let (_, state) = walk_forward(fitted, &series[30..]);
        let expected = difference(&series, 2);
        assert_eq!(state.diffs.len(), expected.len());
        for (a, b) in state.diffs.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!((state.last_observed() - series[39]).abs() < f64::EPSILON);
    }
}
