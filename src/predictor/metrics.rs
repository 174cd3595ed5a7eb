use serde::{Deserialize, Serialize};

pub const R2_MIN_SAMPLES: usize = 10;

/// Accumulates (actual, predicted) pairs; non-finite pairs are ignored.
#[derive(Debug, Clone, Default)]
pub struct ForecastAccuracy {
    pairs: Vec<(f64, f64)>,
    /// (actual move, predicted move) relative to the previous close.
    moves: Vec<(f64, f64)>,
}

impl ForecastAccuracy {
    pub fn observe(&mut self, previous: Option<f64>, y_real: f64, y_pred: f64) {
        if !y_real.is_finite() || !y_pred.is_finite() {
            return;
        }
        self.pairs.push((y_real, y_pred));
        if let Some(prev) = previous.filter(|p| p.is_finite()) {
            self.moves.push((y_real - prev, y_pred - prev));
        }
    }

    pub fn sample_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn mae(&self) -> Option<f64> {
        let n = self.pairs.len();
        if n == 0 {
            return None;
        }
        let sum_abs = self.pairs.iter().map(|(y, yhat)| (y - yhat).abs()).sum::<f64>();
        Some(sum_abs / n as f64)
    }

    /// Share of bars where the predicted move has the sign of the realized move.
    pub fn hit_rate(&self) -> Option<f64> {
        let n = self.moves.len();
        if n == 0 {
            return None;
        }
        let hit = self.moves.iter().filter(|(dy, dyhat)| dy * dyhat > 0.0).count() as f64;
        Some(hit / n as f64)
    }

    pub fn r2(&self) -> Option<f64> {
        let n = self.pairs.len();
        if n < R2_MIN_SAMPLES {
            return None;
        }
        let mean_y = self.pairs.iter().map(|(y, _)| *y).sum::<f64>() / n as f64;
        let mut sse = 0.0;
        let mut sst = 0.0;
        for (y, yhat) in &self.pairs {
            let err = y - yhat;
            sse += err * err;
            let d = y - mean_y;
            sst += d * d;
        }
        if sst <= 1e-18 {
            return Some(0.0);
        }
        Some(1.0 - sse / sst)
    }

    pub fn summary(&self) -> ForecastMetrics {
        ForecastMetrics {
            samples: self.sample_count(),
            mae: self.mae(),
            hit_rate: self.hit_rate(),
            r2: self.r2(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub samples: usize,
    pub mae: Option<f64>,
    pub hit_rate: Option<f64>,
    pub r2: Option<f64>,
}

/// Out-of-sample accuracy of `predictions` against `closes`, from `start` on.
pub fn evaluate(closes: &[f64], predictions: &[Option<f64>], start: usize) -> ForecastMetrics {
    let mut acc = ForecastAccuracy::default();
    for (i, (close, pred)) in closes.iter().zip(predictions).enumerate().skip(start) {
        if let Some(pred) = pred {
            let previous = i.checked_sub(1).map(|j| closes[j]);
            acc.observe(previous, *close, *pred);
        }
    }
    acc.summary()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let closes: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let preds: Vec<Option<f64>> = closes.iter().map(|c| Some(*c)).collect();
        let m = evaluate(&closes, &preds, 5);
        assert_eq!(m.samples, 15);
        assert_eq!(m.mae, Some(0.0));
        assert_eq!(m.hit_rate, Some(1.0));
        assert!((m.r2.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_predictions_are_skipped() {
        let closes = vec![1.0, 2.0, 3.0];
        let preds = vec![None, None, Some(2.5)];
        let m = evaluate(&closes, &preds, 0);
        assert_eq!(m.samples, 1);
        assert_eq!(m.mae, Some(0.5));
        assert_eq!(m.hit_rate, Some(1.0));
        assert_eq!(m.r2, None);
    }

    #[test]
    fn empty_window_has_no_metrics() {
        let m = evaluate(&[1.0, 2.0], &[None, None], 0);
        assert_eq!(m, ForecastMetrics::default());
    }
}
