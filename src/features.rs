use crate::error::ForecastError;

/// Lagged design matrix: row `r` holds `series[r..r + lags]` and targets `series[r + lags]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    lags: usize,
    rows: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl FeatureMatrix {
    pub fn lags(&self) -> usize {
        self.lags
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index in the source series of the target predicted by row `row`.
    pub fn target_index(&self, row: usize) -> usize {
        row + self.lags
    }
}

pub fn build_lag_features(series: &[f64], lags: usize) -> Result<FeatureMatrix, ForecastError> {
    if lags == 0 {
        return Err(ForecastError::invalid_param("n_lags", "must be > 0"));
    }
    if series.len() <= lags {
        return Err(ForecastError::insufficient(lags + 1, series.len()));
    }
    let (rows, targets) = (lags..series.len())
        .map(|i| (series[i - lags..i].to_vec(), series[i]))
        .unzip();
    Ok(FeatureMatrix {
        lags,
        rows,
        targets,
    })
}

/// The most recent `lags` observations, the input for a one-step-ahead forecast.
pub fn last_window(series: &[f64], lags: usize) -> Result<Vec<f64>, ForecastError> {
    if lags == 0 {
        return Err(ForecastError::invalid_param("n_lags", "must be > 0"));
    }
    if series.len() < lags {
        return Err(ForecastError::insufficient(lags, series.len()));
    }
    Ok(series[series.len() - lags..].to_vec())
}
