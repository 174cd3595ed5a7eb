use crate::error::ForecastError;

/// Uniform-weight k-nearest-neighbours regressor over lag windows.
#[derive(Debug, Clone)]
pub struct KnnRegressor {
    k: usize,
    rows: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl KnnRegressor {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], k: usize) -> Result<Self, ForecastError> {
        if k == 0 {
            return Err(ForecastError::invalid_param("n_neighbors", "must be > 0"));
        }
        if rows.len() != targets.len() {
            return Err(ForecastError::invalid_param(
                "targets",
                format!("{} rows but {} targets", rows.len(), targets.len()),
            ));
        }
        if k > rows.len() {
            return Err(ForecastError::invalid_param(
                "n_neighbors",
                format!("k = {} exceeds {} training samples", k, rows.len()),
            ));
        }
        Ok(Self {
            k,
            rows: rows.to_vec(),
            targets: targets.to_vec(),
        })
    }

    /// Mean target of the `k` closest rows. Equal distances keep training order.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut distances: Vec<(usize, f64)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (i, squared_distance(r, row)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        distances
            .iter()
            .take(self.k)
            .map(|(i, _)| self.targets[*i])
            .sum::<f64>()
            / self.k as f64
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_nearest_targets() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0], vec![10.0]];
        let targets = vec![0.0, 10.0, 20.0, 100.0];
        let knn = KnnRegressor::fit(&rows, &targets, 2).unwrap();
        assert!((knn.predict(&[1.4]) - 15.0).abs() < 1e-12);
        assert!((knn.predict(&[9.0]) - 60.0).abs() < 1e-12);
    }

    #[test]
    fn ties_resolve_in_training_order() {
        let rows = vec![vec![0.0], vec![2.0]];
        let knn = KnnRegressor::fit(&rows, &[5.0, 7.0], 1).unwrap();
        assert!((knn.predict(&[1.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_k_larger_than_sample() {
        let rows = vec![vec![0.0], vec![2.0]];
        assert!(KnnRegressor::fit(&rows, &[1.0, 2.0], 3).is_err());
        assert!(KnnRegressor::fit(&rows, &[1.0, 2.0], 0).is_err());
    }
}
