pub mod arima;
pub mod ensemble;
pub mod knn;
pub mod linear;
pub mod metrics;
pub mod tree;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::ForecastConfig;
use crate::error::ForecastError;
use crate::features::{build_lag_features, last_window};
use crate::model::indicator::{IndicatorSpec, Method};

use self::arima::{walk_forward, ArimaFitted, ArimaOrder};
use self::ensemble::{BoostingParams, ExtraTrees, ForestParams, GradientBoosting, RandomForest};
use self::knn::KnnRegressor;
use self::linear::{LinearRegression, RidgeRegression};
use self::tree::{RegressionTree, TreeParams};

pub use self::metrics::{evaluate, ForecastAccuracy, ForecastMetrics};

/// Hyperparameters of a lag-window model after config defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagModelParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub n_lags: usize,
    pub ridge_alpha: f64,
    pub learning_rate: f64,
    pub seed: u64,
}

impl LagModelParams {
    /// Slots are `(n_estimators, max_depth, n_lags)`; absent slots take config defaults.
    pub fn resolve(spec: &IndicatorSpec, cfg: &ForecastConfig) -> Result<Self, ForecastError> {
        let params = Self {
            n_estimators: spec
                .param_usize(0, "n_estimators")?
                .unwrap_or(cfg.n_estimators),
            max_depth: spec.param_usize(1, "max_depth")?.unwrap_or(cfg.max_depth),
            n_lags: spec.param_usize(2, "n_lags")?.unwrap_or(cfg.lags),
            ridge_alpha: cfg.ridge_alpha,
            learning_rate: cfg.learning_rate,
            seed: cfg.seed,
        };
        if params.n_lags == 0 {
            return Err(ForecastError::invalid_param("n_lags", "must be > 0"));
        }
        Ok(params)
    }
}

/// Supervised regressor over lag windows, dispatched by method.
#[derive(Debug, Clone)]
pub enum RegressorModel {
    Linear(LinearRegression),
    Ridge(RidgeRegression),
    Tree(RegressionTree),
    Forest(RandomForest),
    ExtraTrees(ExtraTrees),
    Boosting(GradientBoosting),
    Knn(KnnRegressor),
}

impl RegressorModel {
    pub fn fit(
        method: Method,
        rows: &[Vec<f64>],
        targets: &[f64],
        params: &LagModelParams,
    ) -> Result<Self, ForecastError> {
        let forest = ForestParams {
            n_estimators: params.n_estimators,
            max_depth: params.max_depth,
            seed: params.seed,
        };
        let model = match method {
            Method::Linear => Self::Linear(LinearRegression::fit(rows, targets)?),
            Method::Ridge => Self::Ridge(RidgeRegression::fit(rows, targets, params.ridge_alpha)?),
            Method::DecisionTree => {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
                Self::Tree(RegressionTree::fit(
                    rows,
                    targets,
                    TreeParams::best(params.max_depth),
                    &mut rng,
                )?)
            }
            Method::RandomForest => Self::Forest(RandomForest::fit(rows, targets, forest)?),
            Method::ExtraTrees => Self::ExtraTrees(ExtraTrees::fit(rows, targets, forest)?),
            Method::GradientBoosting => Self::Boosting(GradientBoosting::fit(
                rows,
                targets,
                BoostingParams {
                    n_estimators: params.n_estimators,
                    max_depth: params.max_depth,
                    learning_rate: params.learning_rate,
                    seed: params.seed,
                },
            )?),
            Method::Knn => Self::Knn(KnnRegressor::fit(rows, targets, params.n_estimators)?),
            Method::Arima => return Err(ForecastError::UnknownMethod(method.to_string())),
        };
        Ok(model)
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Self::Linear(m) => m.predict(row),
            Self::Ridge(m) => m.predict(row),
            Self::Tree(m) => m.predict(row),
            Self::Forest(m) => m.predict(row),
            Self::ExtraTrees(m) => m.predict(row),
            Self::Boosting(m) => m.predict(row),
            Self::Knn(m) => m.predict(row),
        }
    }
}

#[derive(Debug, Clone)]
enum LaggedStage {
    Unfitted,
    Fitted {
        model: RegressorModel,
        fitted: Vec<Option<f64>>,
    },
    Ready {
        model: RegressorModel,
        fitted: Vec<Option<f64>>,
        history: Vec<f64>,
    },
}

/// Fit once on the training partition, predict the test partition in one batch.
#[derive(Debug, Clone)]
pub struct LaggedForecaster {
    method: Method,
    params: LagModelParams,
    stage: LaggedStage,
}

impl LaggedForecaster {
    pub fn new(method: Method, params: LagModelParams) -> Self {
        Self {
            method,
            params,
            stage: LaggedStage::Unfitted,
        }
    }

    pub fn params(&self) -> &LagModelParams {
        &self.params
    }

    fn fit(&mut self, train: &[f64]) -> Result<(), ForecastError> {
        let features = build_lag_features(train, self.params.n_lags)?;
        let model = RegressorModel::fit(self.method, features.rows(), features.targets(), &self.params)?;
        let mut fitted = vec![None; train.len()];
        for (r, row) in features.rows().iter().enumerate() {
            fitted[features.target_index(r)] = Some(model.predict(row));
        }
        self.stage = LaggedStage::Fitted { model, fitted };
        Ok(())
    }

    fn predict(&mut self, test: &[f64]) -> Result<Vec<Option<f64>>, ForecastError> {
        let (model, fitted) = match std::mem::replace(&mut self.stage, LaggedStage::Unfitted) {
            LaggedStage::Unfitted => return Err(ForecastError::NoModel),
            LaggedStage::Fitted { model, fitted } | LaggedStage::Ready { model, fitted, .. } => {
                (model, fitted)
            }
        };
        let features = match build_lag_features(test, self.params.n_lags) {
            Ok(f) => f,
            Err(e) => {
                self.stage = LaggedStage::Fitted { model, fitted };
                return Err(e);
            }
        };
        let mut out = vec![None; test.len()];
        for (r, row) in features.rows().iter().enumerate() {
            out[features.target_index(r)] = Some(model.predict(row));
        }
        self.stage = LaggedStage::Ready {
            model,
            fitted,
            history: test.to_vec(),
        };
        Ok(out)
    }

    fn predict_next(&self) -> Result<f64, ForecastError> {
        match &self.stage {
            LaggedStage::Ready { model, history, .. } => {
                Ok(model.predict(&last_window(history, self.params.n_lags)?))
            }
            _ => Err(ForecastError::NoModel),
        }
    }

    fn fitted_values(&self) -> Option<&[Option<f64>]> {
        match &self.stage {
            LaggedStage::Unfitted => None,
            LaggedStage::Fitted { fitted, .. } | LaggedStage::Ready { fitted, .. } => Some(fitted),
        }
    }
}

#[derive(Debug, Clone)]
enum ArimaStage {
    Unfitted,
    Fitted(ArimaFitted),
    Ready(ArimaFitted),
}

/// Walk-forward ARIMA: parameters fixed after `fit`, state advanced per test bar.
#[derive(Debug, Clone)]
pub struct ArimaForecaster {
    order: ArimaOrder,
    stage: ArimaStage,
}

impl ArimaForecaster {
    pub fn new(order: ArimaOrder) -> Self {
        Self {
            order,
            stage: ArimaStage::Unfitted,
        }
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    fn fit(&mut self, train: &[f64]) -> Result<(), ForecastError> {
        self.stage = ArimaStage::Fitted(ArimaFitted::fit(train, self.order)?);
        Ok(())
    }

    fn predict(&mut self, test: &[f64]) -> Result<Vec<Option<f64>>, ForecastError> {
        let state = match std::mem::replace(&mut self.stage, ArimaStage::Unfitted) {
            ArimaStage::Unfitted => return Err(ForecastError::NoModel),
            ArimaStage::Fitted(s) | ArimaStage::Ready(s) => s,
        };
        let (forecasts, state) = walk_forward(state, test);
        self.stage = ArimaStage::Ready(state);
        Ok(forecasts.into_iter().map(Some).collect())
    }

    fn predict_next(&self) -> Result<f64, ForecastError> {
        match &self.stage {
            ArimaStage::Ready(state) => Ok(state.peek()),
            _ => Err(ForecastError::NoModel),
        }
    }

    fn fitted_values(&self) -> Option<&[Option<f64>]> {
        match &self.stage {
            ArimaStage::Unfitted => None,
            ArimaStage::Fitted(s) | ArimaStage::Ready(s) => Some(s.fitted_values()),
        }
    }
}

/// Forecasting model for one indicator. Lifecycle: `fit` -> `predict` -> `predict_next`.
#[derive(Debug, Clone)]
pub enum Forecaster {
    Lagged(LaggedForecaster),
    Arima(ArimaForecaster),
}

impl Forecaster {
    /// Bars of context the test partition spends before its first valid prediction.
    pub fn n_lags(&self) -> usize {
        match self {
            Self::Lagged(m) => m.params.n_lags,
            Self::Arima(_) => 0,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::Lagged(m) => m.method,
            Self::Arima(_) => Method::Arima,
        }
    }

    pub fn fit(&mut self, train: &[f64]) -> Result<(), ForecastError> {
        match self {
            Self::Lagged(m) => m.fit(train),
            Self::Arima(m) => m.fit(train),
        }
    }

    /// Predictions aligned to `test`; warm-up positions are `None`.
    pub fn predict(&mut self, test: &[f64]) -> Result<Vec<Option<f64>>, ForecastError> {
        match self {
            Self::Lagged(m) => m.predict(test),
            Self::Arima(m) => m.predict(test),
        }
    }

    /// Forecast for the bar after the last observation seen by `predict`.
    pub fn predict_next(&self) -> Result<f64, ForecastError> {
        match self {
            Self::Lagged(m) => m.predict_next(),
            Self::Arima(m) => m.predict_next(),
        }
    }

    /// In-sample predictions over the training partition.
    pub fn fitted_values(&self) -> Result<&[Option<f64>], ForecastError> {
        let fitted = match self {
            Self::Lagged(m) => m.fitted_values(),
            Self::Arima(m) => m.fitted_values(),
        };
        fitted.ok_or(ForecastError::NoModel)
    }

    /// Minimum series length for a split at `train_size`.
    pub fn required_len(&self, train_size: usize) -> usize {
        train_size + self.n_lags() + 1
    }

    /// Split `closes` at `train_size`, fit on the head, predict the tail.
    /// The result spans the whole series with `None` before the first valid prediction.
    pub fn run(&mut self, closes: &[f64], train_size: usize) -> Result<Vec<Option<f64>>, ForecastError> {
        if train_size <= self.n_lags() {
            return Err(ForecastError::insufficient(self.n_lags() + 1, train_size));
        }
        let required = self.required_len(train_size);
        if closes.len() < required {
            return Err(ForecastError::insufficient(required, closes.len()));
        }
        let (train, test) = closes.split_at(train_size);
        self.fit(train)?;
        let test_predictions = self.predict(test)?;
        let mut out = vec![None; train_size];
        out.extend(test_predictions);
        Ok(out)
    }
}

/// Map an indicator to its forecaster, filling missing parameters from config.
pub fn build_forecaster(spec: &IndicatorSpec, cfg: &ForecastConfig) -> Result<Forecaster, ForecastError> {
    if spec.method == Method::Arima {
        let [p, d, q] = cfg.arima_order;
        let order = ArimaOrder::new(
            spec.param_usize(0, "p")?.unwrap_or(p),
            spec.param_usize(1, "d")?.unwrap_or(d),
            spec.param_usize(2, "q")?.unwrap_or(q),
        );
        return Ok(Forecaster::Arima(ArimaForecaster::new(order)));
    }
    let params = LagModelParams::resolve(spec, cfg)?;
    Ok(Forecaster::Lagged(LaggedForecaster::new(spec.method, params)))
}
