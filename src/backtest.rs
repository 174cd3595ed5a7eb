use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BacktestConfig;
use crate::error::ForecastError;
use crate::model::bar::BarSeries;
use crate::model::indicator::IndicatorSpec;
use crate::model::signal::Signal;

/// Column-wise simulation output, every column aligned to the bar series.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestFrame {
    pub timestamps: Vec<DateTime<Utc>>,
    pub close: Vec<f64>,
    pub predicted: Vec<Option<f64>>,
    /// Signal of the previous bar; `None` on the first bar.
    pub position: Vec<Option<i8>>,
    pub trade_legs: Vec<u32>,
    pub cumulative_legs: Vec<u64>,
    pub entry_price: Vec<Option<f64>>,
    pub bar_return: Vec<f64>,
    pub strategy_return: Vec<f64>,
    pub cumulative_market: Vec<f64>,
    pub cumulative_strategy: Vec<f64>,
    pub drawdown: Vec<f64>,
}

impl BacktestFrame {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Completed round trips: every entry and exit is one leg.
    pub fn trades(&self) -> u64 {
        self.cumulative_legs.last().copied().unwrap_or(0) / 2
    }

    pub fn last_entry_price(&self) -> Option<f64> {
        self.entry_price.last().copied().flatten()
    }

    pub fn max_drawdown(&self) -> f64 {
        self.drawdown.iter().copied().fold(0.0_f64, f64::min).abs()
    }

    pub fn chart_series(&self) -> ChartSeries {
        ChartSeries {
            timestamps: self.timestamps.clone(),
            close: self.close.clone(),
            predicted: self.predicted.clone(),
            cumulative_market: self.cumulative_market.clone(),
            cumulative_strategy: self.cumulative_strategy.clone(),
        }
    }
}

/// Two overlays: close vs prediction, buy-and-hold vs strategy.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub close: Vec<f64>,
    pub predicted: Vec<Option<f64>>,
    pub cumulative_market: Vec<f64>,
    pub cumulative_strategy: Vec<f64>,
}

/// Headline numbers of one (ticker, indicator) backtest. `score` is filled by scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub ticker: String,
    pub indicator: IndicatorSpec,
    pub label: String,
    pub return_market: f64,
    pub return_strategy: f64,
    pub trades: u64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub score: f64,
}

/// Simulate a long (or long/short) strategy that holds yesterday's signal.
pub fn run_backtest(
    series: &BarSeries,
    predictions: &[Option<f64>],
    signals: &[Signal],
    train_size: usize,
    cfg: &BacktestConfig,
) -> Result<BacktestFrame, ForecastError> {
    let n = series.len();
    if predictions.len() != n {
        return Err(ForecastError::missing_column("Predicted_Close"));
    }
    if signals.len() != n {
        return Err(ForecastError::missing_column("Signal"));
    }
    let close = series.closes();

    let position: Vec<Option<i8>> = (0..n)
        .map(|i| {
            i.checked_sub(1).map(|prev| {
                let s = signals[prev].value();
                if !cfg.allow_short && s < 0 {
                    0
                } else {
                    s
                }
            })
        })
        .collect();

    let mut trade_legs = Vec::with_capacity(n);
    let mut cumulative_legs = Vec::with_capacity(n);
    let mut entry_price = Vec::with_capacity(n);
    let mut legs_total = 0u64;
    let mut last_entry: Option<f64> = None;
    for i in 0..n {
        let current = position[i].unwrap_or(0);
        let previous = i.checked_sub(1).and_then(|j| position[j]).unwrap_or(0);
        let legs = (i16::from(current) - i16::from(previous)).unsigned_abs() as u32;
        // A flip (two legs) keeps the previous entry price.
        if legs == 1 {
            last_entry = Some(close[i]);
        }
        legs_total += u64::from(legs);
        trade_legs.push(legs);
        cumulative_legs.push(legs_total);
        entry_price.push(last_entry);
    }

    let mut bar_return = Vec::with_capacity(n);
    for i in 0..n {
        if i < train_size || i == 0 {
            bar_return.push(0.0);
            continue;
        }
        let r = close[i] / close[i - 1] - 1.0;
        if !r.is_finite() {
            return Err(ForecastError::Simulation {
                bar: i,
                cause: format!(
                    "non-finite return from close {} -> {}",
                    close[i - 1],
                    close[i]
                ),
            });
        }
        bar_return.push(r);
    }

    let strategy_return: Vec<f64> = position
        .iter()
        .zip(&bar_return)
        .map(|(pos, r)| match pos {
            Some(p) => f64::from(*p) * r,
            None => cfg.missing_return_fill,
        })
        .collect();

    let cumulative_market = cumulative_product(&bar_return);
    let cumulative_strategy = cumulative_product(&strategy_return);
    if let Some(bar) = cumulative_strategy.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::Simulation {
            bar,
            cause: "cumulative strategy return is not finite".to_string(),
        });
    }
    let drawdown = drawdown_series(&cumulative_strategy);

    Ok(BacktestFrame {
        timestamps: series.timestamps(),
        close,
        predicted: predictions.to_vec(),
        position,
        trade_legs,
        cumulative_legs,
        entry_price,
        bar_return,
        strategy_return,
        cumulative_market,
        cumulative_strategy,
        drawdown,
    })
}

pub fn cumulative_product(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

/// `(equity - running max) / running max`; never positive.
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|v| {
            peak = peak.max(*v);
            if peak == 0.0 {
                0.0
            } else {
                ((v - peak) / peak).min(0.0)
            }
        })
        .collect()
}

/// `mean / sample std * sqrt(n)`; NaN when undefined.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let n = returns.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std == 0.0 {
        return f64::NAN;
    }
    mean / std * (n as f64).sqrt()
}

pub fn summarize(frame: &BacktestFrame, ticker: &str, indicator: &IndicatorSpec) -> BacktestSummary {
    BacktestSummary {
        ticker: ticker.to_string(),
        indicator: indicator.clone(),
        label: format!("{}_{}", ticker, indicator.label()),
        return_market: frame.cumulative_market.last().copied().unwrap_or(1.0),
        return_strategy: frame.cumulative_strategy.last().copied().unwrap_or(1.0),
        trades: frame.trades(),
        sharpe: sharpe_ratio(&frame.strategy_return),
        max_drawdown: frame.max_drawdown(),
        score: 0.0,
    }
}
