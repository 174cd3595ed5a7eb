use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;

use crate::alert::AlertSnapshot;
use crate::backtest::{run_backtest, summarize, BacktestFrame, BacktestSummary};
use crate::config::Config;
use crate::error::ForecastError;
use crate::model::bar::BarSeries;
use crate::model::indicator::IndicatorSpec;
use crate::predictor::{build_forecaster, evaluate, ForecastMetrics};
use crate::signal::{generate_signals, SignalFrame};

/// Everything produced for one (ticker, indicator) pair.
#[derive(Debug, Clone)]
pub struct PairRun {
    pub indicator: IndicatorSpec,
    pub predictions: Vec<Option<f64>>,
    pub signals: SignalFrame,
    pub backtest: BacktestFrame,
    pub summary: BacktestSummary,
    pub metrics: ForecastMetrics,
    pub alert: AlertSnapshot,
}

/// Forecast, filter, simulate and summarize a single pair.
pub fn run_pair(series: &BarSeries, spec: &IndicatorSpec, cfg: &Config) -> Result<PairRun, ForecastError> {
    let train_size = cfg.forecast.train_size;
    let closes = series.closes();

    let mut forecaster = build_forecaster(spec, &cfg.forecast)?;
    let predictions = forecaster.run(&closes, train_size)?;
    let signals = generate_signals(&closes, &predictions, &series.volumes(), &cfg.signal)?;
    let backtest = run_backtest(series, &predictions, &signals.signal, train_size, &cfg.backtest)?;
    let summary = summarize(&backtest, series.ticker(), spec);
    let metrics = evaluate(&closes, &predictions, train_size);
    let predicted_next_close = forecaster.predict_next()?;

    tracing::debug!(
        ticker = %series.ticker(),
        indicator = %spec,
        return_strategy = summary.return_strategy,
        trades = summary.trades,
        mae = ?metrics.mae,
        hit_rate = ?metrics.hit_rate,
        "pair run complete"
    );

    let alert = AlertSnapshot {
        ticker: series.ticker().to_string(),
        indicator: spec.clone(),
        last_close: closes.last().copied().unwrap_or(f64::NAN),
        last_signal: signals.last_signal(),
        last_signal_length: signals.last_run_length(),
        last_volume_strength: signals.last_volume_strength(),
        last_entry_price: backtest.last_entry_price(),
        predicted_next_close,
    };

    Ok(PairRun {
        indicator: spec.clone(),
        predictions,
        signals,
        backtest,
        summary,
        metrics,
        alert,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPair {
    pub ticker: String,
    pub indicator: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Summaries per ticker in indicator order, until ranked.
    pub results: BTreeMap<String, Vec<BacktestSummary>>,
    /// Successful runs in grid order (ticker-major).
    pub runs: Vec<PairRun>,
    pub skipped: Vec<SkippedPair>,
}

/// Run the full (ticker x indicator) grid on the rayon pool. A failing pair is
/// logged and skipped; it never affects its siblings. Repeated (ticker, label)
/// pairs run once, at their first position.
pub fn run_batch(series: &[BarSeries], indicators: &[IndicatorSpec], cfg: &Config) -> BatchOutcome {
    let mut seen = HashSet::new();
    let grid: Vec<(&BarSeries, &IndicatorSpec)> = series
        .iter()
        .flat_map(|s| indicators.iter().map(move |i| (s, i)))
        .filter(|(s, i)| seen.insert((s.ticker().to_string(), i.label())))
        .collect();

    let outcomes: Vec<(&BarSeries, &IndicatorSpec, Result<PairRun, ForecastError>)> = grid
        .par_iter()
        .map(|(s, i)| (*s, *i, run_pair(s, i, cfg)))
        .collect();

    let mut batch = BatchOutcome::default();
    for (s, spec, outcome) in outcomes {
        match outcome {
            Ok(run) => {
                batch
                    .results
                    .entry(s.ticker().to_string())
                    .or_default()
                    .push(run.summary.clone());
                batch.runs.push(run);
            }
            Err(err) => {
                tracing::warn!(
                    ticker = %s.ticker(),
                    method = %spec.method,
                    params = ?spec.params,
                    error = %err,
                    "pair skipped"
                );
                batch.skipped.push(SkippedPair {
                    ticker: s.ticker().to_string(),
                    indicator: spec.label(),
                    error: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        pairs = grid.len(),
        completed = batch.runs.len(),
        skipped = batch.skipped.len(),
        "batch complete"
    );
    batch
}
