use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::backtest::BacktestSummary;
use crate::pipeline::{BatchOutcome, SkippedPair};
use crate::predictor::ForecastMetrics;
use crate::scoring::{best_per_ticker, ScoreWeights};

#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub ticker: String,
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub label: String,
    pub metrics: ForecastMetrics,
}

/// One backtest batch as written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsExport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub preset: String,
    pub weights: ScoreWeights,
    pub results: BTreeMap<String, Vec<BacktestSummary>>,
    pub ranking: Vec<RankedEntry>,
    pub metrics: Vec<RunMetrics>,
    pub skipped: Vec<SkippedPair>,
}

impl ResultsExport {
    /// Expects `batch.results` already scored and ranked.
    pub fn from_batch(batch: &BatchOutcome, preset: &str, weights: ScoreWeights) -> Self {
        let ranking = best_per_ticker(&batch.results)
            .into_iter()
            .map(|s| RankedEntry {
                ticker: s.ticker.clone(),
                label: s.label.clone(),
                score: s.score,
            })
            .collect();
        let metrics = batch
            .runs
            .iter()
            .map(|r| RunMetrics {
                label: r.summary.label.clone(),
                metrics: r.metrics,
            })
            .collect();
        Self {
            run_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            preset: preset.to_string(),
            weights,
            results: batch.results.clone(),
            ranking,
            metrics,
            skipped: batch.skipped.clone(),
        }
    }
}

/// Write `results_<run_id>.json` under `dir` and return its path.
pub fn write_results(dir: &Path, export: &ResultsExport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("results_{}.json", export.run_id));
    let json = serde_json::to_string_pretty(export).context("failed to serialize results json")?;
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
