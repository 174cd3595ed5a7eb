use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backtest::BacktestSummary;
use crate::model::indicator::IndicatorSpec;

/// Chosen indicator for one ticker, as persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestStrategy {
    pub indicator: IndicatorSpec,
    /// `None` when the score was NaN (JSON has no NaN).
    pub score: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

pub type BestStrategies = BTreeMap<String, BestStrategy>;

pub fn load_best_strategies(path: &Path) -> Result<BestStrategies> {
    if !path.exists() {
        return Ok(BestStrategies::new());
    }
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&payload).context("failed to parse best strategies json")
}

pub fn persist_best_strategies(path: &Path, strategies: &BestStrategies) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(strategies)
        .context("failed to serialize best strategies json")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Merge the top-ranked row of each ticker over the stored file. Tickers absent
/// from `ranked` keep their previous entry.
pub fn update_best_strategies(
    path: &Path,
    ranked: &BTreeMap<String, Vec<BacktestSummary>>,
    now: DateTime<Utc>,
) -> Result<BestStrategies> {
    let mut stored = load_best_strategies(path)?;
    for (ticker, summaries) in ranked {
        let Some(best) = summaries.first() else {
            continue;
        };
        stored.insert(
            ticker.clone(),
            BestStrategy {
                indicator: best.indicator.clone(),
                score: Some(best.score).filter(|s| s.is_finite()),
                updated_at: now,
            },
        );
    }
    persist_best_strategies(path, &stored)?;
    Ok(stored)
}
