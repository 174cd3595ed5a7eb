use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backtest::BacktestSummary;
use crate::error::ForecastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Preset {
    Basic,
    Balanced,
    Aggressive,
    Defensive,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Basic,
        Preset::Balanced,
        Preset::Aggressive,
        Preset::Defensive,
    ];

    /// Case-insensitive; the legacy spelling `agressive` is accepted.
    pub fn from_name(name: &str) -> Result<Self, ForecastError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "balanced" => Ok(Self::Balanced),
            "aggressive" | "agressive" => Ok(Self::Aggressive),
            "defensive" => Ok(Self::Defensive),
            _ => Err(ForecastError::UnknownPreset(name.trim().to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
            Self::Defensive => "defensive",
        }
    }

    pub fn weights(self) -> ScoreWeights {
        let (w_return, w_trades, w_sharpe, w_drdown) = match self {
            Self::Basic => (1.0, 0.02, 0.0, 0.0),
            Self::Balanced => (1.0, 0.04, 0.01, 0.05),
            Self::Aggressive => (1.0, 0.0, 0.02, 0.0),
            Self::Defensive => (1.0, 0.05, 0.0, 0.05),
        };
        ScoreWeights {
            w_return,
            w_trades,
            w_sharpe,
            w_drdown,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub w_return: f64,
    pub w_trades: f64,
    pub w_sharpe: f64,
    pub w_drdown: f64,
}

impl ScoreWeights {
    pub fn with_overrides(mut self, overrides: &WeightOverrides) -> Self {
        if let Some(w) = overrides.w_return {
            self.w_return = w;
        }
        if let Some(w) = overrides.w_trades {
            self.w_trades = w;
        }
        if let Some(w) = overrides.w_sharpe {
            self.w_sharpe = w;
        }
        if let Some(w) = overrides.w_drdown {
            self.w_drdown = w;
        }
        self
    }

    /// Linear in every field. A NaN Sharpe yields a NaN score even at zero weight.
    pub fn score(&self, summary: &BacktestSummary) -> f64 {
        self.w_return * summary.return_strategy - self.w_trades * summary.trades as f64
            + self.w_sharpe * summary.sharpe
            - self.w_drdown * summary.max_drawdown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightOverrides {
    pub w_return: Option<f64>,
    pub w_trades: Option<f64>,
    pub w_sharpe: Option<f64>,
    pub w_drdown: Option<f64>,
}

/// Resolve a preset name and merge overrides over its weights.
pub fn resolve_weights(preset: &str, overrides: &WeightOverrides) -> Result<ScoreWeights, ForecastError> {
    Ok(Preset::from_name(preset)?.weights().with_overrides(overrides))
}

/// Descending by score, NaN last.
fn by_score_desc(a: &BacktestSummary, b: &BacktestSummary) -> Ordering {
    match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.total_cmp(&a.score),
    }
}

/// Score every summary in place and sort each ticker's list. The sort is stable,
/// so equal scores keep their insertion order.
pub fn score_and_rank(
    results: &mut BTreeMap<String, Vec<BacktestSummary>>,
    preset: &str,
    overrides: &WeightOverrides,
) -> Result<ScoreWeights, ForecastError> {
    let weights = resolve_weights(preset, overrides)?;
    for summaries in results.values_mut() {
        for summary in summaries.iter_mut() {
            summary.score = weights.score(summary);
        }
        summaries.sort_by(by_score_desc);
    }
    Ok(weights)
}

/// Top-ranked summary per ticker. Expects lists already ranked.
pub fn best_per_ticker(results: &BTreeMap<String, Vec<BacktestSummary>>) -> Vec<&BacktestSummary> {
    results.values().filter_map(|s| s.first()).collect()
}
