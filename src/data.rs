use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::model::bar::{Bar, BarSeries};
use crate::model::indicator::IndicatorSpec;

#[derive(Debug, Deserialize)]
struct TickersFile {
    #[serde(default)]
    tickers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IndicatorEntry {
    ind_t: Option<String>,
    #[serde(default)]
    ind_p: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct IndicatorsFile {
    #[serde(default)]
    indicators: Vec<IndicatorEntry>,
}

pub fn load_tickers(path: &Path) -> Result<Vec<String>> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: TickersFile = serde_json::from_str(&payload)
        .with_context(|| format!("failed to parse tickers json {}", path.display()))?;
    let mut seen = HashSet::new();
    Ok(file
        .tickers
        .into_iter()
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect())
}

/// Entries without a method name are dropped, as are repeats of an earlier
/// label; an unknown method fails the load.
pub fn load_indicators(path: &Path) -> Result<Vec<IndicatorSpec>> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: IndicatorsFile = serde_json::from_str(&payload)
        .with_context(|| format!("failed to parse indicators json {}", path.display()))?;
    let mut seen = HashSet::new();
    let mut specs = Vec::new();
    for (t, p) in file
        .indicators
        .into_iter()
        .filter_map(|entry| entry.ind_t.map(|t| (t, entry.ind_p)))
        .filter(|(t, _)| !t.trim().is_empty())
    {
        let spec = IndicatorSpec::parse(&t, p).with_context(|| format!("in {}", path.display()))?;
        if seen.insert(spec.label()) {
            specs.push(spec);
        }
    }
    Ok(specs)
}

/// Supplier of bar history for a ticker.
pub trait BarSource {
    fn load(&self, ticker: &str) -> Result<BarSeries>;
}

/// Reads `<dir>/<TICKER>.json`, an array of `{timestamp, close, volume}`.
#[derive(Debug, Clone)]
pub struct JsonBarSource {
    dir: PathBuf,
}

impl JsonBarSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.json", ticker.trim().to_ascii_uppercase()))
    }
}

impl BarSource for JsonBarSource {
    fn load(&self, ticker: &str) -> Result<BarSeries> {
        let path = self.path_for(ticker);
        let payload = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let bars: Vec<Bar> = serde_json::from_str(&payload)
            .with_context(|| format!("failed to parse bars json {}", path.display()))?;
        Ok(BarSeries::new(ticker, bars)?)
    }
}

/// Load with up to `max_attempts` tries, logging each failure.
pub fn load_with_retry(source: &dyn BarSource, ticker: &str, max_attempts: u32) -> Result<BarSeries> {
    let attempts = max_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match source.load(ticker) {
            Ok(series) => return Ok(series),
            Err(err) => {
                tracing::warn!(
                    ticker = %ticker,
                    attempt,
                    max_attempts = attempts,
                    error = %format!("{:#}", err),
                    "bar load failed"
                );
                last_err = Some(err);
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| anyhow!("no attempts made"))
        .context(format!("giving up on {} after {} attempts", ticker, attempts)))
}
