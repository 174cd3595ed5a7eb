use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::scoring::{Preset, WeightOverrides};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub forecast: ForecastConfig,
    pub signal: SignalConfig,
    pub backtest: BacktestConfig,
    pub scoring: ScoringConfig,
    pub data: DataConfig,
    pub output: OutputConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Train/test split point shared by every method on a series.
    pub train_size: usize,
    pub lags: usize,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub ridge_alpha: f64,
    pub learning_rate: f64,
    pub seed: u64,
    pub arima_order: [usize; 3],
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            train_size: 100,
            lags: 5,
            n_estimators: 10,
            max_depth: 5,
            ridge_alpha: 1.0,
            learning_rate: 0.1,
            seed: 0,
            arima_order: [1, 1, 0],
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub hysteresis_pct: f64,
    pub persistence: usize,
    pub volume_window: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            hysteresis_pct: 0.5,
            persistence: 3,
            volume_window: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub allow_short: bool,
    /// Fill for strategy returns before any position exists. Must be non-zero,
    /// otherwise a flat strategy has zero variance; it biases Sharpe slightly.
    pub missing_return_fill: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            allow_short: false,
            missing_return_fill: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub preset: String,
    pub weights: WeightOverrides,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            preset: "basic".to_string(),
            weights: WeightOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub tickers: PathBuf,
    pub indicators: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/market"),
            tickers: PathBuf::from("config/tickers.json"),
            indicators: PathBuf::from("config/indicators.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub best_strategies: PathBuf,
    pub charts: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/results"),
            best_strategies: PathBuf::from("data/results/best_strategies.json"),
            charts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Attempts for collaborator I/O (bar loading). Core computations are never retried.
    pub max_attempts: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

fn config_path() -> PathBuf {
    std::env::var("MF_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl Config {
    /// Load from `MF_CONFIG_PATH` (or `config/default.toml`), after reading `.env`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from_path(&config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forecast.train_size == 0 {
            bail!("forecast.train_size must be > 0");
        }
        if self.forecast.lags == 0 {
            bail!("forecast.lags must be > 0");
        }
        if self.forecast.ridge_alpha < 0.0 {
            bail!("forecast.ridge_alpha must be >= 0");
        }
        if !(self.forecast.learning_rate > 0.0 && self.forecast.learning_rate <= 1.0) {
            bail!("forecast.learning_rate must be in (0, 1]");
        }
        if !(self.signal.hysteresis_pct >= 0.0) {
            bail!("signal.hysteresis_pct must be >= 0");
        }
        if self.signal.persistence == 0 {
            bail!("signal.persistence must be > 0");
        }
        if self.signal.volume_window == 0 {
            bail!("signal.volume_window must be > 0");
        }
        if !self.backtest.missing_return_fill.is_finite() {
            bail!("backtest.missing_return_fill must be finite");
        }
        if self.run.max_attempts == 0 {
            bail!("run.max_attempts must be > 0");
        }
        Preset::from_name(&self.scoring.preset).context("scoring.preset is invalid")?;
        Ok(())
    }
}
