use serde::Serialize;

use crate::config::SignalConfig;
use crate::error::ForecastError;
use crate::indicator::rolling_mean;
use crate::model::signal::Signal;

/// Per-bar signal columns, all aligned to the bar series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalFrame {
    pub raw: Vec<Signal>,
    /// Length of the run of identical raw values ending at each bar; 0 on neutral bars.
    pub run_length: Vec<usize>,
    pub signal: Vec<Signal>,
    pub volume_ma: Vec<Option<f64>>,
    /// Relative distance of volume from its moving average. `None` while the
    /// average warms up or is zero.
    pub volume_strength: Vec<Option<f64>>,
}

impl SignalFrame {
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    pub fn last_signal(&self) -> Signal {
        self.signal.last().copied().unwrap_or_default()
    }

    pub fn last_run_length(&self) -> usize {
        self.run_length.last().copied().unwrap_or(0)
    }

    pub fn last_volume_strength(&self) -> Option<f64> {
        self.volume_strength.last().copied().flatten()
    }
}

/// Compare predicted against actual close with a hysteresis band.
pub fn raw_signal(close: f64, predicted: Option<f64>, hysteresis_pct: f64) -> Signal {
    let Some(pred) = predicted else {
        return Signal::Hold;
    };
    let band = hysteresis_pct / 100.0;
    if pred > (1.0 + band) * close {
        Signal::Buy
    } else if pred < (1.0 - band) * close {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Run-length of identical values ending at each index, zeroed on `Hold`.
pub fn run_lengths(raw: &[Signal]) -> Vec<usize> {
    let mut out = Vec::with_capacity(raw.len());
    let mut run = 0usize;
    for (i, s) in raw.iter().enumerate() {
        run = if i > 0 && raw[i - 1] == *s { run + 1 } else { 1 };
        out.push(if s.is_actionable() { run } else { 0 });
    }
    out
}

/// Keep a raw signal only once it has persisted for `persistence` bars.
pub fn apply_persistence(raw: &[Signal], run_length: &[usize], persistence: usize) -> Vec<Signal> {
    raw.iter()
        .zip(run_length)
        .map(|(s, run)| if *run >= persistence { *s } else { Signal::Hold })
        .collect()
}

/// Volume moving average and strength. Informational; never gates a signal.
pub fn volume_confirmation(
    volumes: &[f64],
    window: usize,
) -> Result<(Vec<Option<f64>>, Vec<Option<f64>>), ForecastError> {
    let ma = rolling_mean(volumes, window)?;
    let strength = volumes
        .iter()
        .zip(&ma)
        .map(|(v, ma)| match ma {
            Some(m) if *m != 0.0 => Some((v - m) / m),
            _ => None,
        })
        .collect();
    Ok((ma, strength))
}

pub fn generate_signals(
    closes: &[f64],
    predictions: &[Option<f64>],
    volumes: &[f64],
    cfg: &SignalConfig,
) -> Result<SignalFrame, ForecastError> {
    if predictions.len() != closes.len() {
        return Err(ForecastError::missing_column("Predicted"));
    }
    if volumes.len() != closes.len() {
        return Err(ForecastError::missing_column("Volume"));
    }
    if cfg.persistence == 0 {
        return Err(ForecastError::invalid_param("persistence", "must be > 0"));
    }
    if !(cfg.hysteresis_pct >= 0.0) {
        return Err(ForecastError::invalid_param("hysteresis_pct", "must be >= 0"));
    }

    let raw: Vec<Signal> = closes
        .iter()
        .zip(predictions)
        .map(|(c, p)| raw_signal(*c, *p, cfg.hysteresis_pct))
        .collect();
    let run_length = run_lengths(&raw);
    let signal = apply_persistence(&raw, &run_length, cfg.persistence);
    let (volume_ma, volume_strength) = volume_confirmation(volumes, cfg.volume_window)?;

    Ok(SignalFrame {
        raw,
        run_length,
        signal,
        volume_ma,
        volume_strength,
    })
}
