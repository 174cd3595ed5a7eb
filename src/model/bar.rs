use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// One daily observation as delivered by the data collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
}

/// Ordered, validated bar history for a single ticker. Immutable once built.
#[derive(Debug, Clone)]
pub struct BarSeries {
    ticker: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validates strict timestamp ordering and finite values.
    pub fn new(ticker: impl Into<String>, bars: Vec<Bar>) -> Result<Self, ForecastError> {
        let ticker = ticker.into().trim().to_ascii_uppercase();
        for (i, bar) in bars.iter().enumerate() {
            if !bar.close.is_finite() || !bar.volume.is_finite() {
                return Err(ForecastError::InvalidSeries {
                    ticker,
                    reason: format!("non-finite close/volume at bar {}", i),
                });
            }
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(ForecastError::InvalidSeries {
                    ticker,
                    reason: format!(
                        "timestamps must be strictly increasing (bar {} at {})",
                        i, bar.timestamp
                    ),
                });
            }
        }
        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn accepts_ordered_bars() {
        let series = BarSeries::new(" petr4 ", vec![bar(1, 10.0), bar(2, 10.5), bar(3, 10.2)]).unwrap();
        assert_eq!(series.ticker(), "PETR4");
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![10.0, 10.5, 10.2]);
        assert!((series.last().unwrap().close - 10.2).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let err = BarSeries::new("VALE3", vec![bar(1, 10.0), bar(1, 10.5)]).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidSeries { .. }));
    }

    #[test]
    fn rejects_unordered_timestamps() {
        assert!(BarSeries::new("VALE3", vec![bar(2, 10.0), bar(1, 10.5)]).is_err());
    }

    #[test]
    fn rejects_non_finite_close() {
        assert!(BarSeries::new("VALE3", vec![bar(1, f64::NAN)]).is_err());
    }

    #[test]
    fn empty_series_is_valid() {
        let series = BarSeries::new("ITUB4", Vec::new()).unwrap();
        assert!(series.is_empty());
        assert!(series.last().is_none());
    }
}
