use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Closed set of forecasting methods an indicator can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Method {
    Linear,
    Ridge,
    DecisionTree,
    RandomForest,
    ExtraTrees,
    GradientBoosting,
    Knn,
    Arima,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Linear,
        Method::Ridge,
        Method::DecisionTree,
        Method::RandomForest,
        Method::ExtraTrees,
        Method::GradientBoosting,
        Method::Knn,
        Method::Arima,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Linear => "LR",
            Self::Ridge => "RR",
            Self::DecisionTree => "DT",
            Self::RandomForest => "RF",
            Self::ExtraTrees => "ET",
            Self::GradientBoosting => "GB",
            Self::Knn => "KNN",
            Self::Arima => "ARIMA",
        }
    }

    pub fn from_label(label: &str) -> Result<Self, ForecastError> {
        let key = label.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.label() == key)
            .ok_or_else(|| ForecastError::UnknownMethod(label.trim().to_string()))
    }

    /// Supervised methods consume lag windows; ARIMA works on the raw series.
    pub fn is_lagged(self) -> bool {
        self != Self::Arima
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Method {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

impl From<Method> for String {
    fn from(m: Method) -> Self {
        m.label().to_string()
    }
}

impl TryFrom<String> for Method {
    type Error = ForecastError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_label(&s)
    }
}

/// Method plus its ordered parameter list; identifies one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub method: Method,
    #[serde(default)]
    pub params: Vec<f64>,
}

impl IndicatorSpec {
    pub fn new(method: Method, params: Vec<f64>) -> Self {
        Self { method, params }
    }

    pub fn parse(method: &str, params: Vec<f64>) -> Result<Self, ForecastError> {
        Ok(Self::new(Method::from_label(method)?, params))
    }

    /// `RF_10_5_5`
    pub fn label(&self) -> String {
        let mut out = self.method.label().to_string();
        for p in &self.params {
            out.push('_');
            out.push_str(&format_param(*p));
        }
        out
    }

    /// `RF10/5/5`, the short form used in alert messages.
    pub fn compact_label(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| format_param(*p)).collect();
        format!("{}{}", self.method.label(), params.join("/"))
    }

    /// Integer parameter at `slot`, `None` when the slot is absent.
    pub fn param_usize(&self, slot: usize, name: &str) -> Result<Option<usize>, ForecastError> {
        let Some(&raw) = self.params.get(slot) else {
            return Ok(None);
        };
        if !raw.is_finite() || raw < 0.0 || raw.fract() != 0.0 {
            return Err(ForecastError::invalid_param(
                name,
                format!("expected a non-negative integer, got {}", raw),
            ));
        }
        Ok(Some(raw as usize))
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn format_param(p: f64) -> String {
    if p.is_finite() && p.fract() == 0.0 && p.abs() < 1e15 {
        format!("{}", p as i64)
    } else {
        format!("{}", p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        let spec = IndicatorSpec::parse("rf", vec![10.0, 5.0, 5.0]).unwrap();
        assert_eq!(spec.method, Method::RandomForest);
        assert_eq!(spec.label(), "RF_10_5_5");
        assert_eq!(spec.compact_label(), "RF10/5/5");
        assert_eq!(IndicatorSpec::new(Method::Ridge, vec![0.5]).label(), "RR_0.5");
        assert_eq!(IndicatorSpec::new(Method::Linear, vec![]).compact_label(), "LR");
    }

    #[test]
    fn unknown_method() {
        assert_eq!(
            Method::from_label(" svm "),
            Err(ForecastError::UnknownMethod("svm".to_string()))
        );
        assert!(serde_json::from_str::<Method>("\"XGB\"").is_err());
        assert_eq!(serde_json::from_str::<Method>("\"knn\"").unwrap(), Method::Knn);
    }

    #[test]
    fn integer_params() {
        let spec = IndicatorSpec::new(Method::Knn, vec![5.0, 2.5, -1.0]);
        assert_eq!(spec.param_usize(0, "k").unwrap(), Some(5));
        assert!(spec.param_usize(1, "max_depth").is_err());
        assert!(spec.param_usize(2, "n_lags").is_err());
        assert_eq!(spec.param_usize(3, "extra").unwrap(), None);
    }
}
