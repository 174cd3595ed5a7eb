use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data: need at least {required} bars, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("invalid bar series for {ticker}: {reason}")]
    InvalidSeries { ticker: String, reason: String },

    #[error("unknown indicator method '{0}'")]
    UnknownMethod(String),

    #[error("unknown scoring preset '{0}'")]
    UnknownPreset(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("no fitted model: call fit and predict before predict_next")]
    NoModel,

    #[error("required column missing in backtest: {column}")]
    MissingColumn { column: String },

    #[error("backtest simulation failed at bar {bar}: {cause}")]
    Simulation { bar: usize, cause: String },
}

impl ForecastError {
    pub fn insufficient(required: usize, available: usize) -> Self {
        Self::InsufficientData {
            required,
            available,
        }
    }

    pub fn invalid_param(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }
}
