pub mod alert;
pub mod backtest;
#[cfg(feature = "charts")]
pub mod chart;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod features;
pub mod indicator;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod scoring;
pub mod signal;
pub mod strategy_store;

pub use error::ForecastError;
