use serde::Serialize;

use crate::model::indicator::IndicatorSpec;
use crate::model::signal::Signal;

/// Latest state of a pair run, as needed for a live trading alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub ticker: String,
    pub indicator: IndicatorSpec,
    pub last_close: f64,
    pub last_signal: Signal,
    pub last_signal_length: usize,
    pub last_volume_strength: Option<f64>,
    pub last_entry_price: Option<f64>,
    pub predicted_next_close: f64,
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

/// Render the four-line alert text. Delivery is up to the caller.
pub fn format_alert(snapshot: &AlertSnapshot) -> String {
    format!(
        "#{} | {} ({}) Duration {} | Price {:.2}\n\
         Volume Strength: {}\n\
         Entry Price: {}\n\
         Predicted Price: {:.2}",
        snapshot.ticker,
        snapshot.last_signal.label(),
        snapshot.indicator.compact_label(),
        snapshot.last_signal_length,
        snapshot.last_close,
        fmt_opt(snapshot.last_volume_strength),
        fmt_opt(snapshot.last_entry_price),
        snapshot.predicted_next_close,
    )
}
