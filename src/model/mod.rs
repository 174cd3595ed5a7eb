pub mod bar;
pub mod indicator;
pub mod signal;

pub use bar::{Bar, BarSeries};
pub use indicator::{IndicatorSpec, Method};
pub use signal::Signal;
