pub mod rolling;

pub use rolling::{rolling_mean, RollingMean};
