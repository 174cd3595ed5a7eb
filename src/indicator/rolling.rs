use crate::error::ForecastError;

/// Windowed mean over the last `window` pushes, ring-buffered so each push is O(1).
#[derive(Debug, Clone)]
pub struct RollingMean {
    window: usize,
    buffer: Vec<f64>,
    head: usize,
    filled: usize,
    sum: f64,
}

impl RollingMean {
    pub fn new(window: usize) -> Result<Self, ForecastError> {
        if window == 0 {
            return Err(ForecastError::invalid_param("window", "must be > 0"));
        }
        Ok(Self {
            window,
            buffer: vec![0.0; window],
            head: 0,
            filled: 0,
            sum: 0.0,
        })
    }

    /// Push the next observation; `None` until the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.filled == self.window {
            self.sum -= self.buffer[self.head];
        } else {
            self.filled += 1;
        }
        self.buffer[self.head] = value;
        self.sum += value;
        self.head = (self.head + 1) % self.window;
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.is_ready() {
            Some(self.sum / self.window as f64)
        } else {
            None
        }
    }

    pub fn is_ready(&self) -> bool {
        self.filled == self.window
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Trailing mean aligned to `values`; the first `window - 1` entries are `None`.
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>, ForecastError> {
    let mut mean = RollingMean::new(window)?;
    Ok(values.iter().map(|v| mean.push(*v)).collect())
}
