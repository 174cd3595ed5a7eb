use serde::{Deserialize, Serialize};

/// Discrete trade direction for one bar. Serialized as -1 / 0 / +1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Signal {
    pub fn value(self) -> i8 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
            Self::Hold => 0,
        }
    }

    pub fn is_actionable(self) -> bool {
        self != Self::Hold
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "NEUTRAL",
        }
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        signal.value()
    }
}

impl TryFrom<i8> for Signal {
    type Error = String;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::Buy),
            -1 => Ok(Self::Sell),
            0 => Ok(Self::Hold),
            other => Err(format!("signal must be -1, 0 or 1, got {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_encoding() {
        for s in [Signal::Buy, Signal::Sell, Signal::Hold] {
            assert_eq!(Signal::try_from(s.value()).unwrap(), s);
        }
        assert!(Signal::try_from(2).is_err());
        assert_eq!(serde_json::to_string(&Signal::Sell).unwrap(), "-1");
        assert!(!Signal::Hold.is_actionable());
    }
}
