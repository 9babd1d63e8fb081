//! Prediction output types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Sell,
    Hold,
    Buy,
}

impl Signal {
    /// Class order of the output head: sell = 0, hold = 1, buy = 2
    pub const ORDER: [Signal; 3] = [Signal::Sell, Signal::Hold, Signal::Buy];

    /// Create from a class index of the output head
    pub fn from_class(class: usize) -> Option<Self> {
        Self::ORDER.get(class).copied()
    }

    pub fn class_index(&self) -> usize {
        match self {
            Signal::Sell => 0,
            Signal::Hold => 1,
            Signal::Buy => 2,
        }
    }

    /// Direction of the price adjustment: +1 buy, -1 sell, 0 hold
    pub fn direction(&self) -> f64 {
        match self {
            Signal::Buy => 1.0,
            Signal::Sell => -1.0,
            Signal::Hold => 0.0,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
            Signal::Buy => "BUY",
        };
        write!(f, "{}", s)
    }
}

/// Class probabilities, summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub sell: f64,
    pub hold: f64,
    pub buy: f64,
}

impl Probabilities {
    /// From a slice in sell / hold / buy order
    pub fn from_slice(p: &[f64]) -> Option<Self> {
        match p {
            [sell, hold, buy] => Some(Self {
                sell: *sell,
                hold: *hold,
                buy: *buy,
            }),
            _ => None,
        }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.sell, self.hold, self.buy]
    }

    /// Index of the largest probability; the first one wins ties
    pub fn argmax(&self) -> usize {
        let values = self.to_array();
        let mut best = 0;
        for (i, &v) in values.iter().enumerate().skip(1) {
            if v > values[best] {
                best = i;
            }
        }
        best
    }

    pub fn max(&self) -> f64 {
        self.sell.max(self.hold).max(self.buy)
    }
}

/// Decomposed predictive uncertainty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    /// Normalized entropy of the class distribution
    pub epistemic: f64,
    /// One minus confidence
    pub aleatoric: f64,
    /// sqrt(epistemic² + aleatoric²)
    pub total: f64,
}

/// Heuristic market readings derived from the raw input sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalytics {
    /// tanh of the relative close change across the sequence
    pub trend_strength: f64,
    /// Last RSI reading mapped to [0, 1]
    pub momentum_score: f64,
    /// Last volatility reading
    pub volatility_forecast: f64,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetadata {
    pub model_version: String,
    /// Number of time steps the network consumed
    pub sequence_length: usize,
    pub processing_time_ms: f64,
    /// 1.0 for clean input, lower when values had to be repaired
    pub data_quality: f64,
}

/// Result of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub signal: Signal,
    pub confidence: f64,
    pub probabilities: Probabilities,
    pub price_target: f64,
    /// Per-step attention weights, empty when attention is disabled
    pub attention_weights: Vec<f64>,
    pub important_time_steps: Vec<usize>,
    pub important_features: Vec<String>,
    pub uncertainty: Uncertainty,
    pub analytics: MarketAnalytics,
    pub metadata: PredictionMetadata,
}

impl PredictionOutput {
    /// Whether the prediction is worth acting on
    pub fn is_actionable(&self, min_confidence: f64, min_quality: f64) -> bool {
        self.signal != Signal::Hold
            && self.confidence >= min_confidence
            && self.metadata.data_quality >= min_quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_class_order() {
        assert_eq!(Signal::from_class(0), Some(Signal::Sell));
        assert_eq!(Signal::from_class(1), Some(Signal::Hold));
        assert_eq!(Signal::from_class(2), Some(Signal::Buy));
        assert_eq!(Signal::from_class(3), None);
        for s in Signal::ORDER {
            assert_eq!(Signal::from_class(s.class_index()), Some(s));
        }
    }

    #[test]
    fn test_probabilities_argmax() {
        let p = Probabilities::from_slice(&[0.2, 0.3, 0.5]).unwrap();
        assert_eq!(p.argmax(), 2);
        assert_eq!(p.max(), 0.5);

        let tie = Probabilities::from_slice(&[0.4, 0.4, 0.2]).unwrap();
        assert_eq!(tie.argmax(), 0);

        assert!(Probabilities::from_slice(&[0.5, 0.5]).is_none());
    }

    #[test]
    fn test_signal_serde() {
        assert_eq!(serde_json::to_string(&Signal::Buy).unwrap(), "\"buy\"");
        assert_eq!(Signal::Sell.to_string(), "SELL");
    }
}
