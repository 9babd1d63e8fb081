//! Derived analytics: uncertainty, price target, market readings and
//! importance flags

use super::output::{MarketAnalytics, Probabilities, Signal, Uncertainty};
use crate::data::FeatureVector;
use crate::math::{entropy, tanh};
use ndarray::Array1;

/// Attention weights above this fraction of the maximum mark a step important
pub const IMPORTANT_STEP_RATIO: f64 = 0.7;

/// Maximum relative price move applied per unit of confidence × volatility
pub const PRICE_ADJUSTMENT: f64 = 0.1;

/// Entropy-based uncertainty of a class distribution
pub fn uncertainty(probabilities: &Probabilities, confidence: f64) -> Uncertainty {
    let p = Array1::from(probabilities.to_array().to_vec());
    let max_entropy = (p.len() as f64).ln();
    let epistemic = if max_entropy > 0.0 {
        entropy(&p) / max_entropy
    } else {
        0.0
    };
    let aleatoric = 1.0 - confidence;

    Uncertainty {
        epistemic,
        aleatoric,
        total: (epistemic.powi(2) + aleatoric.powi(2)).sqrt(),
    }
}

/// Last usable close nudged in the signal direction by confidence × volatility
///
/// Corrupt trailing values fall back to the most recent usable reading; 0.0
/// only when no step has a positive finite close. A coarse adjustment, not a
/// calibrated forecast.
pub fn price_target(sequence: &[FeatureVector], signal: Signal, confidence: f64) -> f64 {
    let close = sequence
        .iter()
        .rev()
        .map(|fv| fv.technical.close)
        .find(|c| c.is_finite() && *c > 0.0);
    let volatility = sequence
        .iter()
        .rev()
        .map(|fv| fv.statistical.volatility)
        .find(|v| v.is_finite())
        .unwrap_or(0.0)
        .max(0.0);

    match close {
        Some(close) => {
            close * (1.0 + signal.direction() * confidence * volatility * PRICE_ADJUSTMENT)
        }
        None => 0.0,
    }
}

/// Trend, momentum and volatility readings over the raw input
pub fn market_analytics(sequence: &[FeatureVector]) -> MarketAnalytics {
    let (first, last) = match (sequence.first(), sequence.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return MarketAnalytics {
                trend_strength: 0.0,
                momentum_score: 0.5,
                volatility_forecast: 0.0,
                patterns: Vec::new(),
            }
        }
    };

    let first_close = first.technical.close;
    let trend_strength = if first_close != 0.0 && first_close.is_finite() {
        let change = (last.technical.close - first_close) / first_close;
        if change.is_finite() {
            tanh(change)
        } else {
            0.0
        }
    } else {
        0.0
    };

    let momentum_score = if last.technical.rsi.is_finite() {
        (last.technical.rsi / 100.0).clamp(0.0, 1.0)
    } else {
        0.5
    };

    let volatility_forecast = if last.statistical.volatility.is_finite() {
        last.statistical.volatility
    } else {
        0.0
    };

    let mut patterns = Vec::new();
    if trend_strength > 0.1 {
        patterns.push("uptrend".to_string());
    } else if trend_strength < -0.1 {
        patterns.push("downtrend".to_string());
    }
    if momentum_score > 0.7 {
        patterns.push("overbought".to_string());
    } else if momentum_score < 0.3 {
        patterns.push("oversold".to_string());
    }
    if volatility_forecast > 0.3 {
        patterns.push("high_volatility".to_string());
    }

    MarketAnalytics {
        trend_strength,
        momentum_score,
        volatility_forecast,
        patterns,
    }
}

/// Time steps whose attention weight exceeds 70% of the maximum
pub fn important_time_steps(weights: &[f64]) -> Vec<usize> {
    let max = weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return Vec::new();
    }
    let threshold = IMPORTANT_STEP_RATIO * max;
    weights
        .iter()
        .enumerate()
        .filter(|(_, &w)| w > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Fields of the last time step sitting at an extreme
pub fn important_features(last: &FeatureVector) -> Vec<String> {
    let t = &last.technical;
    let s = &last.statistical;
    let mut flagged = Vec::new();

    if t.rsi > 70.0 || t.rsi < 30.0 {
        flagged.push("rsi");
    }
    if t.stochastic_k > 80.0 || t.stochastic_k < 20.0 {
        flagged.push("stochastic_k");
    }
    if t.williams_r > -20.0 || t.williams_r < -80.0 {
        flagged.push("williams_r");
    }
    if t.close > t.bollinger_upper || t.close < t.bollinger_lower {
        flagged.push("bollinger_bands");
    }
    if s.volatility > 0.3 {
        flagged.push("volatility");
    }
    if s.value_at_risk < -0.05 {
        flagged.push("value_at_risk");
    }
    if last.market.volume_ratio > 2.0 {
        flagged.push("volume_ratio");
    }

    flagged.into_iter().map(String::from).collect()
}
