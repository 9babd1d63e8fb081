//! Synthetic feature sequences
//!
//! Seeded random-walk generator used by the demo binaries and tests. Each
//! sequence follows one market regime so that labelled datasets are
//! learnable.

use super::features::{
    FeatureVector, MarketFeatures, StatisticalFeatures, TechnicalFeatures, TemporalFeatures,
};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Standard deviation of per-step return noise
const RETURN_NOISE: f64 = 0.005;

/// Price drift regime of a generated sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Bearish,
    Sideways,
    Bullish,
}

impl Regime {
    /// Class index in sell / hold / buy order
    pub fn class_index(&self) -> usize {
        match self {
            Regime::Bearish => 0,
            Regime::Sideways => 1,
            Regime::Bullish => 2,
        }
    }

    /// One-hot label over the three classes
    pub fn one_hot(&self) -> Vec<f64> {
        let mut label = vec![0.0; 3];
        label[self.class_index()] = 1.0;
        label
    }

    fn drift(&self) -> f64 {
        match self {
            Regime::Bearish => -0.01,
            Regime::Sideways => 0.0,
            Regime::Bullish => 0.01,
        }
    }

    fn from_index(i: usize) -> Self {
        match i % 3 {
            0 => Regime::Bearish,
            1 => Regime::Sideways,
            _ => Regime::Bullish,
        }
    }
}

/// Generate one hourly sequence of `len` steps starting at `start_price`
pub fn generate_sequence<R: Rng>(
    len: usize,
    start_price: f64,
    regime: Regime,
    rng: &mut R,
) -> Vec<FeatureVector> {
    let mut sequence = Vec::with_capacity(len);
    let mut price = start_price;
    let mut returns: Vec<f64> = Vec::with_capacity(len);
    let mut macd_signal = 0.0;

    for i in 0..len {
        let shock: f64 = StandardNormal.sample(rng);
        let ret = regime.drift() + RETURN_NOISE * shock;
        price *= 1.0 + ret;
        returns.push(ret);

        let recent = &returns[returns.len().saturating_sub(14)..];
        let gains: f64 = recent.iter().filter(|r| **r > 0.0).sum();
        let losses: f64 = -recent.iter().filter(|r| **r < 0.0).sum::<f64>();
        let rsi = if gains + losses == 0.0 {
            50.0
        } else {
            (100.0 * gains / (gains + losses)).clamp(0.0, 100.0)
        };

        let mean = recent.iter().sum::<f64>() / recent.len() as f64;
        let std = (recent.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
            / recent.len() as f64)
            .sqrt();
        let volatility = std * (252.0f64).sqrt();

        let macd = mean * 100.0;
        macd_signal = 0.8 * macd_signal + 0.2 * macd;
        let band = price * (2.0 * std).max(0.005);

        let hour = (9 + i) % 24;
        sequence.push(FeatureVector {
            technical: TechnicalFeatures {
                close: price,
                rsi,
                macd,
                macd_signal,
                bollinger_upper: price + band,
                bollinger_lower: (price - band).max(0.0),
                stochastic_k: rsi,
                williams_r: rsi - 100.0,
            },
            statistical: StatisticalFeatures {
                volatility,
                skewness: rng.gen_range(-0.5..0.5),
                kurtosis: 3.0 + rng.gen_range(0.0..1.0),
                value_at_risk: -(1.65 * std).min(1.0),
                sharpe_ratio: if std > 0.0 { mean / std } else { 0.0 },
            },
            temporal: TemporalFeatures {
                day_of_week: ((i / 24) % 7) as f64,
                hour_of_day: hour as f64,
                month: 1.0 + ((i / (24 * 30)) % 12) as f64,
                is_market_open: if (9..16).contains(&hour) { 1.0 } else { 0.0 },
            },
            market: MarketFeatures {
                pe_ratio: 18.0 + rng.gen_range(-2.0..2.0),
                pb_ratio: 3.0,
                beta: 1.1,
                volume_ratio: 0.5 + rng.gen::<f64>() * 1.5,
            },
        });
    }

    sequence
}

/// Generate `samples` labelled sequences cycling through the three regimes
pub fn generate_dataset<R: Rng>(
    samples: usize,
    len: usize,
    rng: &mut R,
) -> (Vec<Vec<FeatureVector>>, Vec<Vec<f64>>) {
    let mut dataset = Vec::with_capacity(samples);
    let mut labels = Vec::with_capacity(samples);

    for i in 0..samples {
        let regime = Regime::from_index(i);
        let start = rng.gen_range(50.0..500.0);
        dataset.push(generate_sequence(len, start, regime, rng));
        labels.push(regime.one_hot());
    }

    (dataset, labels)
}
