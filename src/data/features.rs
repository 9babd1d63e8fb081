//! Feature vector layout
//!
//! A feature vector is one time step of multi-domain inputs produced by the
//! feature-engineering pipeline. Its field order is fixed by [`FIELDS`]; the
//! model consumes the vector in exactly that order.

use serde::{Deserialize, Serialize};

/// Feature domain a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    /// Oscillators, bands and price
    Technical,
    /// Volatility, moments and risk measures
    Statistical,
    /// Calendar and session flags
    Temporal,
    /// Fundamental ratios
    Market,
}

/// How a raw field value is mapped into the network input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Identity,
    /// Multiply by a constant
    Scale(f64),
    /// Natural log of a positive quantity
    Log,
}

impl Transform {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Scale(k) => value * k,
            Transform::Log => value.max(f64::MIN_POSITIVE).ln(),
        }
    }
}

/// Static description of one feature field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub domain: Domain,
    /// Inclusive valid range, `None` for unbounded fields
    pub range: Option<(f64, f64)>,
    pub transform: Transform,
}

impl FieldSpec {
    /// Whether a raw value can be fed to the network after at most clamping
    ///
    /// Non-finite values never are; log-transformed fields also reject
    /// non-positive values.
    pub fn is_usable(&self, value: f64) -> bool {
        value.is_finite() && !(matches!(self.transform, Transform::Log) && value <= 0.0)
    }

    /// Clamp into the valid range, if the field has one
    pub fn clamp(&self, value: f64) -> f64 {
        match self.range {
            Some((lo, hi)) => value.clamp(lo, hi),
            None => value,
        }
    }
}

const fn field(
    name: &'static str,
    domain: Domain,
    range: Option<(f64, f64)>,
    transform: Transform,
) -> FieldSpec {
    FieldSpec {
        name,
        domain,
        range,
        transform,
    }
}

/// Field table in tensor order
pub const FIELDS: [FieldSpec; FeatureVector::WIDTH] = [
    // Technical
    field("close", Domain::Technical, Some((0.0, f64::MAX)), Transform::Log),
    field("rsi", Domain::Technical, Some((0.0, 100.0)), Transform::Scale(0.01)),
    field("macd", Domain::Technical, None, Transform::Identity),
    field("macd_signal", Domain::Technical, None, Transform::Identity),
    field("bollinger_upper", Domain::Technical, Some((0.0, f64::MAX)), Transform::Log),
    field("bollinger_lower", Domain::Technical, Some((0.0, f64::MAX)), Transform::Log),
    field("stochastic_k", Domain::Technical, Some((0.0, 100.0)), Transform::Scale(0.01)),
    field("williams_r", Domain::Technical, Some((-100.0, 0.0)), Transform::Scale(0.01)),
    // Statistical
    field("volatility", Domain::Statistical, Some((0.0, 10.0)), Transform::Identity),
    field("skewness", Domain::Statistical, None, Transform::Identity),
    field("kurtosis", Domain::Statistical, None, Transform::Scale(0.1)),
    field("value_at_risk", Domain::Statistical, Some((-1.0, 0.0)), Transform::Identity),
    field("sharpe_ratio", Domain::Statistical, None, Transform::Identity),
    // Temporal
    field("day_of_week", Domain::Temporal, Some((0.0, 6.0)), Transform::Scale(1.0 / 6.0)),
    field("hour_of_day", Domain::Temporal, Some((0.0, 23.0)), Transform::Scale(1.0 / 23.0)),
    field("month", Domain::Temporal, Some((1.0, 12.0)), Transform::Scale(1.0 / 12.0)),
    field("is_market_open", Domain::Temporal, Some((0.0, 1.0)), Transform::Identity),
    // Market
    field("pe_ratio", Domain::Market, Some((0.0, 1000.0)), Transform::Scale(0.01)),
    field("pb_ratio", Domain::Market, Some((0.0, 100.0)), Transform::Scale(0.1)),
    field("beta", Domain::Market, Some((-5.0, 5.0)), Transform::Identity),
    field("volume_ratio", Domain::Market, Some((0.0, 100.0)), Transform::Identity),
];

/// Oscillators, bands and price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalFeatures {
    pub close: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    pub stochastic_k: f64,
    pub williams_r: f64,
}

/// Volatility, moments and risk measures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFeatures {
    pub volatility: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub value_at_risk: f64,
    pub sharpe_ratio: f64,
}

/// Calendar and session flags
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    pub day_of_week: f64,
    pub hour_of_day: f64,
    pub month: f64,
    pub is_market_open: f64,
}

/// Fundamental ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketFeatures {
    pub pe_ratio: f64,
    pub pb_ratio: f64,
    pub beta: f64,
    pub volume_ratio: f64,
}

/// One time step of model input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub technical: TechnicalFeatures,
    pub statistical: StatisticalFeatures,
    pub temporal: TemporalFeatures,
    pub market: MarketFeatures,
}

impl FeatureVector {
    /// Number of numeric fields
    pub const WIDTH: usize = 21;

    /// Raw field values in [`FIELDS`] order
    pub fn values(&self) -> [f64; Self::WIDTH] {
        let t = &self.technical;
        let s = &self.statistical;
        let tm = &self.temporal;
        let m = &self.market;
        [
            t.close,
            t.rsi,
            t.macd,
            t.macd_signal,
            t.bollinger_upper,
            t.bollinger_lower,
            t.stochastic_k,
            t.williams_r,
            s.volatility,
            s.skewness,
            s.kurtosis,
            s.value_at_risk,
            s.sharpe_ratio,
            tm.day_of_week,
            tm.hour_of_day,
            tm.month,
            tm.is_market_open,
            m.pe_ratio,
            m.pb_ratio,
            m.beta,
            m.volume_ratio,
        ]
    }

    /// Field names in tensor order
    pub fn field_names() -> impl Iterator<Item = &'static str> {
        FIELDS.iter().map(|f| f.name)
    }

    /// Whether every field is a finite number
    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }
}

impl Default for FeatureVector {
    /// A neutral mid-session reading
    fn default() -> Self {
        Self {
            technical: TechnicalFeatures {
                close: 100.0,
                rsi: 50.0,
                macd: 0.0,
                macd_signal: 0.0,
                bollinger_upper: 102.0,
                bollinger_lower: 98.0,
                stochastic_k: 50.0,
                williams_r: -50.0,
            },
            statistical: StatisticalFeatures {
                volatility: 0.2,
                skewness: 0.0,
                kurtosis: 3.0,
                value_at_risk: -0.02,
                sharpe_ratio: 0.0,
            },
            temporal: TemporalFeatures {
                day_of_week: 2.0,
                hour_of_day: 12.0,
                month: 6.0,
                is_market_open: 1.0,
            },
            market: MarketFeatures {
                pe_ratio: 20.0,
                pb_ratio: 3.0,
                beta: 1.0,
                volume_ratio: 1.0,
            },
        }
    }
}
