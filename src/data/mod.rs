//! # Input data
//!
//! - `features` - Fixed feature-vector layout across four domains
//! - `sequence` - Windowing, padding and tensorization with quality scoring
//! - `synthetic` - Seeded synthetic sequences for demos and tests

mod features;
mod sequence;
pub mod synthetic;

pub use features::{
    Domain, FeatureVector, FieldSpec, MarketFeatures, StatisticalFeatures, TechnicalFeatures,
    TemporalFeatures, Transform, FIELDS,
};
pub use sequence::{pad_sequence, tensorize, Tensorized, QUALITY_PENALTY};
