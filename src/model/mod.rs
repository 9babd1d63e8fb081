//! # Model
//!
//! Stacked LSTM cells feed an optional temporal attention pool and a softmax
//! head over sell / hold / buy.
//!
//! - `config` - Hyperparameters, presets and validation
//! - `cell` - LSTM cell with stacked gates
//! - `attention` - Bilinear temporal attention
//! - `network` - The full sequence model and its prediction pipeline
//! - `output` - Signal, probabilities and the prediction record
//! - `analytics` - Uncertainty, price target and market readings
//! - `persistence` - JSON and binary snapshots
//! - `shared` - Lock-protected handle for concurrent use

mod analytics;
mod attention;
mod cell;
mod config;
pub(crate) mod network;
mod output;
mod persistence;
mod shared;

pub use attention::AttentionModule;
pub use cell::RecurrentCell;
pub use config::{LrPlateau, ModelConfig, Optimizer, ProcedureKind, NUM_CLASSES};
pub use network::{Mode, OutputHead, SequenceModel, MODEL_VERSION};
pub use output::{
    MarketAnalytics, PredictionMetadata, PredictionOutput, Probabilities, Signal, Uncertainty,
};
pub use persistence::ModelSnapshot;
pub use shared::SharedModel;
