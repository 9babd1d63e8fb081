//! # LSTM-Attention Trading Signals
//!
//! Turns a chronological sequence of market feature vectors into a
//! buy / sell / hold signal with class probabilities, attention weights,
//! uncertainty estimates and coarse market analytics.
//!
//! ## Modules
//!
//! - `data` - Feature vector layout, windowing, tensorization and synthetic data
//! - `math` - Activations, softmax, dropout and matrix helpers
//! - `model` - LSTM cells, attention, the sequence model and persistence
//! - `training` - Epoch loop, training procedures and metrics
//! - `utils` - Configuration files and logging
//!
//! ## Example
//!
//! ```no_run
//! use lstm_attention_trading::data::synthetic::{generate_dataset, generate_sequence, Regime};
//! use lstm_attention_trading::{ModelConfig, SequenceModel};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! fn main() -> lstm_attention_trading::Result<()> {
//!     let mut rng = StdRng::seed_from_u64(42);
//!     let mut model = SequenceModel::new(ModelConfig::small(30), &mut rng)?;
//!
//!     let (dataset, labels) = generate_dataset(64, 30, &mut rng);
//!     model.train(&dataset, &labels)?;
//!
//!     let sequence = generate_sequence(30, 100.0, Regime::Bullish, &mut rng);
//!     let prediction = model.predict(&sequence)?;
//!     println!("{} ({:.1}%)", prediction.signal, prediction.confidence * 100.0);
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod error;
pub mod math;
pub mod model;
pub mod training;
pub mod utils;

pub use data::FeatureVector;
pub use error::{Error, Result};
pub use model::{
    ModelConfig, ModelSnapshot, PredictionOutput, Probabilities, SequenceModel, SharedModel,
    Signal,
};
pub use training::{CancelFlag, EvaluationReport, RunControl, TrainingMetricRecord};
pub use utils::{setup_logging, AppConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
