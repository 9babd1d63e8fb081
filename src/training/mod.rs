//! # Training
//!
//! - `control` - Cancellation flag, time budget and progress reporting
//! - `metrics` - Per-epoch metric records and the training history
//! - `procedure` - Pluggable parameter-update strategies
//! - `trainer` - Epoch loop and dataset evaluation

mod control;
mod metrics;
mod procedure;
mod trainer;

pub use control::{CancelFlag, RunControl};
pub use metrics::{TrainingHistory, TrainingMetricRecord};
pub use procedure::{procedure_for, ForwardEvaluation, OutputHeadDescent, TrainingProcedure};
pub use trainer::EvaluationReport;
