//! Thread-safe model handle

use super::config::ModelConfig;
use super::network::SequenceModel;
use super::output::PredictionOutput;
use crate::data::FeatureVector;
use crate::error::Result;
use crate::training::{RunControl, TrainingMetricRecord, TrainingProcedure};
use parking_lot::RwLock;
use std::sync::Arc;

/// Cloneable handle to a model behind a read-write lock
///
/// Any number of predictions run concurrently; training waits for them and
/// blocks new ones until it finishes.
#[derive(Debug, Clone)]
pub struct SharedModel {
    inner: Arc<RwLock<SequenceModel>>,
}

impl SharedModel {
    pub fn new(model: SequenceModel) -> Self {
        Self {
            inner: Arc::new(RwLock::new(model)),
        }
    }

    pub fn predict(&self, features: &[FeatureVector]) -> Result<PredictionOutput> {
        self.inner.read().predict(features)
    }

    pub fn predict_with(
        &self,
        features: &[FeatureVector],
        control: &RunControl,
    ) -> Result<PredictionOutput> {
        self.inner.read().predict_with(features, control)
    }

    pub fn train(&self, dataset: &[Vec<FeatureVector>], labels: &[Vec<f64>]) -> Result<()> {
        self.inner.write().train(dataset, labels)
    }

    pub fn train_with(
        &self,
        dataset: &[Vec<FeatureVector>],
        labels: &[Vec<f64>],
        procedure: &mut dyn TrainingProcedure,
        control: &RunControl,
    ) -> Result<()> {
        self.inner
            .write()
            .train_with(dataset, labels, procedure, control)
    }

    /// Copy of the configuration
    pub fn config(&self) -> ModelConfig {
        self.inner.read().config().clone()
    }

    /// Copy of the training history
    pub fn training_history(&self) -> Vec<TrainingMetricRecord> {
        self.inner.read().training_history().to_vec()
    }

    /// Run `f` with shared access to the model
    pub fn with_model<T>(&self, f: impl FnOnce(&SequenceModel) -> T) -> T {
        let guard = self.inner.read();
        f(&*guard)
    }
}

impl From<SequenceModel> for SharedModel {
    fn from(model: SequenceModel) -> Self {
        Self::new(model)
    }
}
