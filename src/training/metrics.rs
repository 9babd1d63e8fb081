//! Per-epoch training metrics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Metrics recorded at the end of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetricRecord {
    /// 1-based epoch number
    pub epoch: usize,
    /// Mean of -ln(confidence) over processed samples
    pub loss: f64,
    /// Share of processed samples whose signal matched the label
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Mean validation cross-entropy, the quantity early stopping and the
    /// plateau schedule watch
    #[serde(default)]
    pub val_cross_entropy: f64,
    /// Mean ‖p − y‖₂ over processed samples
    pub gradient_norm: f64,
    /// Rate in effect for this epoch
    pub learning_rate: f64,
    /// Samples that completed a forward pass
    pub samples: usize,
    /// Samples that failed and were skipped
    pub skipped: usize,
}

impl TrainingMetricRecord {
    /// Whether every numeric field is finite
    pub fn is_finite(&self) -> bool {
        [
            self.loss,
            self.accuracy,
            self.val_loss,
            self.val_accuracy,
            self.val_cross_entropy,
            self.gradient_norm,
            self.learning_rate,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl fmt::Display for TrainingMetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {:4} | Loss: {:.4} | Acc: {:.2}% | Val Loss: {:.4} | Val Acc: {:.2}% | Grad: {:.4} | LR: {:.6} | Skipped: {}",
            self.epoch,
            self.loss,
            self.accuracy * 100.0,
            self.val_loss,
            self.val_accuracy * 100.0,
            self.gradient_norm,
            self.learning_rate,
            self.skipped
        )
    }
}

/// Append-only list of epoch records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    records: Vec<TrainingMetricRecord>,
}

impl TrainingHistory {
    pub fn push(&mut self, record: TrainingMetricRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TrainingMetricRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&TrainingMetricRecord> {
        self.records.last()
    }

    /// Epoch with the highest validation accuracy
    pub fn best(&self) -> Option<&TrainingMetricRecord> {
        self.records.iter().fold(None, |best, r| match best {
            Some(b) if b.val_accuracy >= r.val_accuracy => Some(b),
            _ => Some(r),
        })
    }
}
