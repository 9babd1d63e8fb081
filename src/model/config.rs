//! Model configuration

use crate::data::FeatureVector;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of signal classes (sell, hold, buy)
pub const NUM_CLASSES: usize = 3;

/// Parameter update rule used by gradient-based training procedures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimizer {
    /// Plain stochastic gradient descent
    Sgd,
    /// Adam with β1 = 0.9, β2 = 0.999
    Adam,
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::Adam
    }
}

/// Which training procedure `SequenceModel::train` runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    /// Forward passes and metrics only, parameters never change
    ForwardEvaluation,
    /// Gradient descent on the output head
    OutputHeadDescent,
}

impl Default for ProcedureKind {
    fn default() -> Self {
        ProcedureKind::ForwardEvaluation
    }
}

/// Reduce the learning rate when the monitored validation loss stalls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LrPlateau {
    /// Multiplier applied on each reduction, in (0, 1)
    pub factor: f64,
    /// Epochs without improvement before a reduction
    pub patience: usize,
    /// Floor for the reduced rate
    pub min_lr: f64,
}

impl Default for LrPlateau {
    fn default() -> Self {
        Self {
            factor: 0.2,
            patience: 5,
            min_lr: 0.0001,
        }
    }
}

/// Sequence model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of input features per time step
    pub input_size: usize,
    /// Width of every recurrent layer
    pub hidden_size: usize,
    /// Number of stacked recurrent layers
    pub num_layers: usize,
    /// Number of output classes
    pub output_size: usize,
    /// Dropout probability applied to emitted hidden states while training
    pub dropout: f64,
    /// Pool the final layer with attention instead of taking the last step
    pub use_attention: bool,
    /// Sequence window consumed per prediction
    pub sequence_length: usize,
    /// Learning rate
    pub learning_rate: f64,
    /// Samples per parameter update
    pub batch_size: usize,
    /// Number of training epochs
    pub epochs: usize,
    pub l1_regularization: f64,
    pub l2_regularization: f64,
    pub optimizer: Optimizer,
    pub procedure: ProcedureKind,
    /// Fraction of the dataset held out for validation metrics
    pub validation_split: f64,
    /// Stop after this many epochs without validation improvement and
    /// restore the best output head; `None` runs every epoch
    pub early_stopping_patience: Option<usize>,
    pub lr_plateau: Option<LrPlateau>,
}

impl ModelConfig {
    /// Create a configuration with default training parameters
    ///
    /// # Arguments
    ///
    /// * `input_size` - Number of input features
    /// * `hidden_size` - Hidden layer width
    /// * `sequence_length` - Sequence window
    pub fn new(input_size: usize, hidden_size: usize, sequence_length: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            num_layers: 2,
            output_size: NUM_CLASSES,
            dropout: 0.2,
            use_attention: true,
            sequence_length,
            learning_rate: 0.001,
            batch_size: 32,
            epochs: 50,
            l1_regularization: 0.0,
            l2_regularization: 0.0001,
            optimizer: Optimizer::Adam,
            procedure: ProcedureKind::ForwardEvaluation,
            validation_split: 0.2,
            early_stopping_patience: None,
            lr_plateau: None,
        }
    }

    pub fn with_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_attention(mut self, use_attention: bool) -> Self {
        self.use_attention = use_attention;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_regularization(mut self, l1: f64, l2: f64) -> Self {
        self.l1_regularization = l1;
        self.l2_regularization = l2;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_procedure(mut self, procedure: ProcedureKind) -> Self {
        self.procedure = procedure;
        self
    }

    pub fn with_validation_split(mut self, split: f64) -> Self {
        self.validation_split = split;
        self
    }

    pub fn with_early_stopping(mut self, patience: usize) -> Self {
        self.early_stopping_patience = Some(patience);
        self
    }

    pub fn with_lr_plateau(mut self, plateau: LrPlateau) -> Self {
        self.lr_plateau = Some(plateau);
        self
    }

    /// Small single-layer model, handy for tests
    pub fn small(sequence_length: usize) -> Self {
        Self::new(FeatureVector::WIDTH, 16, sequence_length).with_layers(1)
    }

    /// Two 64-wide layers over a 60-step window
    pub fn medium() -> Self {
        Self::new(FeatureVector::WIDTH, 64, 60)
    }

    /// Three 128-wide layers with heavier dropout
    pub fn large() -> Self {
        Self::new(FeatureVector::WIDTH, 128, 60)
            .with_layers(3)
            .with_dropout(0.3)
    }

    /// Reject configurations the engine cannot run
    pub fn validate(&self) -> Result<()> {
        if self.input_size != FeatureVector::WIDTH {
            return Err(Error::InvalidConfig(format!(
                "input_size must be {} (feature vector width), got {}",
                FeatureVector::WIDTH,
                self.input_size
            )));
        }
        if self.output_size != NUM_CLASSES {
            return Err(Error::InvalidConfig(format!(
                "output_size must be {}, got {}",
                NUM_CLASSES, self.output_size
            )));
        }
        if self.hidden_size == 0 || self.num_layers == 0 || self.sequence_length == 0 {
            return Err(Error::InvalidConfig(
                "hidden_size, num_layers and sequence_length must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(Error::InvalidConfig(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.l1_regularization < 0.0 || self.l2_regularization < 0.0 {
            return Err(Error::InvalidConfig(
                "regularization weights must be non-negative".to_string(),
            ));
        }
        if let Some(plateau) = &self.lr_plateau {
            if !(plateau.factor > 0.0 && plateau.factor < 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "lr_plateau.factor must be in (0, 1), got {}",
                    plateau.factor
                )));
            }
            if !(plateau.min_lr >= 0.0 && plateau.min_lr.is_finite()) || plateau.patience == 0 {
                return Err(Error::InvalidConfig(
                    "lr_plateau needs a finite non-negative min_lr and positive patience"
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::medium()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ModelConfig::new(FeatureVector::WIDTH, 32, 30)
            .with_learning_rate(0.01)
            .with_dropout(0.3)
            .with_layers(3)
            .with_attention(false)
            .with_optimizer(Optimizer::Sgd);

        assert_eq!(config.hidden_size, 32);
        assert_eq!(config.sequence_length, 30);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.dropout, 0.3);
        assert_eq!(config.num_layers, 3);
        assert!(!config.use_attention);
        assert_eq!(config.optimizer, Optimizer::Sgd);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(ModelConfig::small(10).num_layers, 1);
        assert_eq!(ModelConfig::medium().hidden_size, 64);
        let large = ModelConfig::large();
        assert_eq!(large.hidden_size, 128);
        assert_eq!(large.num_layers, 3);
        assert!(large.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = ModelConfig::small(10);
        assert!(base.clone().with_dropout(1.0).validate().is_err());
        assert!(base.clone().with_layers(0).validate().is_err());
        assert!(base.clone().with_batch_size(0).validate().is_err());
        assert!(base.clone().with_learning_rate(0.0).validate().is_err());

        let mut wrong_width = base.clone();
        wrong_width.input_size = 5;
        assert!(matches!(wrong_width.validate(), Err(Error::InvalidConfig(_))));

        let mut wrong_classes = base;
        wrong_classes.output_size = 2;
        assert!(wrong_classes.validate().is_err());
    }

    #[test]
    fn test_lr_plateau_validation() {
        let base = ModelConfig::small(10);
        assert!(base.clone().with_lr_plateau(LrPlateau::default()).validate().is_ok());

        let flat = LrPlateau {
            factor: 1.0,
            ..LrPlateau::default()
        };
        assert!(base.clone().with_lr_plateau(flat).validate().is_err());

        let impatient = LrPlateau {
            patience: 0,
            ..LrPlateau::default()
        };
        assert!(base.with_lr_plateau(impatient).validate().is_err());
    }

    #[test]
    fn test_config_serde_defaults() {
        let parsed: ModelConfig =
            serde_json::from_str(r#"{"hidden_size": 8, "optimizer": "sgd"}"#).unwrap();
        assert_eq!(parsed.hidden_size, 8);
        assert_eq!(parsed.optimizer, Optimizer::Sgd);
        assert_eq!(parsed.input_size, FeatureVector::WIDTH);
        assert_eq!(parsed.early_stopping_patience, None);
        assert_eq!(parsed.lr_plateau, None);
    }
}
