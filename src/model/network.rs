//! Stacked LSTM with optional attention pooling and a softmax signal head

use super::analytics::{
    important_features, important_time_steps, market_analytics, price_target, uncertainty,
};
use super::attention::AttentionModule;
use super::cell::RecurrentCell;
use super::config::ModelConfig;
use super::output::{PredictionMetadata, PredictionOutput, Probabilities, Signal};
use crate::data::{pad_sequence, tensorize, FeatureVector, Tensorized};
use crate::error::{Error, Result};
use crate::math::{dropout, mat_vec, softmax, vector_add};
use crate::training::{RunControl, TrainingHistory, TrainingMetricRecord};
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Version tag reported in prediction metadata
pub const MODEL_VERSION: &str = concat!("lstm-attention-", env!("CARGO_PKG_VERSION"));

/// Operating mode; only dropout behaves differently between the two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Inference,
    Training,
}

/// Linear projection from the context vector to class logits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputHead {
    /// [output_size, hidden_size]
    weights: Array2<f64>,
    /// [output_size]
    bias: Array1<f64>,
}

impl OutputHead {
    pub fn new<R: Rng>(hidden_size: usize, output_size: usize, rng: &mut R) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        Self {
            weights: Array2::random_using(
                (output_size, hidden_size),
                Uniform::new_inclusive(-limit, limit),
                rng,
            ),
            bias: Array1::zeros(output_size),
        }
    }

    /// Logits = W · context + b
    pub fn forward(&self, context: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(vector_add(&mat_vec(&self.weights, context)?, &self.bias))
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    pub fn weights_mut(&mut self) -> &mut Array2<f64> {
        &mut self.weights
    }

    pub fn bias_mut(&mut self) -> &mut Array1<f64> {
        &mut self.bias
    }
}

/// All learned parameters of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Parameters {
    pub(crate) layers: Vec<RecurrentCell>,
    pub(crate) attention: Option<AttentionModule>,
    pub(crate) head: OutputHead,
}

/// Dropout source borrowed for the duration of a training pass
pub(crate) struct DropoutState<'a> {
    pub(crate) rng: &'a mut StdRng,
    pub(crate) rate: f64,
}

/// Intermediate results of one forward pass
#[derive(Debug, Clone)]
pub(crate) struct ForwardPass {
    pub(crate) context: Array1<f64>,
    pub(crate) probabilities: Array1<f64>,
    pub(crate) attention_weights: Vec<f64>,
}

impl Parameters {
    fn new<R: Rng>(config: &ModelConfig, rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(config.num_layers);
        // First layer consumes the features, later layers the previous trajectory
        layers.push(RecurrentCell::new(config.input_size, config.hidden_size, rng));
        for _ in 1..config.num_layers {
            layers.push(RecurrentCell::new(config.hidden_size, config.hidden_size, rng));
        }

        let attention = if config.use_attention {
            Some(AttentionModule::new(config.hidden_size, rng))
        } else {
            None
        };

        Self {
            layers,
            attention,
            head: OutputHead::new(config.hidden_size, config.output_size, rng),
        }
    }

    /// Run a padded `[window, input_size]` sequence through the network
    pub(crate) fn forward(
        &self,
        x: &Array2<f64>,
        mut dropout_state: Option<DropoutState<'_>>,
        control: &RunControl,
    ) -> Result<ForwardPass> {
        let mut sequence = x.to_owned();

        for cell in &self.layers {
            let steps = sequence.nrows();
            let mut trajectory = Array2::zeros((steps, cell.hidden_size));
            let (mut h, mut c) = cell.init_state();

            for (t, x_t) in sequence.axis_iter(Axis(0)).enumerate() {
                control.check()?;
                let (c_next, h_next) = cell.forward(&x_t.to_owned(), &h, &c)?;

                let emitted = match dropout_state.as_mut() {
                    Some(d) => dropout(&h_next, d.rate, true, &mut *d.rng),
                    None => h_next.clone(),
                };
                trajectory.row_mut(t).assign(&emitted);

                h = h_next;
                c = c_next;
            }

            sequence = trajectory;
        }

        let (attention_weights, context) = match &self.attention {
            Some(attention) => {
                let (weights, context) = attention.calculate_attention(&sequence)?;
                (weights.to_vec(), context)
            }
            None => {
                let last = sequence
                    .nrows()
                    .checked_sub(1)
                    .ok_or(Error::EmptyInput)?;
                (Vec::new(), sequence.row(last).to_owned())
            }
        };

        let logits = self.head.forward(&context)?;
        let probabilities = softmax(&logits);

        Ok(ForwardPass {
            context,
            probabilities,
            attention_weights,
        })
    }

    fn num_params(&self) -> usize {
        self.layers.iter().map(RecurrentCell::num_params).sum::<usize>()
            + self.attention.as_ref().map_or(0, AttentionModule::num_params)
            + self.head.weights.len()
            + self.head.bias.len()
    }
}

/// Sequence-to-signal model
///
/// Owns a stack of recurrent cells, an optional attention module, the output
/// head and the append-only training history. Inference never mutates the
/// model; training needs exclusive access.
#[derive(Debug)]
pub struct SequenceModel {
    pub(crate) config: ModelConfig,
    pub(crate) params: Parameters,
    pub(crate) history: TrainingHistory,
    pub(crate) mode: Mode,
    /// Dropout source used while training
    pub(crate) rng: StdRng,
}

impl SequenceModel {
    /// Create a model, drawing initial weights from `rng`
    ///
    /// # Errors
    /// `InvalidConfig` when the configuration is rejected by
    /// [`ModelConfig::validate`].
    pub fn new<R: Rng>(config: ModelConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let params = Parameters::new(&config, rng);
        let dropout_rng = StdRng::seed_from_u64(rng.gen());

        debug!(
            layers = config.num_layers,
            hidden = config.hidden_size,
            attention = config.use_attention,
            params = params.num_params(),
            "sequence model created"
        );

        Ok(Self {
            config,
            params,
            history: TrainingHistory::default(),
            mode: Mode::Inference,
            rng: dropout_rng,
        })
    }

    /// Create a model from a fixed seed
    pub fn with_seed(config: ModelConfig, seed: u64) -> Result<Self> {
        Self::new(config, &mut StdRng::seed_from_u64(seed))
    }

    pub(crate) fn from_parts(
        config: ModelConfig,
        params: Parameters,
        history: TrainingHistory,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        if params.layers.len() != config.num_layers {
            return Err(Error::dimension(
                "layer count",
                config.num_layers,
                params.layers.len(),
            ));
        }
        if params.attention.is_some() != config.use_attention {
            return Err(Error::InvalidConfig(
                "attention parameters do not match use_attention".to_string(),
            ));
        }
        Ok(Self {
            config,
            params,
            history,
            mode: Mode::Inference,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Read-only configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Per-epoch training metrics, oldest first
    pub fn training_history(&self) -> &[TrainingMetricRecord] {
        self.history.records()
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn output_head(&self) -> &OutputHead {
        &self.params.head
    }

    pub fn num_params(&self) -> usize {
        self.params.num_params()
    }

    /// Window, tensorize and pad a raw sequence
    ///
    /// Only the most recent `sequence_length` steps are assessed for data
    /// quality; padding repeats the earliest of them.
    pub(crate) fn prepare(&self, features: &[FeatureVector], strict: bool) -> Result<Tensorized> {
        if features.is_empty() {
            return Err(Error::EmptyInput);
        }
        let window = self.config.sequence_length;
        let recent = &features[features.len().saturating_sub(window)..];

        let tensorized = tensorize(recent, strict)?;
        let rows: Vec<usize> = (0..tensorized.data.nrows()).collect();
        let padded_rows = pad_sequence(&rows, window)?;

        Ok(Tensorized {
            data: tensorized.data.select(Axis(0), &padded_rows),
            quality: tensorized.quality,
            issues: tensorized.issues,
        })
    }

    /// Predict a trading signal for a chronological feature sequence
    ///
    /// # Errors
    /// `EmptyInput` for an empty sequence. Corrupt feature values do not fail
    /// the call; they lower `metadata.data_quality` instead.
    pub fn predict(&self, features: &[FeatureVector]) -> Result<PredictionOutput> {
        self.predict_with(features, &RunControl::default())
    }

    /// Like [`predict`](Self::predict), checking `control` once per time step
    pub fn predict_with(
        &self,
        features: &[FeatureVector],
        control: &RunControl,
    ) -> Result<PredictionOutput> {
        let start = Instant::now();
        let prepared = self.prepare(features, false)?;
        if prepared.issues > 0 {
            warn!(
                issues = prepared.issues,
                quality = prepared.quality,
                "repaired corrupt feature values"
            );
        }

        let pass = self.params.forward(&prepared.data, None, control)?;
        let output = self.build_output(features, &pass, &prepared, start)?;

        debug!(
            signal = %output.signal,
            confidence = output.confidence,
            quality = output.metadata.data_quality,
            "prediction complete"
        );
        Ok(output)
    }

    fn build_output(
        &self,
        features: &[FeatureVector],
        pass: &ForwardPass,
        prepared: &Tensorized,
        start: Instant,
    ) -> Result<PredictionOutput> {
        if pass.probabilities.iter().any(|p| !p.is_finite()) {
            return Err(Error::Prediction("non-finite class probabilities".to_string()));
        }
        let probabilities = Probabilities::from_slice(&pass.probabilities.to_vec())
            .ok_or_else(|| Error::Prediction("output head must produce 3 classes".to_string()))?;

        let class = probabilities.argmax();
        let signal = Signal::from_class(class)
            .ok_or_else(|| Error::Prediction(format!("unknown class index {}", class)))?;
        let confidence = probabilities.to_array()[class];

        let last = features.last().ok_or(Error::EmptyInput)?;
        let target = price_target(features, signal, confidence);

        Ok(PredictionOutput {
            signal,
            confidence,
            probabilities,
            price_target: if target.is_finite() { target } else { 0.0 },
            important_time_steps: important_time_steps(&pass.attention_weights),
            attention_weights: pass.attention_weights.clone(),
            important_features: important_features(last),
            uncertainty: uncertainty(&probabilities, confidence),
            analytics: market_analytics(features),
            metadata: PredictionMetadata {
                model_version: MODEL_VERSION.to_string(),
                sequence_length: prepared.data.nrows(),
                processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
                data_quality: prepared.quality,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{generate_sequence, Regime};

    fn small_model(window: usize, attention: bool) -> SequenceModel {
        let config = ModelConfig::small(window).with_attention(attention);
        SequenceModel::with_seed(config, 42).unwrap()
    }

    fn sequence(len: usize) -> Vec<FeatureVector> {
        let mut rng = StdRng::seed_from_u64(1);
        generate_sequence(len, 100.0, Regime::Bullish, &mut rng)
    }

    #[test]
    fn test_predict_empty_input() {
        let model = small_model(10, true);
        assert!(matches!(model.predict(&[]), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_short_sequence_is_padded_to_window() {
        let model = small_model(60, true);
        let output = model.predict(&sequence(5)).unwrap();
        assert_eq!(output.metadata.sequence_length, 60);
        assert_eq!(output.attention_weights.len(), 60);
    }

    #[test]
    fn test_long_sequence_is_truncated_to_window() {
        let model = small_model(12, true);
        let output = model.predict(&sequence(40)).unwrap();
        assert_eq!(output.metadata.sequence_length, 12);
        assert_eq!(output.attention_weights.len(), 12);
    }

    #[test]
    fn test_truncation_uses_most_recent_steps() {
        let model = small_model(8, true);
        let seq = sequence(30);
        let full = model.predict(&seq).unwrap();
        let tail = model.predict(&seq[22..]).unwrap();
        assert_eq!(full.probabilities, tail.probabilities);
        assert_eq!(full.attention_weights, tail.attention_weights);
    }

    #[test]
    fn test_confidence_is_max_probability() {
        let model = small_model(10, true);
        let output = model.predict(&sequence(10)).unwrap();
        let p = output.probabilities;

        assert!((p.sell + p.hold + p.buy - 1.0).abs() < 1e-6);
        assert_eq!(output.confidence, p.max());
        assert_eq!(output.signal, Signal::from_class(p.argmax()).unwrap());
        let w: f64 = output.attention_weights.iter().sum();
        assert!((w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_predict_is_idempotent() {
        let model = small_model(10, true);
        let seq = sequence(15);
        let a = model.predict(&seq).unwrap();
        let b = model.predict(&seq).unwrap();

        assert_eq!(a.probabilities, b.probabilities);
        assert_eq!(a.attention_weights, b.attention_weights);
        assert_eq!(a.price_target.to_bits(), b.price_target.to_bits());
        assert_eq!(a.uncertainty, b.uncertainty);
        assert_eq!(a.analytics, b.analytics);
    }

    #[test]
    fn test_without_attention_uses_last_step() {
        let model = small_model(10, false);
        let output = model.predict(&sequence(10)).unwrap();
        assert!(output.attention_weights.is_empty());
        assert!(output.important_time_steps.is_empty());
    }

    #[test]
    fn test_nan_feature_degrades_quality() {
        let model = small_model(10, true);
        let mut seq = sequence(10);
        seq[9].technical.rsi = f64::NAN;
        seq[3].statistical.volatility = f64::INFINITY;

        let output = model.predict(&seq).unwrap();
        assert!((output.metadata.data_quality - 0.8).abs() < 1e-12);
        assert!(output.confidence.is_finite());
    }

    #[test]
    fn test_generated_sequences_are_clean() {
        let model = small_model(20, true);
        for seed in [1u64, 5, 99] {
            let mut rng = StdRng::seed_from_u64(seed);
            for regime in [Regime::Bearish, Regime::Sideways, Regime::Bullish] {
                let seq = generate_sequence(20, 100.0, regime, &mut rng);
                let output = model.predict(&seq).unwrap();
                assert_eq!(output.metadata.data_quality, 1.0, "{:?} seed {}", regime, seed);
            }
        }
    }

    #[test]
    fn test_repaired_close_does_not_move_the_signal() {
        let model = small_model(10, true);
        let mut clean = sequence(10);
        clean[9].technical.close = clean[8].technical.close;
        let mut corrupt = clean.clone();
        corrupt[9].technical.close = f64::NAN;

        let expected = model.predict(&clean).unwrap();
        let repaired = model.predict(&corrupt).unwrap();

        assert_eq!(repaired.signal, expected.signal);
        assert_eq!(repaired.probabilities, expected.probabilities);
        assert_eq!(expected.metadata.data_quality, 1.0);
        assert!((repaired.metadata.data_quality - 0.9).abs() < 1e-12);
        assert_eq!(repaired.price_target.to_bits(), expected.price_target.to_bits());
    }

    #[test]
    fn test_same_seed_same_prediction() {
        let seq = sequence(10);
        let a = small_model(10, true).predict(&seq).unwrap();
        let b = small_model(10, true).predict(&seq).unwrap();
        assert_eq!(a.probabilities, b.probabilities);

        let other = SequenceModel::with_seed(ModelConfig::small(10), 7)
            .unwrap()
            .predict(&seq)
            .unwrap();
        assert_ne!(a.probabilities, other.probabilities);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ModelConfig::small(10).with_dropout(1.5);
        assert!(matches!(
            SequenceModel::with_seed(config, 1),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_multi_layer_model() {
        let config = ModelConfig::new(FeatureVector::WIDTH, 8, 6).with_layers(3);
        let model = SequenceModel::with_seed(config, 3).unwrap();
        assert_eq!(model.params.layers.len(), 3);
        assert_eq!(model.params.layers[1].input_size, 8);
        let output = model.predict(&sequence(6)).unwrap();
        assert_eq!(output.metadata.model_version, MODEL_VERSION);
    }

    #[test]
    fn test_predict_honors_cancellation() {
        let model = small_model(10, true);
        let control = RunControl::new().with_time_budget(std::time::Duration::ZERO);
        assert!(matches!(
            model.predict_with(&sequence(10), &control),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn test_actionable_thresholds() {
        let mut output = small_model(10, true).predict(&sequence(10)).unwrap();
        output.signal = Signal::Buy;
        output.confidence = 0.7;
        output.metadata.data_quality = 0.9;
        assert!(output.is_actionable(0.6, 0.8));
        assert!(!output.is_actionable(0.75, 0.8));
        assert!(!output.is_actionable(0.6, 0.95));

        output.signal = Signal::Hold;
        assert!(!output.is_actionable(0.0, 0.0));
    }
}
