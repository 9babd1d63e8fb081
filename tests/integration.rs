//! End-to-end behaviour of the public API

use lstm_attention_trading::data::synthetic::{generate_dataset, generate_sequence, Regime};
use lstm_attention_trading::model::{Mode, Optimizer, OutputHead, ProcedureKind};
use lstm_attention_trading::training::{procedure_for, OutputHeadDescent, TrainingProcedure};
use lstm_attention_trading::{
    CancelFlag, Error, FeatureVector, ModelConfig, Result, RunControl, SequenceModel, SharedModel,
    Signal,
};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tempfile::tempdir;

type Dataset = (Vec<Vec<FeatureVector>>, Vec<Vec<f64>>);

fn dataset(samples: usize, len: usize, seed: u64) -> Dataset {
    generate_dataset(samples, len, &mut StdRng::seed_from_u64(seed))
}

fn sequence(len: usize, regime: Regime) -> Vec<FeatureVector> {
    generate_sequence(len, 100.0, regime, &mut StdRng::seed_from_u64(77))
}

#[test]
fn test_short_sequence_uses_full_window() {
    let model = SequenceModel::with_seed(ModelConfig::medium(), 1).unwrap();
    let output = model.predict(&sequence(5, Regime::Bullish)).unwrap();

    assert_eq!(output.metadata.sequence_length, 60);
    assert_eq!(output.attention_weights.len(), 60);
    assert_eq!(output.metadata.data_quality, 1.0);
    let p = output.probabilities;
    assert!((p.sell + p.hold + p.buy - 1.0).abs() < 1e-6);
    assert!([p.sell, p.hold, p.buy].iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_three_epochs_three_records() {
    let mut model = SequenceModel::with_seed(ModelConfig::small(10).with_epochs(3), 2).unwrap();
    let (data, labels) = dataset(10, 10, 3);
    model.train(&data, &labels).unwrap();

    let history = model.training_history();
    assert_eq!(history.len(), 3);
    for (i, record) in history.iter().enumerate() {
        assert_eq!(record.epoch, i + 1);
        assert!(record.loss.is_finite() && record.accuracy.is_finite());
        assert!(record.val_loss.is_finite() && record.val_accuracy.is_finite());
        assert!((0.0..=1.0).contains(&record.accuracy));
    }
    assert_eq!(model.mode(), Mode::Inference);
}

#[test]
fn test_nan_sample_is_skipped() {
    let mut model = SequenceModel::with_seed(ModelConfig::small(10).with_epochs(2), 2).unwrap();
    let (mut data, labels) = dataset(10, 10, 4);
    data[3][5].statistical.volatility = f64::NAN;

    model.train(&data, &labels).unwrap();

    for record in model.training_history() {
        assert_eq!(record.skipped, 1);
        assert_eq!(record.samples, 7);
        assert!(record.loss.is_finite());
    }
}

#[test]
fn test_forward_evaluation_does_not_change_predictions() {
    let mut model = SequenceModel::with_seed(ModelConfig::small(10).with_epochs(2), 5).unwrap();
    let seq = sequence(10, Regime::Sideways);
    let before = model.predict(&seq).unwrap();

    let (data, labels) = dataset(8, 10, 6);
    model.train(&data, &labels).unwrap();

    let after = model.predict(&seq).unwrap();
    assert_eq!(before.probabilities, after.probabilities);
}

#[test]
fn test_head_descent_lowers_cross_entropy() {
    let (data, labels) = dataset(12, 8, 8);
    let config = ModelConfig::small(8)
        .with_dropout(0.0)
        .with_validation_split(0.0)
        .with_batch_size(12)
        .with_epochs(30)
        .with_learning_rate(0.1)
        .with_regularization(0.0, 0.0)
        .with_optimizer(Optimizer::Sgd)
        .with_procedure(ProcedureKind::OutputHeadDescent);
    let mut model = SequenceModel::with_seed(config, 10).unwrap();

    let before = model.evaluate(&data, &labels).unwrap();
    model.train(&data, &labels).unwrap();
    let after = model.evaluate(&data, &labels).unwrap();

    assert_eq!(after.evaluated, 12);
    assert!(
        after.cross_entropy < before.cross_entropy,
        "{} !< {}",
        after.cross_entropy,
        before.cross_entropy
    );
}

#[test]
fn test_explicit_procedure() {
    let config = ModelConfig::small(8).with_epochs(2);
    let mut model = SequenceModel::with_seed(config, 12).unwrap();
    let head = model.output_head().clone();
    let (data, labels) = dataset(6, 8, 13);

    let mut procedure = OutputHeadDescent::new(Optimizer::Adam);
    model
        .train_with(&data, &labels, &mut procedure, &RunControl::new())
        .unwrap();
    assert_ne!(model.output_head(), &head);
}

#[test]
fn test_cancelled_training() {
    let mut model = SequenceModel::with_seed(ModelConfig::small(8).with_epochs(5), 1).unwrap();
    let (data, labels) = dataset(4, 8, 1);
    let flag = CancelFlag::new();
    flag.cancel();

    let mut procedure = procedure_for(model.config());
    let control = RunControl::new().with_cancel(flag);
    let err = model
        .train_with(&data, &labels, procedure.as_mut(), &control)
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(err.is_recoverable());
    assert!(model.training_history().is_empty());
    assert_eq!(model.mode(), Mode::Inference);
}

/// Flips a shared cancel flag once it has seen `limit` samples
struct CancelAfter {
    flag: CancelFlag,
    seen: usize,
    limit: usize,
}

impl TrainingProcedure for CancelAfter {
    fn name(&self) -> &'static str {
        "cancel_after"
    }

    fn observe(&mut self, _: &Array1<f64>, _: &Array1<f64>, _: &Array1<f64>) {
        self.seen += 1;
        if self.seen == self.limit {
            self.flag.cancel();
        }
    }

    fn end_batch(&mut self, _: &mut OutputHead, _: &ModelConfig, _: f64) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_cancel_during_training_keeps_completed_epochs() {
    let config = ModelConfig::small(8)
        .with_epochs(10)
        .with_validation_split(0.0);
    let mut model = SequenceModel::with_seed(config, 1).unwrap();
    let (data, labels) = dataset(4, 8, 1);
    let flag = CancelFlag::new();

    // first sample of epoch 3; the next sample's step check sees the flag
    let mut procedure = CancelAfter {
        flag: flag.clone(),
        seen: 0,
        limit: 4 * 2 + 1,
    };
    let control = RunControl::new().with_cancel(flag);
    let err = model
        .train_with(&data, &labels, &mut procedure, &control)
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(procedure.seen, 9);
    assert_eq!(model.training_history().len(), 2);
    assert_eq!(model.mode(), Mode::Inference);
}

#[test]
fn test_exhausted_time_budget() {
    let mut model = SequenceModel::with_seed(ModelConfig::small(8).with_epochs(5), 1).unwrap();
    let (data, labels) = dataset(4, 8, 1);
    let control = RunControl::new().with_time_budget(Duration::ZERO);

    let mut procedure = procedure_for(model.config());
    let err = model
        .train_with(&data, &labels, procedure.as_mut(), &control)
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));

    let err = model
        .predict_with(&sequence(8, Regime::Bearish), &control)
        .unwrap_err();
    assert!(matches!(err, Error::Timeout));
}

#[test]
fn test_save_and_load_preserve_predictions() {
    let mut model = SequenceModel::with_seed(ModelConfig::small(8).with_epochs(1), 21).unwrap();
    let (data, labels) = dataset(4, 8, 22);
    model.train(&data, &labels).unwrap();
    let seq = sequence(12, Regime::Bullish);
    let expected = model.predict(&seq).unwrap();

    let mut json = Vec::new();
    model.save_model(&mut json).unwrap();
    let from_json = SequenceModel::load_model(json.as_slice(), 0).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("model.bin");
    model.save(&path).unwrap();
    let from_binary = SequenceModel::load(&path, 0).unwrap();

    for loaded in [from_json, from_binary] {
        let output = loaded.predict(&seq).unwrap();
        assert_eq!(output.probabilities, expected.probabilities);
        assert_eq!(output.attention_weights, expected.attention_weights);
        assert_eq!(output.signal, expected.signal);
        assert_eq!(loaded.training_history(), model.training_history());
    }
}

#[test]
fn test_shared_model_across_threads() {
    let shared = SharedModel::new(SequenceModel::with_seed(ModelConfig::small(8), 3).unwrap());
    let seq = sequence(8, Regime::Bullish);

    let reader = {
        let shared = shared.clone();
        let seq = seq.clone();
        std::thread::spawn(move || shared.predict(&seq).map(|o| o.signal))
    };
    let signal = reader.join().unwrap().unwrap();
    assert!(Signal::ORDER.contains(&signal));

    let (data, labels) = dataset(5, 8, 4);
    shared.train(&data, &labels).unwrap();
    assert_eq!(shared.training_history().len(), shared.config().epochs);
}

#[test]
fn test_independent_models_in_one_process() {
    let seq = sequence(10, Regime::Sideways);
    let a = SequenceModel::with_seed(ModelConfig::small(10), 100).unwrap();
    let b = SequenceModel::with_seed(ModelConfig::small(10), 100).unwrap();
    let c = SequenceModel::with_seed(ModelConfig::small(10), 101).unwrap();

    let pa = a.predict(&seq).unwrap().probabilities;
    assert_eq!(pa, b.predict(&seq).unwrap().probabilities);
    assert_ne!(pa, c.predict(&seq).unwrap().probabilities);
}
