//! Epoch loop
//!
//! Runs every training sample forward with dropout active, scores it against
//! its label and hands the pass to a [`TrainingProcedure`]. A sample that
//! fails is logged and skipped; only configuration errors, cancellation and
//! the time budget end a run early.

use super::control::RunControl;
use super::metrics::TrainingMetricRecord;
use super::procedure::{procedure_for, TrainingProcedure};
use crate::data::FeatureVector;
use crate::error::{Error, Result};
use crate::model::network::DropoutState;
use crate::model::{Mode, ModelConfig, OutputHead, SequenceModel, NUM_CLASSES};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Probability floor used inside logarithms
const LOG_FLOOR: f64 = 1e-10;

/// Aggregate scores of a dataset evaluated in inference mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Mean of -ln(confidence)
    pub loss: f64,
    /// Mean of -Σ y·ln(p)
    pub cross_entropy: f64,
    pub accuracy: f64,
    /// Samples that were scored
    pub evaluated: usize,
    /// Samples rejected as corrupt or mislabelled
    pub skipped: usize,
}

/// Scores of a single sample
#[derive(Debug, Clone, Copy)]
struct SampleScore {
    loss: f64,
    cross_entropy: f64,
    correct: bool,
    gradient_norm: f64,
}

impl SampleScore {
    fn new(probabilities: &Array1<f64>, target: &Array1<f64>) -> Self {
        let confidence = probabilities.iter().cloned().fold(0.0, f64::max);
        let cross_entropy = -probabilities
            .iter()
            .zip(target.iter())
            .map(|(p, y)| y * p.max(LOG_FLOOR).ln())
            .sum::<f64>();
        let gradient_norm = (probabilities - target).mapv(|d| d * d).sum().sqrt();

        Self {
            loss: -confidence.max(LOG_FLOOR).ln(),
            cross_entropy,
            correct: argmax(probabilities) == argmax(target),
            gradient_norm,
        }
    }
}

/// Running sums over one pass through a dataset
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    loss: f64,
    cross_entropy: f64,
    correct: usize,
    gradient_norm: f64,
    processed: usize,
    skipped: usize,
}

impl Tally {
    fn add(&mut self, score: SampleScore) {
        self.loss += score.loss;
        self.cross_entropy += score.cross_entropy;
        self.gradient_norm += score.gradient_norm;
        if score.correct {
            self.correct += 1;
        }
        self.processed += 1;
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            sum / self.processed as f64
        }
    }

    fn loss(&self) -> f64 {
        self.mean(self.loss)
    }

    fn cross_entropy(&self) -> f64 {
        self.mean(self.cross_entropy)
    }

    fn accuracy(&self) -> f64 {
        self.mean(self.correct as f64)
    }

    fn gradient_norm(&self) -> f64 {
        self.mean(self.gradient_norm)
    }
}

/// Learning-rate and early-stopping state carried across epochs
///
/// Both watch validation cross-entropy. Only a strictly lower value counts as
/// an improvement.
#[derive(Debug)]
struct Schedule {
    learning_rate: f64,
    best: f64,
    best_epoch: usize,
    best_head: Option<OutputHead>,
    stale: usize,
    plateau_wait: usize,
}

impl Schedule {
    fn new(config: &ModelConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            best: f64::INFINITY,
            best_epoch: 0,
            best_head: None,
            stale: 0,
            plateau_wait: 0,
        }
    }

    /// Update the schedule after `epoch`; returns true when training should stop
    fn observe(
        &mut self,
        epoch: usize,
        monitored: Option<f64>,
        head: &OutputHead,
        config: &ModelConfig,
    ) -> bool {
        if let Some(value) = monitored.filter(|v| *v < self.best) {
            self.best = value;
            self.best_epoch = epoch;
            self.stale = 0;
            self.plateau_wait = 0;
            if config.early_stopping_patience.is_some() {
                self.best_head = Some(head.clone());
            }
            return false;
        }

        self.stale += 1;
        self.plateau_wait += 1;

        if let Some(plateau) = config.lr_plateau {
            if self.plateau_wait >= plateau.patience {
                self.plateau_wait = 0;
                let reduced = (self.learning_rate * plateau.factor).max(plateau.min_lr);
                if reduced < self.learning_rate {
                    info!(epoch, from = self.learning_rate, to = reduced, "reducing learning rate");
                    self.learning_rate = reduced;
                }
            }
        }

        matches!(config.early_stopping_patience, Some(patience) if self.stale >= patience)
    }
}

/// Index of the first maximum
fn argmax(values: &Array1<f64>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best), (i, &v)| {
            if v > best {
                (i, v)
            } else {
                (best_i, best)
            }
        })
        .0
}

/// Validate a label distribution
fn label_target(label: &[f64]) -> Result<Array1<f64>> {
    if label.len() != NUM_CLASSES {
        return Err(Error::Training(format!(
            "label has {} entries, expected {}",
            label.len(),
            NUM_CLASSES
        )));
    }
    if label.iter().any(|v| !v.is_finite()) {
        return Err(Error::Training("label contains non-finite values".to_string()));
    }
    Ok(Array1::from(label.to_vec()))
}

/// Errors that end the run instead of skipping the sample
fn aborts_run(error: &Error) -> bool {
    matches!(error, Error::Cancelled | Error::Timeout) || error.is_fatal()
}

fn check_dataset(dataset: &[Vec<FeatureVector>], labels: &[Vec<f64>]) -> Result<()> {
    if dataset.is_empty() {
        return Err(Error::EmptyInput);
    }
    if dataset.len() != labels.len() {
        return Err(Error::dimension("dataset labels", dataset.len(), labels.len()));
    }
    Ok(())
}

impl SequenceModel {
    /// Train with the procedure selected in the configuration
    ///
    /// # Errors
    /// `EmptyInput` for an empty dataset, `DimensionMismatch` when the label
    /// count differs from the sample count. Individual corrupt samples are
    /// skipped, not surfaced.
    pub fn train(&mut self, dataset: &[Vec<FeatureVector>], labels: &[Vec<f64>]) -> Result<()> {
        let mut procedure = procedure_for(&self.config);
        self.train_with(dataset, labels, procedure.as_mut(), &RunControl::default())
    }

    /// Train with an explicit procedure and run limits
    ///
    /// Epochs completed before a `Cancelled` or `Timeout` stay in the history.
    pub fn train_with(
        &mut self,
        dataset: &[Vec<FeatureVector>],
        labels: &[Vec<f64>],
        procedure: &mut dyn TrainingProcedure,
        control: &RunControl,
    ) -> Result<()> {
        check_dataset(dataset, labels)?;

        let n = dataset.len();
        let n_val = ((n as f64 * self.config.validation_split).floor() as usize).min(n - 1);
        let split_at = n - n_val;

        info!(
            samples = n,
            train = split_at,
            validation = n_val,
            epochs = self.config.epochs,
            procedure = procedure.name(),
            "starting training"
        );

        self.mode = Mode::Training;
        let result = self.run_epochs(
            (&dataset[..split_at], &labels[..split_at]),
            (&dataset[split_at..], &labels[split_at..]),
            procedure,
            control,
        );
        self.mode = Mode::Inference;

        match &result {
            Ok(()) => info!(epochs = self.history.len(), "training complete"),
            Err(e) => warn!(error = %e, epochs = self.history.len(), "training stopped"),
        }
        result
    }

    /// Score a labelled dataset in inference mode without touching parameters
    pub fn evaluate(
        &self,
        dataset: &[Vec<FeatureVector>],
        labels: &[Vec<f64>],
    ) -> Result<EvaluationReport> {
        check_dataset(dataset, labels)?;
        let tally = self.evaluation_pass(dataset, labels, &RunControl::default())?;

        Ok(EvaluationReport {
            loss: tally.loss(),
            cross_entropy: tally.cross_entropy(),
            accuracy: tally.accuracy(),
            evaluated: tally.processed,
            skipped: tally.skipped,
        })
    }

    fn run_epochs(
        &mut self,
        train: (&[Vec<FeatureVector>], &[Vec<f64>]),
        validation: (&[Vec<FeatureVector>], &[Vec<f64>]),
        procedure: &mut dyn TrainingProcedure,
        control: &RunControl,
    ) -> Result<()> {
        let pb = control.progress_bar(self.config.epochs);
        let mut schedule = Schedule::new(&self.config);

        for epoch in 1..=self.config.epochs {
            let learning_rate = schedule.learning_rate;
            let outcome = control.check().and_then(|()| {
                let trained =
                    self.train_epoch(epoch, train.0, train.1, procedure, learning_rate, control)?;
                let validated = if validation.0.is_empty() {
                    trained
                } else {
                    self.evaluation_pass(validation.0, validation.1, control)?
                };
                Ok((trained, validated))
            });

            let (trained, validated) = match outcome {
                Ok(tallies) => tallies,
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            };

            if trained.processed == 0 {
                warn!(epoch, skipped = trained.skipped, "no training sample could be processed");
            }

            let record = TrainingMetricRecord {
                epoch,
                loss: trained.loss(),
                accuracy: trained.accuracy(),
                val_loss: validated.loss(),
                val_accuracy: validated.accuracy(),
                val_cross_entropy: validated.cross_entropy(),
                gradient_norm: trained.gradient_norm(),
                learning_rate,
                samples: trained.processed,
                skipped: trained.skipped,
            };

            info!("{}", record);
            pb.set_message(format!("{:.4}", record.loss));
            pb.inc(1);
            self.history.push(record);

            let monitored = (validated.processed > 0).then(|| validated.cross_entropy());
            if schedule.observe(epoch, monitored, &self.params.head, &self.config) {
                if let Some(head) = schedule.best_head.take() {
                    self.params.head = head;
                }
                info!(
                    epoch,
                    best_epoch = schedule.best_epoch,
                    best_val_cross_entropy = schedule.best,
                    "early stopping, restored best output head"
                );
                break;
            }
        }

        pb.finish_with_message("done");
        Ok(())
    }

    fn train_epoch(
        &mut self,
        epoch: usize,
        dataset: &[Vec<FeatureVector>],
        labels: &[Vec<f64>],
        procedure: &mut dyn TrainingProcedure,
        learning_rate: f64,
        control: &RunControl,
    ) -> Result<Tally> {
        let mut tally = Tally::default();
        let mut in_batch = 0;

        for (index, (features, label)) in dataset.iter().zip(labels).enumerate() {
            match self.train_sample(features, label, procedure, control) {
                Ok(score) => {
                    tally.add(score);
                    in_batch += 1;
                }
                Err(e) if aborts_run(&e) => return Err(e),
                Err(e) => {
                    warn!(epoch, sample = index, error = %e, "skipping training sample");
                    tally.skipped += 1;
                }
            }

            if in_batch == self.config.batch_size {
                procedure.end_batch(&mut self.params.head, &self.config, learning_rate)?;
                in_batch = 0;
            }
        }

        if in_batch > 0 {
            procedure.end_batch(&mut self.params.head, &self.config, learning_rate)?;
        }

        debug!(epoch, processed = tally.processed, skipped = tally.skipped, "epoch pass finished");
        Ok(tally)
    }

    fn train_sample(
        &mut self,
        features: &[FeatureVector],
        label: &[f64],
        procedure: &mut dyn TrainingProcedure,
        control: &RunControl,
    ) -> Result<SampleScore> {
        let target = label_target(label)?;
        let prepared = self.prepare(features, true).map_err(|e| match e {
            Error::EmptyInput => Error::Training("empty feature sequence".to_string()),
            other => other,
        })?;

        let dropout = DropoutState {
            rng: &mut self.rng,
            rate: self.config.dropout,
        };
        let pass = self.params.forward(&prepared.data, Some(dropout), control)?;
        if pass.probabilities.iter().any(|p| !p.is_finite()) {
            return Err(Error::Training("non-finite class probabilities".to_string()));
        }

        procedure.observe(&pass.context, &pass.probabilities, &target);
        Ok(SampleScore::new(&pass.probabilities, &target))
    }

    fn evaluation_pass(
        &self,
        dataset: &[Vec<FeatureVector>],
        labels: &[Vec<f64>],
        control: &RunControl,
    ) -> Result<Tally> {
        let mut tally = Tally::default();

        for (index, (features, label)) in dataset.iter().zip(labels).enumerate() {
            let scored = label_target(label).and_then(|target| {
                let prepared = self.prepare(features, true).map_err(|e| match e {
                    Error::EmptyInput => Error::Training("empty feature sequence".to_string()),
                    other => other,
                })?;
                let pass = self.params.forward(&prepared.data, None, control)?;
                Ok(SampleScore::new(&pass.probabilities, &target))
            });

            match scored {
                Ok(score) if score.loss.is_finite() && score.cross_entropy.is_finite() => {
                    tally.add(score)
                }
                Ok(_) => tally.skipped += 1,
                Err(e) if aborts_run(&e) => return Err(e),
                Err(e) => {
                    debug!(sample = index, error = %e, "skipping evaluation sample");
                    tally.skipped += 1;
                }
            }
        }

        Ok(tally)
    }
}
