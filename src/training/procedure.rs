//! Pluggable training procedures
//!
//! The epoch loop runs every sample forward in training mode and hands the
//! result to a [`TrainingProcedure`]. What, if anything, gets updated is up
//! to the procedure.

use crate::error::{Error, Result};
use crate::model::{ModelConfig, Optimizer, OutputHead, ProcedureKind};
use ndarray::{Array1, Array2, Axis};

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Strategy invoked by the training loop
pub trait TrainingProcedure {
    fn name(&self) -> &'static str;

    /// Record one sample's forward pass
    ///
    /// `context` is the pooled hidden state fed to the output head,
    /// `probabilities` the softmax output and `target` the label distribution.
    fn observe(&mut self, context: &Array1<f64>, probabilities: &Array1<f64>, target: &Array1<f64>);

    /// Apply whatever was accumulated since the last call
    ///
    /// `learning_rate` is the effective rate for this epoch, which a plateau
    /// schedule may have lowered below `config.learning_rate`.
    fn end_batch(
        &mut self,
        head: &mut OutputHead,
        config: &ModelConfig,
        learning_rate: f64,
    ) -> Result<()>;
}

/// Build the procedure selected in the configuration
pub fn procedure_for(config: &ModelConfig) -> Box<dyn TrainingProcedure> {
    match config.procedure {
        ProcedureKind::ForwardEvaluation => Box::new(ForwardEvaluation),
        ProcedureKind::OutputHeadDescent => Box::new(OutputHeadDescent::new(config.optimizer)),
    }
}

/// Forward evaluation only
///
/// Runs the data through the network and lets the loop record loss and
/// accuracy, but never changes a parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardEvaluation;

impl TrainingProcedure for ForwardEvaluation {
    fn name(&self) -> &'static str {
        "forward_evaluation"
    }

    fn observe(&mut self, _context: &Array1<f64>, _probabilities: &Array1<f64>, _target: &Array1<f64>) {}

    fn end_batch(
        &mut self,
        _head: &mut OutputHead,
        _config: &ModelConfig,
        _learning_rate: f64,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct AdamState {
    step: i32,
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

/// Gradient descent on the output head
///
/// With softmax cross-entropy the head gradient is exact:
/// dL/dW = (p − y) ⊗ context, dL/db = p − y. Recurrent and attention
/// parameters stay fixed.
#[derive(Debug, Clone)]
pub struct OutputHeadDescent {
    optimizer: Optimizer,
    grad_w: Option<Array2<f64>>,
    grad_b: Option<Array1<f64>>,
    pending: usize,
    adam: Option<AdamState>,
}

impl OutputHeadDescent {
    pub fn new(optimizer: Optimizer) -> Self {
        Self {
            optimizer,
            grad_w: None,
            grad_b: None,
            pending: 0,
            adam: None,
        }
    }

    /// Number of observed samples not yet applied
    pub fn pending(&self) -> usize {
        self.pending
    }
}

impl TrainingProcedure for OutputHeadDescent {
    fn name(&self) -> &'static str {
        "output_head_descent"
    }

    fn observe(&mut self, context: &Array1<f64>, probabilities: &Array1<f64>, target: &Array1<f64>) {
        let delta = probabilities - target;
        let outer = delta
            .view()
            .insert_axis(Axis(1))
            .dot(&context.view().insert_axis(Axis(0)));

        let compatible = matches!(&self.grad_w, Some(gw) if gw.dim() == outer.dim());
        if let (true, Some(gw), Some(gb)) = (compatible, self.grad_w.as_mut(), self.grad_b.as_mut()) {
            *gw += &outer;
            *gb += &delta;
            self.pending += 1;
            return;
        }

        self.grad_w = Some(outer);
        self.grad_b = Some(delta);
        self.pending = 1;
    }

    fn end_batch(
        &mut self,
        head: &mut OutputHead,
        config: &ModelConfig,
        learning_rate: f64,
    ) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }
        let (mut gw, mut gb) = match (self.grad_w.take(), self.grad_b.take()) {
            (Some(gw), Some(gb)) => (gw, gb),
            _ => return Ok(()),
        };
        let count = self.pending as f64;
        self.pending = 0;

        if gw.dim() != head.weights().dim() {
            return Err(Error::dimension(
                "output head gradient",
                head.weights().len(),
                gw.len(),
            ));
        }

        gw /= count;
        gb /= count;
        // Weight penalties; biases are not regularized
        gw = gw
            + head.weights().mapv(|w| {
                config.l2_regularization * w + config.l1_regularization * w.signum()
            });

        let lr = learning_rate;
        match self.optimizer {
            Optimizer::Sgd => {
                head.weights_mut().scaled_add(-lr, &gw);
                head.bias_mut().scaled_add(-lr, &gb);
            }
            Optimizer::Adam => {
                let state = self.adam.get_or_insert_with(|| AdamState {
                    step: 0,
                    m_w: Array2::zeros(gw.dim()),
                    v_w: Array2::zeros(gw.dim()),
                    m_b: Array1::zeros(gb.len()),
                    v_b: Array1::zeros(gb.len()),
                });
                state.step += 1;

                state.m_w = &state.m_w * ADAM_BETA1 + &gw * (1.0 - ADAM_BETA1);
                state.v_w = &state.v_w * ADAM_BETA2 + &gw.mapv(|g| g * g) * (1.0 - ADAM_BETA2);
                state.m_b = &state.m_b * ADAM_BETA1 + &gb * (1.0 - ADAM_BETA1);
                state.v_b = &state.v_b * ADAM_BETA2 + &gb.mapv(|g| g * g) * (1.0 - ADAM_BETA2);

                let bc1 = 1.0 - ADAM_BETA1.powi(state.step);
                let bc2 = 1.0 - ADAM_BETA2.powi(state.step);

                let step_w = ndarray::Zip::from(&state.m_w)
                    .and(&state.v_w)
                    .map_collect(|&m, &v| (m / bc1) / ((v / bc2).sqrt() + ADAM_EPSILON));
                let step_b = ndarray::Zip::from(&state.m_b)
                    .and(&state.v_b)
                    .map_collect(|&m, &v| (m / bc1) / ((v / bc2).sqrt() + ADAM_EPSILON));

                head.weights_mut().scaled_add(-lr, &step_w);
                head.bias_mut().scaled_add(-lr, &step_b);
            }
        }

        Ok(())
    }
}
