//! Temporal attention over recurrent hidden states

use crate::error::{Error, Result};
use crate::math::{softmax, tanh};
use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bilinear attention pooling
///
/// Each time step's hidden vector h_t gets the score
/// s_t = tanh(h_tᵀ · W · h_t + bᵀ · h_t); the weights are softmax(s) and the
/// context is Σ_t α_t · h_t.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionModule {
    hidden_size: usize,
    /// Projection [hidden_size, hidden_size]
    projection: Array2<f64>,
    /// Bias [hidden_size]
    bias: Array1<f64>,
}

impl AttentionModule {
    /// Create an attention module with uniform(±1/sqrt(hidden)) projection weights
    pub fn new<R: Rng>(hidden_size: usize, rng: &mut R) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);

        Self {
            hidden_size,
            projection: Array2::random_using((hidden_size, hidden_size), dist, rng),
            bias: Array1::zeros(hidden_size),
        }
    }

    /// Build a module from explicit parameters
    pub fn from_parameters(projection: Array2<f64>, bias: Array1<f64>) -> Result<Self> {
        let hidden_size = projection.nrows();
        if projection.ncols() != hidden_size {
            return Err(Error::dimension("attention projection", hidden_size, projection.ncols()));
        }
        if bias.len() != hidden_size {
            return Err(Error::dimension("attention bias", hidden_size, bias.len()));
        }
        Ok(Self {
            hidden_size,
            projection,
            bias,
        })
    }

    /// Alignment score for one hidden vector
    fn score(&self, h: &Array1<f64>) -> f64 {
        let bilinear = h.dot(&self.projection.dot(h));
        tanh(bilinear + self.bias.dot(h))
    }

    /// Attention weights and context vector
    ///
    /// # Arguments
    /// * `hidden_states` - Hidden state trajectory [T, hidden_size]
    ///
    /// # Returns
    /// * `(weights, context)` - weights [T] summing to 1, context [hidden_size]
    pub fn calculate_attention(
        &self,
        hidden_states: &Array2<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        if hidden_states.nrows() == 0 {
            return Err(Error::EmptyInput);
        }
        if hidden_states.ncols() != self.hidden_size {
            return Err(Error::dimension(
                "attention input",
                self.hidden_size,
                hidden_states.ncols(),
            ));
        }

        let scores: Array1<f64> = hidden_states
            .rows()
            .into_iter()
            .map(|row| self.score(&row.to_owned()))
            .collect();

        let weights = softmax(&scores);
        // Context = Hᵀ · α
        let context = hidden_states.t().dot(&weights);

        Ok((weights, context))
    }

    pub fn num_params(&self) -> usize {
        self.projection.len() + self.bias.len()
    }
}
