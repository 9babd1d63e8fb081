//! Gated recurrent (LSTM) cell

use crate::error::{Error, Result};
use crate::math::{mat_vec, sigmoid_vec, tanh_vec, vector_add};
use ndarray::{s, Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// LSTM cell with stacked gate weights
///
/// Rows of the weight matrices and the bias are laid out as four equal
/// slices of `hidden_size`: forget, input, candidate, output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentCell {
    pub input_size: usize,
    pub hidden_size: usize,
    /// input -> gates [4 * hidden_size, input_size]
    input_weights: Array2<f64>,
    /// hidden -> gates [4 * hidden_size, hidden_size]
    hidden_weights: Array2<f64>,
    /// [4 * hidden_size]
    bias: Array1<f64>,
}

impl RecurrentCell {
    /// Create a cell with uniform(±1/sqrt(hidden)) weights drawn from `rng`
    pub fn new<R: Rng>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let limit = (1.0 / hidden_size as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);

        let mut bias = Array1::zeros(4 * hidden_size);
        // Forget gate starts open
        bias.slice_mut(s![0..hidden_size]).fill(1.0);

        Self {
            input_size,
            hidden_size,
            input_weights: Array2::random_using((4 * hidden_size, input_size), dist, rng),
            hidden_weights: Array2::random_using((4 * hidden_size, hidden_size), dist, rng),
            bias,
        }
    }

    /// Build a cell from explicit parameters
    pub fn from_parameters(
        input_weights: Array2<f64>,
        hidden_weights: Array2<f64>,
        bias: Array1<f64>,
    ) -> Result<Self> {
        let gates = input_weights.nrows();
        if gates == 0 || gates % 4 != 0 {
            return Err(Error::InvalidConfig(format!(
                "gate rows must be a positive multiple of 4, got {}",
                gates
            )));
        }
        let hidden_size = gates / 4;
        if hidden_weights.dim() != (gates, hidden_size) {
            return Err(Error::dimension(
                "hidden_weights rows",
                gates,
                hidden_weights.nrows(),
            ));
        }
        if bias.len() != gates {
            return Err(Error::dimension("bias", gates, bias.len()));
        }

        Ok(Self {
            input_size: input_weights.ncols(),
            hidden_size,
            input_weights,
            hidden_weights,
            bias,
        })
    }

    /// One time step
    ///
    /// # Arguments
    ///
    /// * `x` - Input vector [input_size]
    /// * `h_prev` - Previous hidden state [hidden_size]
    /// * `c_prev` - Previous cell state [hidden_size]
    ///
    /// # Returns
    ///
    /// `(c_next, h_next)` - new cell state and hidden state
    pub fn forward(
        &self,
        x: &Array1<f64>,
        h_prev: &Array1<f64>,
        c_prev: &Array1<f64>,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        if c_prev.len() != self.hidden_size {
            return Err(Error::dimension("cell state", self.hidden_size, c_prev.len()));
        }

        let gates = vector_add(
            &vector_add(&mat_vec(&self.input_weights, x)?, &mat_vec(&self.hidden_weights, h_prev)?),
            &self.bias,
        );

        let h = self.hidden_size;
        let forget = sigmoid_vec(&gates.slice(s![0..h]).to_owned());
        let input = sigmoid_vec(&gates.slice(s![h..2 * h]).to_owned());
        let candidate = tanh_vec(&gates.slice(s![2 * h..3 * h]).to_owned());
        let output = sigmoid_vec(&gates.slice(s![3 * h..4 * h]).to_owned());

        // c = f * c_prev + i * g
        let c_next = &forget * c_prev + &input * &candidate;
        // h = o * tanh(c)
        let h_next = &output * &tanh_vec(&c_next);

        Ok((c_next, h_next))
    }

    /// Zero `(hidden, cell)` state
    pub fn init_state(&self) -> (Array1<f64>, Array1<f64>) {
        (
            Array1::zeros(self.hidden_size),
            Array1::zeros(self.hidden_size),
        )
    }

    pub fn num_params(&self) -> usize {
        self.input_weights.len() + self.hidden_weights.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{sigmoid, tanh};
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cell_shapes() {
        let mut rng = StdRng::seed_from_u64(0);
        let cell = RecurrentCell::new(5, 10, &mut rng);
        let x = Array1::zeros(5);
        let (h, c) = cell.init_state();

        let (c_next, h_next) = cell.forward(&x, &h, &c).unwrap();

        assert_eq!(h_next.len(), 10);
        assert_eq!(c_next.len(), 10);
        assert_eq!(cell.num_params(), 40 * 5 + 40 * 10 + 40);
    }

    #[test]
    fn test_cell_matches_gate_equations() {
        // hidden_size 1: gates are [forget, input, candidate, output]
        let cell = RecurrentCell::from_parameters(
            array![[0.5], [0.1], [-0.3], [0.2]],
            array![[0.0], [0.4], [0.2], [-0.1]],
            array![1.0, 0.0, 0.1, 0.0],
        )
        .unwrap();

        let x = array![2.0];
        let h_prev = array![0.5];
        let c_prev = array![-0.25];
        let (c, h) = cell.forward(&x, &h_prev, &c_prev).unwrap();

        let f = sigmoid(0.5 * 2.0 + 0.0 * 0.5 + 1.0);
        let i = sigmoid(0.1 * 2.0 + 0.4 * 0.5);
        let g = tanh(-0.3 * 2.0 + 0.2 * 0.5 + 0.1);
        let o = sigmoid(0.2 * 2.0 - 0.1 * 0.5);
        let expected_c = f * -0.25 + i * g;
        let expected_h = o * tanh(expected_c);

        assert!((c[0] - expected_c).abs() < 1e-12);
        assert!((h[0] - expected_h).abs() < 1e-12);
        // Inputs are untouched
        assert_eq!(h_prev, array![0.5]);
        assert_eq!(c_prev, array![-0.25]);
    }

    #[test]
    fn test_forget_bias_initialized_to_one() {
        let mut rng = StdRng::seed_from_u64(0);
        let cell = RecurrentCell::new(3, 4, &mut rng);
        assert!(cell.bias.slice(s![0..4]).iter().all(|&b| b == 1.0));
        assert!(cell.bias.slice(s![4..]).iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_cell_rejects_wrong_input_width() {
        let mut rng = StdRng::seed_from_u64(0);
        let cell = RecurrentCell::new(3, 4, &mut rng);
        let (h, c) = cell.init_state();
        let err = cell.forward(&Array1::zeros(2), &h, &c).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = RecurrentCell::new(3, 4, &mut StdRng::seed_from_u64(9));
        let b = RecurrentCell::new(3, 4, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
