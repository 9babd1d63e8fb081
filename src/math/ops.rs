//! Scalar, vector and matrix operations

use crate::error::{Error, Result};
use ndarray::{Array1, Array2};
use rand::Rng;

/// Activation inputs are clamped to this magnitude before exponentiation
pub const ACTIVATION_CLAMP: f64 = 500.0;

/// Default negative slope for `leaky_relu`
pub const LEAKY_RELU_ALPHA: f64 = 0.01;

/// Variance floor for `layer_norm`
pub const LAYER_NORM_EPSILON: f64 = 1e-8;

/// Logistic sigmoid: 1 / (1 + e^-x)
pub fn sigmoid(x: f64) -> f64 {
    let x = x.clamp(-ACTIVATION_CLAMP, ACTIVATION_CLAMP);
    1.0 / (1.0 + (-x).exp())
}

/// Hyperbolic tangent: (e^2x - 1) / (e^2x + 1)
///
/// Evaluated as (1 - e^-2|x|) / (1 + e^-2|x|) with the sign restored, which
/// is the same quantity without overflowing for large |x|.
pub fn tanh(x: f64) -> f64 {
    let x = x.clamp(-ACTIVATION_CLAMP, ACTIVATION_CLAMP);
    let e = (-2.0 * x.abs()).exp();
    let magnitude = (1.0 - e) / (1.0 + e);
    if x < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

pub fn leaky_relu(x: f64, alpha: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        alpha * x
    }
}

pub fn sigmoid_vec(v: &Array1<f64>) -> Array1<f64> {
    v.mapv(sigmoid)
}

pub fn tanh_vec(v: &Array1<f64>) -> Array1<f64> {
    v.mapv(tanh)
}

/// Dense matrix product A·B
///
/// # Errors
/// `DimensionMismatch` when `A.ncols() != B.nrows()`.
pub fn matrix_multiply(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    if a.ncols() != b.nrows() {
        return Err(Error::dimension("matrix_multiply", a.ncols(), b.nrows()));
    }

    let (n, k, m) = (a.nrows(), a.ncols(), b.ncols());
    let mut out = Array2::zeros((n, m));
    for i in 0..n {
        for j in 0..m {
            let mut acc = 0.0;
            for p in 0..k {
                acc += a[[i, p]] * b[[p, j]];
            }
            out[[i, j]] = acc;
        }
    }
    Ok(out)
}

/// Matrix-vector product A·v
pub fn mat_vec(a: &Array2<f64>, v: &Array1<f64>) -> Result<Array1<f64>> {
    if a.ncols() != v.len() {
        return Err(Error::dimension("mat_vec", a.ncols(), v.len()));
    }
    Ok(a.dot(v))
}

/// Elementwise sum; the shorter operand is treated as zero-padded
pub fn vector_add(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    let len = a.len().max(b.len());
    Array1::from_shape_fn(len, |i| {
        a.get(i).copied().unwrap_or(0.0) + b.get(i).copied().unwrap_or(0.0)
    })
}

/// Inverted dropout
///
/// Identity outside training or when `rate == 0`. Otherwise each element is
/// zeroed with probability `rate` and survivors are scaled by `1/(1-rate)`.
pub fn dropout<R: Rng>(
    v: &Array1<f64>,
    rate: f64,
    training: bool,
    rng: &mut R,
) -> Array1<f64> {
    if !training || rate <= 0.0 {
        return v.clone();
    }
    if rate >= 1.0 {
        return Array1::zeros(v.len());
    }

    let scale = 1.0 / (1.0 - rate);
    v.mapv(|x| if rng.gen::<f64>() < rate { 0.0 } else { x * scale })
}

/// Subtract the mean and divide by sqrt(variance + epsilon)
pub fn layer_norm(v: &Array1<f64>, epsilon: f64) -> Array1<f64> {
    if v.is_empty() {
        return v.clone();
    }
    let n = v.len() as f64;
    let mean = v.sum() / n;
    let variance = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let denom = (variance + epsilon).sqrt();
    v.mapv(|x| (x - mean) / denom)
}

/// Numerically stable softmax
///
/// Falls back to a uniform distribution when the normalizer is not finite
/// (e.g. NaN scores).
pub fn softmax(v: &Array1<f64>) -> Array1<f64> {
    if v.is_empty() {
        return v.clone();
    }

    let max_val = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp_v = v.mapv(|x| (x - max_val).exp());
    let sum: f64 = exp_v.sum();

    if !sum.is_finite() || sum <= 0.0 {
        return Array1::from_elem(v.len(), 1.0 / v.len() as f64);
    }
    exp_v / sum
}

/// Shannon entropy in nats, ignoring zero-probability terms
pub fn entropy(p: &Array1<f64>) -> f64 {
    p.iter()
        .filter(|&&x| x > 0.0)
        .map(|&x| -x * x.ln())
        .sum()
}
