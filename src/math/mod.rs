//! # Numeric primitives
//!
//! Stateless activations, matrix products, dropout, normalization and softmax
//! used by the recurrent cells, the attention module and the output head.

mod ops;

pub use ops::{
    dropout, entropy, layer_norm, leaky_relu, mat_vec, matrix_multiply, relu, sigmoid,
    sigmoid_vec, softmax, tanh, tanh_vec, vector_add, ACTIVATION_CLAMP, LAYER_NORM_EPSILON,
    LEAKY_RELU_ALPHA,
};
