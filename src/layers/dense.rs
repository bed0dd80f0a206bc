use rand::Rng;

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Fully connected layer `a = σ(x · W + b)`.
///
/// `weights` is `input_size x size` and `biases` is `1 x size`. The layer is
/// stateless: `forward` returns the pre-activation alongside the output so the
/// caller can keep it for the backward pass of that exact call.
#[derive(Debug, Clone)]
pub struct Dense {
    pub weights: Matrix,
    pub biases: Matrix,
    pub activation: ActivationFunction,
}

/// Values produced by one `Dense::forward` call.
#[derive(Debug, Clone)]
pub struct DenseOutput {
    /// z = x · W + b
    pub pre: Vec<f64>,
    /// a = σ(z)
    pub out: Vec<f64>,
}

impl Dense {
    /// Xavier-initialised weights with every bias set to `bias_init`.
    pub fn new<R: Rng>(
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        bias_init: f64,
        rng: &mut R,
    ) -> Dense {
        Dense {
            weights: Matrix::xavier(input_size, size, rng),
            biases: Matrix::filled(1, size, bias_init),
            activation,
        }
    }

    pub fn size(&self) -> usize {
        self.weights.cols
    }

    pub fn forward(&self, input: &[f64]) -> DenseOutput {
        let mut pre = self.weights.left_mul(input);
        for (z, b) in pre.iter_mut().zip(&self.biases.data) {
            *z += b;
        }
        let out = pre.iter().map(|&z| self.activation.function(z)).collect();
        DenseOutput { pre, out }
    }

    /// Converts ∂L/∂a into ∂L/∂z for the given forward pass.
    pub fn layer_delta(&self, output: &DenseOutput, activation_delta: &[f64]) -> Vec<f64> {
        output.pre.iter().zip(activation_delta)
            .map(|(&z, &d)| d * self.activation.derivative(z))
            .collect()
    }

    /// Gradients `(∂L/∂W, ∂L/∂b)` for one sample given ∂L/∂z.
    pub fn gradients(&self, input: &[f64], layer_delta: &[f64]) -> (Matrix, Matrix) {
        (
            Matrix::outer(input, layer_delta),
            Matrix::from_rows(vec![layer_delta.to_vec()]),
        )
    }

    /// ∂L/∂x given ∂L/∂z, i.e. `W · δ`.
    pub fn input_delta(&self, layer_delta: &[f64]) -> Vec<f64> {
        self.weights.right_mul(layer_delta)
    }

    /// Applies pre-computed gradients scaled by lr.
    pub fn apply_gradients(&mut self, weights_grad: &Matrix, biases_grad: &Matrix, lr: f64) {
        self.weights.sub_scaled(weights_grad, lr);
        self.biases.sub_scaled(biases_grad, lr);
    }
}
