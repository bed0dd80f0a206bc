use serde::{Serialize, Deserialize};

/// Element-wise activations used by the recurrent cell.
///
/// Gates use `Sigmoid`, the candidate and cell output use `Tanh`, and the
/// frame readout is `Identity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    Tanh,
    Identity,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => sigmoid(x),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Identity => 1.0,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    // Split on sign so exp() never overflows.
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_derivative(f: ActivationFunction, x: f64) -> f64 {
        let h = 1e-6;
        (f.function(x + h) - f.function(x - h)) / (2.0 * h)
    }

    #[test]
    fn derivatives_match_finite_differences() {
        for f in [ActivationFunction::Sigmoid, ActivationFunction::Tanh, ActivationFunction::Identity] {
            for x in [-3.0, -0.5, 0.0, 0.7, 2.5] {
                assert!((f.derivative(x) - numeric_derivative(f, x)).abs() < 1e-6, "{f:?} at {x}");
            }
        }
    }

    #[test]
    fn sigmoid_is_stable_for_large_inputs() {
        assert_eq!(ActivationFunction::Sigmoid.function(-1000.0), 0.0);
        assert_eq!(ActivationFunction::Sigmoid.function(1000.0), 1.0);
    }
}
