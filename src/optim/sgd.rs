use crate::layers::conv_lstm::{CellGradients, ConvLstmCell};

/// Plain stochastic gradient descent.
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one update to every layer of the cell.
    pub fn step(&self, cell: &mut ConvLstmCell, gradients: &CellGradients) {
        for (layer, (w_grad, b_grad)) in cell.layers_mut().into_iter().zip(&gradients.layers) {
            layer.apply_gradients(w_grad, b_grad, self.learning_rate);
        }
    }
}
