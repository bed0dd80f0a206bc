use rand::Rng;

use crate::activation::activation::ActivationFunction;
use crate::error::{TrainerError, TrainerResult};
use crate::layers::dense::{Dense, DenseOutput};
use crate::loss::mse::MseLoss;
use crate::math::{matrix::Matrix, tensor::Tensor};

/// Names of the cell's layers, in the order used by `layers()` and
/// `CellGradients`.
pub const LAYER_NAMES: [&str; 5] = ["input_gate", "forget_gate", "output_gate", "candidate", "readout"];

/// Convolutional LSTM cell with a 1x1 kernel plus a linear next-frame readout.
///
/// With a 1x1 kernel every pixel runs the same LSTM over its own channel value,
/// so a gate is a `Dense` layer over `[x, h]`:
///
/// ```text
/// i = σ(W_i·[x,h] + b_i)    f = σ(W_f·[x,h] + b_f)    o = σ(W_o·[x,h] + b_o)
/// g = tanh(W_g·[x,h] + b_g)
/// c' = f⊙c + i⊙g            h' = o⊙tanh(c')
/// x̂_{t+1} = W_r·h' + b_r
/// ```
///
/// State tensors are `[2, batch, height, width, filters]` with `c` at index 0
/// and `h` at index 1.
#[derive(Debug, Clone)]
pub struct ConvLstmCell {
    pub input_gate: Dense,
    pub forget_gate: Dense,
    pub output_gate: Dense,
    pub candidate: Dense,
    pub readout: Dense,
}

/// Accumulated `(∂L/∂W, ∂L/∂b)` per layer, ordered as `LAYER_NAMES`.
#[derive(Debug, Clone)]
pub struct CellGradients {
    pub layers: Vec<(Matrix, Matrix)>,
}

impl CellGradients {
    fn zeros_like(cell: &ConvLstmCell) -> CellGradients {
        CellGradients {
            layers: cell.layers().iter()
                .map(|l| (
                    Matrix::zeros(l.weights.rows, l.weights.cols),
                    Matrix::zeros(l.biases.rows, l.biases.cols),
                ))
                .collect(),
        }
    }

    fn accumulate(&mut self, layer: usize, (w, b): (Matrix, Matrix)) {
        self.layers[layer].0 += &w;
        self.layers[layer].1 += &b;
    }

    pub fn norm(&self) -> f64 {
        self.layers.iter()
            .map(|(w, b)| w.norm().powi(2) + b.norm().powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Result of a training pass over one sequence batch.
#[derive(Debug, Clone)]
pub struct CellPass {
    pub final_state: Tensor,
    pub loss: f64,
    pub gradients: CellGradients,
}

/// Everything one pixel-step keeps for its backward pass.
struct StepCache {
    input: Vec<f64>,
    i: DenseOutput,
    f: DenseOutput,
    o: DenseOutput,
    g: DenseOutput,
    c_prev: Vec<f64>,
    c: Vec<f64>,
    tanh_c: Vec<f64>,
    h: Vec<f64>,
}

struct Backprop {
    loss: MseLoss,
    grads: CellGradients,
}

impl ConvLstmCell {
    /// Fresh cell. The forget-gate bias starts at 1 so early training keeps
    /// the incoming cell state.
    pub fn new<R: Rng>(filters: usize, rng: &mut R) -> ConvLstmCell {
        let gate_input = 1 + filters;
        ConvLstmCell {
            input_gate: Dense::new(gate_input, filters, ActivationFunction::Sigmoid, 0.0, rng),
            forget_gate: Dense::new(gate_input, filters, ActivationFunction::Sigmoid, 1.0, rng),
            output_gate: Dense::new(gate_input, filters, ActivationFunction::Sigmoid, 0.0, rng),
            candidate: Dense::new(gate_input, filters, ActivationFunction::Tanh, 0.0, rng),
            readout: Dense::new(filters, 1, ActivationFunction::Identity, 0.0, rng),
        }
    }

    /// Assembles a cell from layers ordered as `LAYER_NAMES`.
    pub fn from_layers([input_gate, forget_gate, output_gate, candidate, readout]: [Dense; 5]) -> ConvLstmCell {
        ConvLstmCell { input_gate, forget_gate, output_gate, candidate, readout }
    }

    /// Activation of each layer, ordered as `LAYER_NAMES`.
    pub fn activations() -> [ActivationFunction; 5] {
        [
            ActivationFunction::Sigmoid,
            ActivationFunction::Sigmoid,
            ActivationFunction::Sigmoid,
            ActivationFunction::Tanh,
            ActivationFunction::Identity,
        ]
    }

    pub fn filters(&self) -> usize {
        self.input_gate.size()
    }

    pub fn layers(&self) -> [&Dense; 5] {
        [&self.input_gate, &self.forget_gate, &self.output_gate, &self.candidate, &self.readout]
    }

    pub fn layers_mut(&mut self) -> [&mut Dense; 5] {
        [
            &mut self.input_gate,
            &mut self.forget_gate,
            &mut self.output_gate,
            &mut self.candidate,
            &mut self.readout,
        ]
    }

    /// Runs `sequences` from `initial_state` and returns the final state.
    pub fn run(&self, sequences: &Tensor, initial_state: &Tensor) -> TrainerResult<Tensor> {
        self.unroll(sequences, initial_state, None)
    }

    /// Runs `sequences` and accumulates next-frame MSE and its gradients.
    ///
    /// Gradients are truncated to a single step: the incoming `(c, h)` of each
    /// step is treated as a constant.
    pub fn run_with_gradients(&self, sequences: &Tensor, initial_state: &Tensor) -> TrainerResult<CellPass> {
        let [batch, time, height, width] = self.check_shapes(sequences, initial_state)?;
        if time < 2 {
            return Err(TrainerError::shape_mismatch(
                "sequence length (need a next-frame target)",
                &[2],
                &[time],
            ));
        }
        let mut backprop = Backprop {
            loss: MseLoss::new(batch * (time - 1) * height * width),
            grads: CellGradients::zeros_like(self),
        };
        let final_state = self.unroll(sequences, initial_state, Some(&mut backprop))?;
        Ok(CellPass {
            final_state,
            loss: backprop.loss.value(),
            gradients: backprop.grads,
        })
    }

    /// Validates `[B, T, H, W, 1]` against `[2, B, H, W, filters]`; returns `[B, T, H, W]`.
    fn check_shapes(&self, sequences: &Tensor, initial_state: &Tensor) -> TrainerResult<[usize; 4]> {
        let s = sequences.shape();
        if s.len() != 5 || s[4] != 1 {
            // Only the rank and channel count are known here.
            return Err(TrainerError::shape_mismatch("sequences [B, T, H, W, 1]", &[5, 1], &[s.len(), s.last().copied().unwrap_or(0)]));
        }
        let (batch, time, height, width) = (s[0], s[1], s[2], s[3]);
        initial_state.expect_shape("initial_lstm_state", &[2, batch, height, width, self.filters()])?;
        Ok([batch, time, height, width])
    }

    fn unroll(
        &self,
        sequences: &Tensor,
        initial_state: &Tensor,
        mut backprop: Option<&mut Backprop>,
    ) -> TrainerResult<Tensor> {
        let [batch, time, height, width] = self.check_shapes(sequences, initial_state)?;
        let mut final_state = Tensor::zeros(initial_state.shape());

        for b in 0..batch {
            for y in 0..height {
                for x in 0..width {
                    let mut c = initial_state.lane(&[0, b, y, x]).to_vec();
                    let mut h = initial_state.lane(&[1, b, y, x]).to_vec();
                    for t in 0..time {
                        let cache = self.step(sequences.get(&[b, t, y, x, 0]), c, &h);
                        if let Some(bp) = backprop.as_deref_mut() {
                            if t + 1 < time {
                                self.backward(&cache, sequences.get(&[b, t + 1, y, x, 0]), bp);
                            }
                        }
                        c = cache.c;
                        h = cache.h;
                    }
                    final_state.lane_mut(&[0, b, y, x]).copy_from_slice(&c);
                    final_state.lane_mut(&[1, b, y, x]).copy_from_slice(&h);
                }
            }
        }
        Ok(final_state)
    }

    fn step(&self, x: f64, c_prev: Vec<f64>, h_prev: &[f64]) -> StepCache {
        let mut input = Vec::with_capacity(1 + h_prev.len());
        input.push(x);
        input.extend_from_slice(h_prev);

        let i = self.input_gate.forward(&input);
        let f = self.forget_gate.forward(&input);
        let o = self.output_gate.forward(&input);
        let g = self.candidate.forward(&input);

        let c: Vec<f64> = (0..c_prev.len())
            .map(|k| f.out[k] * c_prev[k] + i.out[k] * g.out[k])
            .collect();
        let tanh_c: Vec<f64> = c.iter().map(|v| v.tanh()).collect();
        let h = o.out.iter().zip(&tanh_c).map(|(o, t)| o * t).collect();

        StepCache { input, i, f, o, g, c_prev, c, tanh_c, h }
    }

    fn backward(&self, cache: &StepCache, target: f64, bp: &mut Backprop) {
        let prediction = self.readout.forward(&cache.h);
        let dp = bp.loss.observe(prediction.out[0], target);
        let readout_delta = self.readout.layer_delta(&prediction, &[dp]);
        bp.grads.accumulate(4, self.readout.gradients(&cache.h, &readout_delta));

        let dh = self.readout.input_delta(&readout_delta);
        let n = dh.len();
        let d_o: Vec<f64> = (0..n).map(|k| dh[k] * cache.tanh_c[k]).collect();
        let dc: Vec<f64> = (0..n)
            .map(|k| dh[k] * cache.o.out[k] * (1.0 - cache.tanh_c[k] * cache.tanh_c[k]))
            .collect();
        let d_i: Vec<f64> = (0..n).map(|k| dc[k] * cache.g.out[k]).collect();
        let d_f: Vec<f64> = (0..n).map(|k| dc[k] * cache.c_prev[k]).collect();
        let d_g: Vec<f64> = (0..n).map(|k| dc[k] * cache.i.out[k]).collect();

        let gates = [
            (&self.input_gate, &cache.i, d_i),
            (&self.forget_gate, &cache.f, d_f),
            (&self.output_gate, &cache.o, d_o),
            (&self.candidate, &cache.g, d_g),
        ];
        for (idx, (layer, output, d_act)) in gates.into_iter().enumerate() {
            let delta = layer.layer_delta(output, &d_act);
            bp.grads.accumulate(idx, layer.gradients(&cache.input, &delta));
        }
    }
}
