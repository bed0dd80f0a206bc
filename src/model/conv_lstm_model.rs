use rand::prelude::*;

use crate::error::{TrainerError, TrainerResult};
use crate::layers::conv_lstm::{ConvLstmCell, LAYER_NAMES};
use crate::layers::dense::Dense;
use crate::math::tensor::Tensor;
use crate::model::recurrent::{RecurrentModel, TrainStep};
use crate::optim::sgd::Sgd;
use crate::session::session::Session;
use crate::summary::record::Summary;
use crate::train::train_config::TrainConfig;

/// Next-frame prediction model built on a 1x1 `ConvLstmCell`.
///
/// The training loss is the mean squared error of predicting frame `t + 1`
/// from the hidden state after frame `t`; at inference time that error is the
/// per-pixel anomaly score.
///
/// Parameters are stored in the session as `{scope}/{layer}/kernel` and
/// `{scope}/{layer}/bias`.
#[derive(Debug, Clone)]
pub struct ConvLstmModel {
    scope: String,
    filters: usize,
    optimizer: Sgd,
    seed: Option<u64>,
}

impl ConvLstmModel {
    pub fn new(filters: usize, optimizer: Sgd) -> ConvLstmModel {
        ConvLstmModel {
            scope: "conv_lstm".to_string(),
            filters,
            optimizer,
            seed: None,
        }
    }

    pub fn from_config(config: &TrainConfig) -> ConvLstmModel {
        let model = ConvLstmModel::new(config.conv_lstm_filters, Sgd::new(config.learning_rate));
        match config.seed {
            Some(seed) => model.with_seed(seed),
            None => model,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> ConvLstmModel {
        self.seed = Some(seed);
        self
    }

    pub fn kernel_name(&self, layer: &str) -> String {
        format!("{}/{layer}/kernel", self.scope)
    }

    pub fn bias_name(&self, layer: &str) -> String {
        format!("{}/{layer}/bias", self.scope)
    }

    /// Reads the cell out of the session, checking every shape.
    fn load_cell(&self, session: &Session) -> TrainerResult<ConvLstmCell> {
        let activations = ConvLstmCell::activations();
        let mut layers = Vec::with_capacity(LAYER_NAMES.len());
        for (name, activation) in LAYER_NAMES.iter().zip(activations) {
            let (inputs, outputs) = if *name == "readout" {
                (self.filters, 1)
            } else {
                (1 + self.filters, self.filters)
            };
            let kernel_name = self.kernel_name(name);
            let bias_name = self.bias_name(name);
            let weights = session.parameter(&kernel_name)?.clone();
            let biases = session.parameter(&bias_name)?.clone();
            if weights.shape() != [inputs, outputs] {
                return Err(TrainerError::shape_mismatch(kernel_name, &[inputs, outputs], &weights.shape()));
            }
            if biases.shape() != [1, outputs] {
                return Err(TrainerError::shape_mismatch(bias_name, &[1, outputs], &biases.shape()));
            }
            layers.push(Dense { weights, biases, activation });
        }
        let layers: [Dense; 5] = layers
            .try_into()
            .map_err(|_| TrainerError::invalid_config("conv_lstm cell needs exactly five layers"))?;
        Ok(ConvLstmCell::from_layers(layers))
    }

    fn store_cell(&self, session: &mut Session, cell: ConvLstmCell) -> TrainerResult<()> {
        let layers = [cell.input_gate, cell.forget_gate, cell.output_gate, cell.candidate, cell.readout];
        for (name, layer) in LAYER_NAMES.iter().zip(layers) {
            session.assign_parameter(&self.kernel_name(name), layer.weights)?;
            session.assign_parameter(&self.bias_name(name), layer.biases)?;
        }
        Ok(())
    }

    fn summarize(&self, cell: &ConvLstmCell, loss: f64, grad_norm: f64, final_state: &Tensor) -> Summary {
        let mut summary = Summary::new();
        summary.scalar("loss", loss).scalar("gradient_norm", grad_norm);
        for (name, layer) in LAYER_NAMES.iter().zip(cell.layers()) {
            summary.histogram(self.kernel_name(name), &layer.weights.data);
            summary.histogram(self.bias_name(name), &layer.biases.data);
        }
        summary.histogram("final_lstm_state", final_state.data());
        summary
    }
}

impl RecurrentModel for ConvLstmModel {
    fn init_variables(&mut self, session: &mut Session) {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let fresh = ConvLstmCell::new(self.filters, &mut rng);
        for (name, layer) in LAYER_NAMES.iter().zip(fresh.layers()) {
            session.init_parameter(&self.kernel_name(name), || layer.weights.clone());
            session.init_parameter(&self.bias_name(name), || layer.biases.clone());
        }
    }

    fn warmup(
        &mut self,
        session: &Session,
        sequences: &Tensor,
        initial_state: &Tensor,
    ) -> TrainerResult<Tensor> {
        self.load_cell(session)?.run(sequences, initial_state)
    }

    fn train_step(
        &mut self,
        session: &mut Session,
        sequences: &Tensor,
        initial_state: &Tensor,
        with_summary: bool,
    ) -> TrainerResult<TrainStep> {
        let mut cell = self.load_cell(session)?;
        let pass = cell.run_with_gradients(sequences, initial_state)?;
        if !pass.loss.is_finite() {
            return Err(TrainerError::data(format!("non-finite loss {}", pass.loss)));
        }
        let summary = with_summary
            .then(|| self.summarize(&cell, pass.loss, pass.gradients.norm(), &pass.final_state));

        self.optimizer.step(&mut cell, &pass.gradients);
        self.store_cell(session, cell)?;

        Ok(TrainStep {
            loss: pass.loss,
            final_state: pass.final_state,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::record::SummaryValue;

    fn model() -> ConvLstmModel {
        ConvLstmModel::new(2, Sgd::new(0.05)).with_seed(5)
    }

    fn sequences() -> Tensor {
        let data = (0..2 * 4 * 2 * 2).map(|k| 0.5 + 0.3 * (k as f64 * 0.9).sin()).collect();
        Tensor::from_vec(&[2, 4, 2, 2, 1], data).unwrap()
    }

    #[test]
    fn init_variables_registers_kernel_and_bias_per_layer() {
        let mut session = Session::new();
        let mut m = model();
        m.init_variables(&mut session);
        assert_eq!(session.parameter_names().count(), 10);
        assert_eq!(session.parameter("conv_lstm/input_gate/kernel").unwrap().shape(), [3, 2]);
        assert_eq!(session.parameter("conv_lstm/readout/kernel").unwrap().shape(), [2, 1]);
        assert_eq!(session.parameter("conv_lstm/forget_gate/bias").unwrap().data, vec![1.0, 1.0]);
    }

    #[test]
    fn init_variables_does_not_clobber_restored_values() {
        let mut session = Session::new();
        let mut m = model();
        m.init_variables(&mut session);
        let before = session.snapshot();
        ConvLstmModel::new(2, Sgd::new(0.05)).with_seed(99).init_variables(&mut session);
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn warmup_leaves_parameters_untouched() {
        let mut session = Session::new();
        let mut m = model();
        m.init_variables(&mut session);
        let before = session.snapshot();
        let state = m.warmup(&session, &sequences(), &Tensor::zeros(&[2, 2, 2, 2, 2])).unwrap();
        assert_eq!(state.shape(), &[2, 2, 2, 2, 2]);
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn train_step_updates_parameters_and_reports_summary_on_request() {
        let mut session = Session::new();
        let mut m = model();
        m.init_variables(&mut session);
        let before = session.snapshot();
        let zero = Tensor::zeros(&[2, 2, 2, 2, 2]);

        let plain = m.train_step(&mut session, &sequences(), &zero, false).unwrap();
        assert!(plain.summary.is_none());
        assert_ne!(session.snapshot().parameters, before.parameters);

        let step = m.train_step(&mut session, &sequences(), &zero, true).unwrap();
        let summary = step.summary.unwrap();
        assert_eq!(
            summary.get("loss"),
            Some(&SummaryValue::Scalar { tag: "loss".into(), value: step.loss })
        );
        assert!(summary.get("conv_lstm/candidate/kernel").is_some());
        assert!(summary.get("final_lstm_state").is_some());
    }

    #[test]
    fn repeated_steps_reduce_loss() {
        let mut session = Session::new();
        let mut m = model();
        m.init_variables(&mut session);
        let zero = Tensor::zeros(&[2, 2, 2, 2, 2]);
        let first = m.train_step(&mut session, &sequences(), &zero, false).unwrap().loss;
        let mut last = first;
        for _ in 0..30 {
            last = m.train_step(&mut session, &sequences(), &zero, false).unwrap().loss;
        }
        assert!(last < first, "{last} !< {first}");
    }

    #[test]
    fn missing_parameters_are_reported() {
        let session = Session::new();
        let err = model().warmup(&session, &sequences(), &Tensor::zeros(&[2, 2, 2, 2, 2])).unwrap_err();
        assert!(matches!(err, TrainerError::UnknownParameter(_)));
    }
}
