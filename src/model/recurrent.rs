use crate::error::TrainerResult;
use crate::math::tensor::Tensor;
use crate::session::session::Session;
use crate::summary::record::Summary;

/// Outputs of one training run of a model.
#[derive(Debug, Clone)]
pub struct TrainStep {
    /// Loss before the optimizer update.
    pub loss: f64,
    /// Recurrent state after the training sequence.
    pub final_state: Tensor,
    /// Merged summary, present only when requested.
    pub summary: Option<Summary>,
}

/// A sequence model with an explicit recurrent state.
///
/// Parameters live in the `Session`, never in the model value itself, so a
/// checkpoint of the session captures the whole model.
pub trait RecurrentModel {
    /// Registers every parameter the model needs. Parameters that already
    /// exist in the session are left untouched.
    fn init_variables(&mut self, session: &mut Session);

    /// Runs `sequences` from `initial_state` and returns the final recurrent
    /// state. No loss, no update.
    fn warmup(
        &mut self,
        session: &Session,
        sequences: &Tensor,
        initial_state: &Tensor,
    ) -> TrainerResult<Tensor>;

    /// Runs `sequences` from `initial_state`, computes the loss and applies one
    /// optimizer update to the session's parameters. With `with_summary` the
    /// step also returns a merged summary taken before the update.
    fn train_step(
        &mut self,
        session: &mut Session,
        sequences: &Tensor,
        initial_state: &Tensor,
        with_summary: bool,
    ) -> TrainerResult<TrainStep>;
}
