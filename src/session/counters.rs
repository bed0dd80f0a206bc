use serde::{Serialize, Deserialize};

/// Epoch and global-step counters.
///
/// They live inside the `Session` next to the model parameters and are
/// written into every checkpoint, so a resumed run continues where the saved
/// one stopped. Advancing mutates the session immediately. A crash between an
/// advance and the next save replays that work after reload; an increment is
/// never lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    epoch: u64,
    global_step: u64,
}

impl Counters {
    pub fn new(epoch: u64, global_step: u64) -> Counters {
        Counters { epoch, global_step }
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of training iterations processed since training began.
    pub fn current_step(&self) -> u64 {
        self.global_step
    }

    /// Returns the new epoch.
    pub fn advance_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Returns the new global step.
    pub fn advance_step(&mut self) -> u64 {
        self.global_step += 1;
        self.global_step
    }
}
