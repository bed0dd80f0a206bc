use std::path::PathBuf;

use serde::{Serialize, Deserialize};

/// Per-epoch training statistics returned by `Trainer::train`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// Epoch counter after this epoch, i.e. the number of completed epochs.
    pub epoch: u64,
    /// Configured `epochs_num`.
    pub total_epochs: u64,
    /// Mean training loss over this epoch's iterations.
    pub train_loss: f64,
    /// Global step after this epoch.
    pub global_step: u64,
    /// Batch pairs processed in this epoch.
    pub iterations: usize,
    /// Wall-clock duration of this epoch in milliseconds.
    pub elapsed_ms: u64,
    /// Checkpoint written at the end of the epoch.
    pub checkpoint: PathBuf,
}
