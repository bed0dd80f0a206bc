use crate::data::batch::BatchPair;
use crate::error::TrainerResult;

/// Lazy, finite stream of batch pairs for one epoch.
pub type EpochBatches<'a> = Box<dyn Iterator<Item = TrainerResult<BatchPair>> + 'a>;

/// Source of training data.
///
/// Each call to `next_batch` starts a new epoch and returns a lazy sequence of
/// `iters_per_epoch` pairs. The trainer pulls one pair at a time.
pub trait DataGenerator {
    fn next_batch(&mut self) -> EpochBatches<'_>;

    /// Positions the source so the next `next_batch` yields epoch `epoch`.
    /// Called once before training starts, with the restored epoch counter.
    fn seek_epoch(&mut self, _epoch: u64) {}
}
