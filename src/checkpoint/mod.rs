pub mod manager;
pub mod record;

pub use manager::CheckpointManager;
pub use record::CheckpointRecord;
