pub mod batch;
pub mod generator;
pub mod synthetic;

pub use batch::BatchPair;
pub use generator::{DataGenerator, EpochBatches};
pub use synthetic::SyntheticGenerator;
