pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod optim;
pub mod session;
pub mod checkpoint;
pub mod summary;
pub mod data;
pub mod model;
pub mod train;

// Convenience re-exports
pub use error::{TrainerError, TrainerResult};
pub use math::{Matrix, Tensor};
pub use session::{Counters, Session};
pub use checkpoint::{CheckpointManager, CheckpointRecord};
pub use summary::{MetricLogger, Summary, SummaryLogger, SummaryValue};
pub use data::{BatchPair, DataGenerator, EpochBatches, SyntheticGenerator};
pub use model::{ConvLstmModel, RecurrentModel, TrainStep};
pub use optim::Sgd;
pub use train::{EpochStats, TrainConfig, Trainer};
