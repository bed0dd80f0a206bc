use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{TrainerError, TrainerResult};

/// Configuration for a `Trainer` run, stored as JSON.
///
/// # Fields
/// - `batch_size`        — sequences per sub-batch (warmup and train alike)
/// - `input_shape`       — frame `[height, width]`
/// - `conv_lstm_filters` — channels of the recurrent state
/// - `epochs_num`        — training stops once the epoch counter reaches this
/// - `iters_per_epoch`   — batch pairs consumed per epoch
/// - `max_to_keep`       — checkpoints retained on disk (`0` keeps all)
/// - `summary_dir`       — where the metric logger writes
/// - `checkpoint_dir`    — where checkpoints and their index live
/// - `load`              — restore the latest checkpoint on startup
/// - `sequence_length`   — frames per sub-batch sequence; at least 2
/// - `learning_rate`     — SGD step size for the reference model
/// - `seed`              — seeds parameter init and synthetic data
/// - `show_progress`     — draw a per-epoch progress bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub input_shape: [usize; 2],
    pub conv_lstm_filters: usize,
    pub epochs_num: u64,
    pub iters_per_epoch: usize,
    #[serde(default = "default_max_to_keep")]
    pub max_to_keep: usize,
    #[serde(default = "default_summary_dir")]
    pub summary_dir: PathBuf,
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    #[serde(default)]
    pub load: bool,
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

fn default_max_to_keep() -> usize { 5 }
fn default_summary_dir() -> PathBuf { PathBuf::from("experiments/summary") }
fn default_checkpoint_dir() -> PathBuf { PathBuf::from("experiments/checkpoint") }
fn default_sequence_length() -> usize { 8 }
fn default_learning_rate() -> f64 { 0.01 }
fn default_show_progress() -> bool { true }

impl TrainConfig {
    /// Creates a config with the required fields and defaults for the rest.
    pub fn new(
        batch_size: usize,
        input_shape: [usize; 2],
        conv_lstm_filters: usize,
        epochs_num: u64,
        iters_per_epoch: usize,
    ) -> Self {
        TrainConfig {
            batch_size,
            input_shape,
            conv_lstm_filters,
            epochs_num,
            iters_per_epoch,
            max_to_keep: default_max_to_keep(),
            summary_dir: default_summary_dir(),
            checkpoint_dir: default_checkpoint_dir(),
            load: false,
            sequence_length: default_sequence_length(),
            learning_rate: default_learning_rate(),
            seed: None,
            show_progress: default_show_progress(),
        }
    }

    pub fn height(&self) -> usize {
        self.input_shape[0]
    }

    pub fn width(&self) -> usize {
        self.input_shape[1]
    }

    /// Shape of the recurrent carry state: `[2, batch, height, width, filters]`.
    pub fn state_shape(&self) -> [usize; 5] {
        [2, self.batch_size, self.height(), self.width(), self.conv_lstm_filters]
    }

    /// Shape of one sub-batch: `[batch, sequence_length, height, width, 1]`.
    pub fn sequence_shape(&self) -> [usize; 5] {
        [self.batch_size, self.sequence_length, self.height(), self.width(), 1]
    }

    pub fn validate(&self) -> TrainerResult<()> {
        if self.batch_size == 0 {
            return Err(TrainerError::invalid_config("batch_size must be at least 1"));
        }
        if self.height() == 0 || self.width() == 0 {
            return Err(TrainerError::invalid_config("input_shape dimensions must be non-zero"));
        }
        if self.conv_lstm_filters == 0 {
            return Err(TrainerError::invalid_config("conv_lstm_filters must be at least 1"));
        }
        if self.iters_per_epoch == 0 {
            return Err(TrainerError::invalid_config("iters_per_epoch must be at least 1"));
        }
        if self.sequence_length < 2 {
            return Err(TrainerError::invalid_config(
                "sequence_length must be at least 2 (one frame plus its successor)",
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainerError::invalid_config("learning_rate must be a positive number"));
        }
        Ok(())
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> TrainerResult<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reads and validates a config from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> TrainerResult<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig::new(4, [16, 16], 8, 10, 50)
    }
}
