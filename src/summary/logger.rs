use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::TrainerResult;
use crate::summary::record::Summary;

/// Sink for training metrics keyed by global step.
pub trait MetricLogger {
    /// Records named scalar values (e.g. `{"train_loss": 0.03}`).
    fn add_scalar_summary(&mut self, step: u64, scalars: &BTreeMap<String, f64>) -> TrainerResult<()>;

    /// Records a merged summary produced by the model.
    fn add_merged_summary(&mut self, step: u64, summary: &Summary) -> TrainerResult<()>;
}

/// Events file written by `SummaryLogger` inside the summary directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// One line of the events file.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Event<'a> {
    Scalar { step: u64, values: &'a BTreeMap<String, f64> },
    Summary { step: u64, summary: &'a [crate::summary::record::SummaryValue] },
}

/// Appends every record as one JSON object per line to
/// `{summary_dir}/events.jsonl`, flushing after each record.
pub struct SummaryLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SummaryLogger {
    /// Creates `summary_dir` if needed and opens the events file for append,
    /// so resumed runs extend the same log.
    pub fn new(summary_dir: impl AsRef<Path>) -> TrainerResult<SummaryLogger> {
        let dir = summary_dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(EVENTS_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "opened summary events file");
        Ok(SummaryLogger { path, writer: BufWriter::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_event(&mut self, event: &Event<'_>) -> TrainerResult<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl MetricLogger for SummaryLogger {
    fn add_scalar_summary(&mut self, step: u64, scalars: &BTreeMap<String, f64>) -> TrainerResult<()> {
        self.write_event(&Event::Scalar { step, values: scalars })
    }

    fn add_merged_summary(&mut self, step: u64, summary: &Summary) -> TrainerResult<()> {
        self.write_event(&Event::Summary { step, summary: &summary.values })
    }
}
