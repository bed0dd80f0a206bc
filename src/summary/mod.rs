pub mod logger;
pub mod record;

pub use logger::{MetricLogger, SummaryLogger};
pub use record::{Histogram, Summary, SummaryValue};
