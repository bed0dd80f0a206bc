use serde::{Serialize, Deserialize};

/// Distribution statistics of a tensor or parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl Histogram {
    pub fn from_values(values: &[f64]) -> Histogram {
        if values.is_empty() {
            return Histogram { count: 0, min: 0.0, max: 0.0, mean: 0.0, std_dev: 0.0 };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Histogram {
            count: values.len(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std_dev: var.sqrt(),
        }
    }
}

/// One tagged entry of a merged summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummaryValue {
    Scalar { tag: String, value: f64 },
    Histogram { tag: String, histogram: Histogram },
}

impl SummaryValue {
    pub fn tag(&self) -> &str {
        match self {
            SummaryValue::Scalar { tag, .. } | SummaryValue::Histogram { tag, .. } => tag,
        }
    }
}

/// Merged summary emitted by a model's training step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub values: Vec<SummaryValue>,
}

impl Summary {
    pub fn new() -> Summary {
        Summary::default()
    }

    pub fn scalar(&mut self, tag: impl Into<String>, value: f64) -> &mut Summary {
        self.values.push(SummaryValue::Scalar { tag: tag.into(), value });
        self
    }

    pub fn histogram(&mut self, tag: impl Into<String>, values: &[f64]) -> &mut Summary {
        self.values.push(SummaryValue::Histogram {
            tag: tag.into(),
            histogram: Histogram::from_values(values),
        });
        self
    }

    pub fn get(&self, tag: &str) -> Option<&SummaryValue> {
        self.values.iter().find(|v| v.tag() == tag)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
