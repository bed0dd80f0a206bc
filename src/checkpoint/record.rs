use std::collections::BTreeMap;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{TrainerError, TrainerResult};
use crate::math::matrix::Matrix;
use crate::session::counters::Counters;

/// Current on-disk record version.
pub const RECORD_VERSION: u32 = 1;

/// Snapshot of every learnable parameter plus both counters.
///
/// Identified by the global step at save time (`counters.current_step()`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub version: u32,
    pub counters: Counters,
    pub parameters: BTreeMap<String, Matrix>,
}

impl CheckpointRecord {
    pub fn global_step(&self) -> u64 {
        self.counters.current_step()
    }

    /// Rejects unknown versions and matrices whose data does not fill their shape.
    pub fn validate(&self) -> TrainerResult<()> {
        if self.version != RECORD_VERSION {
            return Err(TrainerError::checkpoint(format!(
                "unsupported record version {} (expected {RECORD_VERSION})",
                self.version
            )));
        }
        for (name, m) in &self.parameters {
            if !m.is_consistent() {
                return Err(TrainerError::checkpoint(format!(
                    "parameter {name} holds {} values for shape {:?}",
                    m.data.len(),
                    m.shape()
                )));
            }
        }
        Ok(())
    }

    /// Writes the record as JSON to `path`.
    pub fn save_json(&self, path: &Path) -> TrainerResult<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        std::io::Write::flush(&mut writer)?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Reads and validates a record previously written by `save_json`.
    pub fn load_json(path: &Path) -> TrainerResult<CheckpointRecord> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let record: CheckpointRecord = serde_json::from_reader(reader)?;
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inconsistent_matrix_fails_validation() {
        let mut parameters = BTreeMap::new();
        parameters.insert("w".to_string(), Matrix { rows: 2, cols: 2, data: vec![0.0; 3] });
        let record = CheckpointRecord { version: RECORD_VERSION, counters: Counters::default(), parameters };
        assert!(matches!(record.validate(), Err(TrainerError::Checkpoint(_))));
    }

    #[test]
    fn unknown_version_fails_validation() {
        let record = CheckpointRecord { version: 99, counters: Counters::default(), parameters: BTreeMap::new() };
        assert!(record.validate().is_err());
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-3.ckpt.json");
        let mut parameters = BTreeMap::new();
        parameters.insert("w".to_string(), Matrix::filled(1, 2, 0.5));
        let record = CheckpointRecord { version: RECORD_VERSION, counters: Counters::new(1, 3), parameters };
        record.save_json(&path).unwrap();
        assert_eq!(CheckpointRecord::load_json(&path).unwrap(), record);
    }

    #[test]
    fn non_dyadic_values_survive_bit_for_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-7.ckpt.json");
        let values = vec![0.1 + 0.2, 1.0002778273670705, 0.9987208839196432, -1.0 / 3.0, 2.0f64.sqrt()];
        let mut parameters = BTreeMap::new();
        parameters.insert("w".to_string(), Matrix { rows: 1, cols: values.len(), data: values.clone() });
        let record = CheckpointRecord { version: RECORD_VERSION, counters: Counters::new(2, 7), parameters };
        record.save_json(&path).unwrap();

        let loaded = CheckpointRecord::load_json(&path).unwrap();
        let restored = &loaded.parameters["w"].data;
        for (saved, got) in values.iter().zip(restored) {
            assert_eq!(saved.to_bits(), got.to_bits(), "{saved} came back as {got}");
        }
    }
}
