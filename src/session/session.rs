use std::collections::BTreeMap;

use crate::checkpoint::record::{CheckpointRecord, RECORD_VERSION};
use crate::error::{TrainerError, TrainerResult};
use crate::math::matrix::Matrix;
use crate::session::counters::Counters;

/// Execution context for one training process.
///
/// Owns every persisted value: the model parameters (by name) and the
/// epoch/step counters. The trainer borrows it mutably for its whole lifetime;
/// models and the checkpoint manager receive it explicitly per call.
#[derive(Debug, Clone, Default)]
pub struct Session {
    counters: Counters,
    parameters: BTreeMap<String, Matrix>,
}

impl Session {
    pub fn new() -> Session {
        Session::default()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    /// Registers `name` with the value produced by `init`, unless it is
    /// already registered. Returns true when the parameter was created.
    pub fn init_parameter<F>(&mut self, name: &str, init: F) -> bool
    where
        F: FnOnce() -> Matrix,
    {
        if self.parameters.contains_key(name) {
            return false;
        }
        self.parameters.insert(name.to_string(), init());
        true
    }

    pub fn parameter(&self, name: &str) -> TrainerResult<&Matrix> {
        self.parameters
            .get(name)
            .ok_or_else(|| TrainerError::UnknownParameter(name.to_string()))
    }

    /// Overwrites a registered parameter; the shape must not change.
    pub fn assign_parameter(&mut self, name: &str, value: Matrix) -> TrainerResult<()> {
        let slot = self.parameters
            .get_mut(name)
            .ok_or_else(|| TrainerError::UnknownParameter(name.to_string()))?;
        if slot.shape() != value.shape() {
            return Err(TrainerError::shape_mismatch(name, &slot.shape(), &value.shape()));
        }
        *slot = value;
        Ok(())
    }

    pub fn snapshot(&self) -> CheckpointRecord {
        CheckpointRecord {
            version: RECORD_VERSION,
            counters: self.counters,
            parameters: self.parameters.clone(),
        }
    }

    /// Replaces every registered parameter and both counters from `record`.
    ///
    /// The record must carry each registered parameter with the same shape;
    /// extra entries are ignored. Nothing is modified unless every check
    /// passes.
    pub fn restore(&mut self, mut record: CheckpointRecord) -> TrainerResult<()> {
        record.validate()?;
        let mut restored = BTreeMap::new();
        for (name, current) in &self.parameters {
            let saved = record.parameters.remove(name).ok_or_else(|| {
                TrainerError::checkpoint(format!("parameter {name} not found in checkpoint"))
            })?;
            if saved.shape() != current.shape() {
                return Err(TrainerError::shape_mismatch(
                    format!("checkpoint parameter {name}"),
                    &current.shape(),
                    &saved.shape(),
                ));
            }
            restored.insert(name.clone(), saved);
        }
        self.parameters = restored;
        self.counters = record.counters;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_weight() -> Session {
        let mut s = Session::new();
        s.init_parameter("cell/w", || Matrix::filled(2, 3, 1.0));
        s
    }

    #[test]
    fn init_parameter_keeps_existing_value() {
        let mut s = session_with_weight();
        assert!(!s.init_parameter("cell/w", || Matrix::zeros(2, 3)));
        assert_eq!(s.parameter("cell/w").unwrap().get(0, 0), 1.0);
    }

    #[test]
    fn assign_rejects_shape_change_and_unknown_names() {
        let mut s = session_with_weight();
        assert!(matches!(
            s.assign_parameter("cell/w", Matrix::zeros(3, 2)),
            Err(TrainerError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            s.assign_parameter("other", Matrix::zeros(1, 1)),
            Err(TrainerError::UnknownParameter(_))
        ));
    }

    #[test]
    fn restore_replaces_parameters_and_counters() {
        let mut s = session_with_weight();
        s.counters_mut().advance_step();
        s.counters_mut().advance_epoch();
        s.assign_parameter("cell/w", Matrix::filled(2, 3, 7.0)).unwrap();
        let record = s.snapshot();

        let mut fresh = session_with_weight();
        fresh.restore(record).unwrap();
        assert_eq!(*fresh.counters(), Counters::new(1, 1));
        assert_eq!(fresh.parameter("cell/w").unwrap().get(1, 2), 7.0);
    }

    #[test]
    fn failed_restore_leaves_session_untouched() {
        let mut s = session_with_weight();
        s.init_parameter("cell/b", || Matrix::zeros(1, 3));
        let mut record = session_with_weight().snapshot();
        record.counters = Counters::new(4, 40);

        assert!(matches!(s.restore(record), Err(TrainerError::Checkpoint(_))));
        assert_eq!(*s.counters(), Counters::default());
        assert!(s.contains("cell/b"));
    }
}
