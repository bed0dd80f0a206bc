use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::checkpoint::record::CheckpointRecord;
use crate::error::TrainerResult;
use crate::session::session::Session;

/// Name of the index file kept next to the checkpoints.
pub const INDEX_FILE: &str = "checkpoint";

/// Checkpoint files are named `{CHECKPOINT_PREFIX}-{global_step}.ckpt.json`.
pub const CHECKPOINT_PREFIX: &str = "model";

/// Contents of the index file. Paths are file names relative to the
/// checkpoint directory, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CheckpointIndex {
    latest: Option<String>,
    all: Vec<String>,
}

/// Saves and restores sessions under one directory, keeping at most
/// `max_to_keep` checkpoints (`0` keeps all of them).
///
/// Each checkpoint is a single JSON `CheckpointRecord` named
/// `model-{global_step}.ckpt.json`. Files and the index are written to a
/// temporary name and renamed into place, so a crash never leaves a torn
/// record behind.
#[derive(Debug)]
pub struct CheckpointManager {
    dir: PathBuf,
    max_to_keep: usize,
    retained: Vec<String>,
}

impl CheckpointManager {
    /// Creates `dir` if needed and picks up the retention list from an
    /// existing index, so retention spans process restarts.
    pub fn new(dir: impl Into<PathBuf>, max_to_keep: usize) -> TrainerResult<CheckpointManager> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let retained = read_index(&dir)?.map(|index| index.all).unwrap_or_default();
        Ok(CheckpointManager {
            dir,
            max_to_keep,
            retained,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_to_keep(&self) -> usize {
        self.max_to_keep
    }

    /// Retained checkpoint paths, oldest first.
    pub fn checkpoints(&self) -> Vec<PathBuf> {
        self.retained.iter().map(|name| self.dir.join(name)).collect()
    }

    /// Path of the most recent checkpoint recorded in the index, if its file
    /// still exists.
    pub fn latest_checkpoint(&self) -> TrainerResult<Option<PathBuf>> {
        let Some(latest) = read_index(&self.dir)?.and_then(|index| index.latest) else {
            return Ok(None);
        };
        let path = self.dir.join(latest);
        if !path.exists() {
            warn!(path = %path.display(), "checkpoint index points at a missing file");
            return Ok(None);
        }
        Ok(Some(path))
    }

    /// Writes the session's parameters and counters as a new checkpoint
    /// tagged with the current global step, then prunes old checkpoints.
    pub fn save(&mut self, session: &Session) -> TrainerResult<PathBuf> {
        let record = session.snapshot();
        let name = format!("{CHECKPOINT_PREFIX}-{}.ckpt.json", record.global_step());
        let path = self.dir.join(&name);

        write_atomic(&path, |tmp| record.save_json(tmp))?;

        let was_retained = self.retained.contains(&name);
        let mut retained: Vec<String> = self.retained.iter().filter(|n| **n != name).cloned().collect();
        retained.push(name.clone());
        let expired: Vec<String> = if self.max_to_keep > 0 && retained.len() > self.max_to_keep {
            let excess = retained.len() - self.max_to_keep;
            retained.drain(..excess).collect()
        } else {
            Vec::new()
        };

        let index = CheckpointIndex { latest: Some(name), all: retained };
        let indexed = write_atomic(&self.dir.join(INDEX_FILE), |tmp| {
            fs::write(tmp, serde_json::to_vec_pretty(&index)?)?;
            Ok(())
        });
        if let Err(e) = indexed {
            // An unindexed file would never be pruned.
            if !was_retained {
                let _ = fs::remove_file(&path);
            }
            return Err(e);
        }
        self.retained = index.all;

        for old in expired {
            match fs::remove_file(self.dir.join(&old)) {
                Ok(()) => debug!(checkpoint = %old, "removed expired checkpoint"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(path = %path.display(), step = record.global_step(), "Model saved");
        Ok(path)
    }

    /// Restores the latest checkpoint into `session`.
    ///
    /// Returns `Ok(None)` when the directory holds no checkpoint; the session
    /// is then left as it was (a fresh start).
    pub fn load(&self, session: &mut Session) -> TrainerResult<Option<PathBuf>> {
        let Some(path) = self.latest_checkpoint()? else {
            info!(dir = %self.dir.display(), "No checkpoint found, starting fresh");
            return Ok(None);
        };
        info!(path = %path.display(), "Loading model checkpoint");
        let record = CheckpointRecord::load_json(&path)?;
        session.restore(record)?;
        info!(
            epoch = session.counters().current_epoch(),
            step = session.counters().current_step(),
            "Model loaded"
        );
        Ok(Some(path))
    }
}

fn read_index(dir: &Path) -> TrainerResult<Option<CheckpointIndex>> {
    match fs::read(dir.join(INDEX_FILE)) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Runs `write` against a sibling temporary path, then renames it over `path`.
fn write_atomic<F>(path: &Path, write: F) -> TrainerResult<()>
where
    F: FnOnce(&Path) -> TrainerResult<()>,
{
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::matrix::Matrix;

    fn session() -> Session {
        let mut s = Session::new();
        s.init_parameter("w", || Matrix::filled(2, 2, 0.25));
        s
    }

    fn ckpt_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir).unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".ckpt.json"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn new_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/ckpt");
        CheckpointManager::new(&dir, 3).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn load_without_checkpoint_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(tmp.path(), 3).unwrap();
        let mut s = session();
        assert_eq!(manager.load(&mut s).unwrap(), None);
        assert_eq!(s.counters().current_step(), 0);
    }

    #[test]
    fn save_then_load_restores_counters_in_a_fresh_session() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = session();
        for _ in 0..7 {
            s.counters_mut().advance_step();
        }
        s.counters_mut().advance_epoch();
        s.counters_mut().advance_epoch();
        s.assign_parameter("w", Matrix::filled(2, 2, -3.0)).unwrap();

        let mut manager = CheckpointManager::new(tmp.path(), 3).unwrap();
        let saved = manager.save(&s).unwrap();
        assert!(saved.ends_with("model-7.ckpt.json"));

        let reopened = CheckpointManager::new(tmp.path(), 3).unwrap();
        let mut fresh = session();
        assert_eq!(reopened.load(&mut fresh).unwrap(), Some(saved));
        assert_eq!(fresh.counters().current_epoch(), 2);
        assert_eq!(fresh.counters().current_step(), 7);
        assert_eq!(fresh.parameter("w").unwrap().get(1, 1), -3.0);
    }

    #[test]
    fn retention_keeps_only_the_most_recent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(tmp.path(), 2).unwrap();
        let mut s = session();
        for _ in 0..5 {
            s.counters_mut().advance_step();
            manager.save(&s).unwrap();
        }
        assert_eq!(ckpt_files(tmp.path()), vec!["model-4.ckpt.json", "model-5.ckpt.json"]);
        assert_eq!(manager.checkpoints(), vec![
            tmp.path().join("model-4.ckpt.json"),
            tmp.path().join("model-5.ckpt.json"),
        ]);
        assert_eq!(manager.latest_checkpoint().unwrap(), Some(tmp.path().join("model-5.ckpt.json")));
    }

    #[test]
    fn retention_spans_manager_restarts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = session();
        {
            let mut manager = CheckpointManager::new(tmp.path(), 2).unwrap();
            for _ in 0..2 {
                s.counters_mut().advance_step();
                manager.save(&s).unwrap();
            }
        }
        let mut manager = CheckpointManager::new(tmp.path(), 2).unwrap();
        s.counters_mut().advance_step();
        manager.save(&s).unwrap();
        assert_eq!(ckpt_files(tmp.path()), vec!["model-2.ckpt.json", "model-3.ckpt.json"]);
    }

    #[test]
    fn zero_max_to_keep_retains_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(tmp.path(), 0).unwrap();
        let mut s = session();
        for _ in 0..4 {
            s.counters_mut().advance_step();
            manager.save(&s).unwrap();
        }
        assert_eq!(ckpt_files(tmp.path()).len(), 4);
    }

    #[test]
    fn saving_the_same_step_twice_keeps_one_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(tmp.path(), 3).unwrap();
        let s = session();
        manager.save(&s).unwrap();
        manager.save(&s).unwrap();
        assert_eq!(manager.checkpoints().len(), 1);
    }

    #[test]
    fn index_pointing_at_deleted_file_means_no_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(tmp.path(), 3).unwrap();
        let path = manager.save(&session()).unwrap();
        fs::remove_file(path).unwrap();
        assert_eq!(manager.latest_checkpoint().unwrap(), None);
    }

    #[test]
    fn save_into_removed_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ckpt");
        let mut manager = CheckpointManager::new(&dir, 3).unwrap();
        fs::remove_dir_all(&dir).unwrap();
        assert!(manager.save(&session()).is_err());
    }

    #[test]
    fn failed_index_write_keeps_retention_bound() {
        let tmp = tempfile::tempdir().unwrap();
        let index = tmp.path().join(INDEX_FILE);
        let mut manager = CheckpointManager::new(tmp.path(), 1).unwrap();
        let mut s = session();

        s.counters_mut().advance_step();
        manager.save(&s).unwrap();

        fs::remove_file(&index).unwrap();
        fs::create_dir(&index).unwrap();
        s.counters_mut().advance_step();
        assert!(manager.save(&s).is_err());
        assert_eq!(manager.checkpoints(), vec![tmp.path().join("model-1.ckpt.json")]);

        fs::remove_dir(&index).unwrap();
        s.counters_mut().advance_step();
        manager.save(&s).unwrap();
        assert_eq!(ckpt_files(tmp.path()), vec!["model-3.ckpt.json"]);
        assert_eq!(manager.checkpoints(), vec![tmp.path().join("model-3.ckpt.json")]);
    }
}
