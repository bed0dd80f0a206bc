use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::checkpoint::manager::CheckpointManager;
use crate::data::generator::DataGenerator;
use crate::error::{TrainerError, TrainerResult};
use crate::math::tensor::Tensor;
use crate::model::recurrent::RecurrentModel;
use crate::session::session::Session;
use crate::summary::logger::MetricLogger;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

/// Drives epochs of warmup/train iterations over a borrowed `Session`.
///
/// Construction registers the model's parameters, creates the summary and
/// checkpoint directories and, when `config.load` is set, restores the latest
/// checkpoint. `train` then resumes from the persisted epoch counter.
pub struct Trainer<'s, M, D, L> {
    session: &'s mut Session,
    model: M,
    data_generator: D,
    logger: L,
    config: TrainConfig,
    checkpoints: CheckpointManager,
}

impl<'s, M, D, L> Trainer<'s, M, D, L>
where
    M: RecurrentModel,
    D: DataGenerator,
    L: MetricLogger,
{
    pub fn new(
        session: &'s mut Session,
        mut model: M,
        data_generator: D,
        logger: L,
        config: TrainConfig,
    ) -> TrainerResult<Self> {
        config.validate()?;
        model.init_variables(session);
        debug!(parameters = ?session.parameter_names().collect::<Vec<_>>(), "model variables registered");
        std::fs::create_dir_all(&config.summary_dir)?;
        let checkpoints = CheckpointManager::new(&config.checkpoint_dir, config.max_to_keep)?;

        let mut trainer = Trainer {
            session,
            model,
            data_generator,
            logger,
            config,
            checkpoints,
        };
        if trainer.config.load {
            trainer.load()?;
        }
        Ok(trainer)
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Saves parameters and counters, tagged with the current global step.
    pub fn save(&mut self) -> TrainerResult<PathBuf> {
        self.checkpoints.save(&*self.session)
    }

    /// Restores the latest checkpoint; `Ok(None)` means there was none.
    pub fn load(&mut self) -> TrainerResult<Option<PathBuf>> {
        self.checkpoints.load(&mut *self.session)
    }

    /// Zeroed recurrent state of shape `[2, batch, height, width, filters]`.
    pub fn initial_state(&self) -> Tensor {
        Tensor::zeros(&self.config.state_shape())
    }

    /// Runs epochs until the epoch counter reaches `epochs_num`.
    ///
    /// Returns the statistics of every epoch run by this call; an already
    /// finished run returns an empty list.
    pub fn train(&mut self) -> TrainerResult<Vec<EpochStats>> {
        let first = self.session.counters().current_epoch();
        self.data_generator.seek_epoch(first);
        let mut history = Vec::new();
        for epoch in first..self.config.epochs_num {
            history.push(self.train_epoch(epoch)?);
        }
        info!(
            epoch = self.session.counters().current_epoch(),
            step = self.session.counters().current_step(),
            "Training finished"
        );
        Ok(history)
    }

    /// Evaluation entry point. Only the state preparation is defined: the
    /// zeroed carry state evaluation would start from is returned.
    pub fn test(&self, cur_it: u64) -> Tensor {
        debug!(cur_it, "preparing evaluation state");
        self.initial_state()
    }

    fn train_epoch(&mut self, epoch: u64) -> TrainerResult<EpochStats> {
        let started = Instant::now();
        let iters = self.config.iters_per_epoch;
        let batch_shape = self.config.sequence_shape();
        // Every iteration's warmup starts from this epoch's zero state.
        let initial_state = self.initial_state();
        let progress = self.progress_bar(epoch);
        let mut losses = Vec::with_capacity(iters);

        for (itr, pair) in self.data_generator.next_batch().take(iters).enumerate() {
            let pair = pair?;
            pair.check_shape(&batch_shape)?;

            // ── Warmup: only produces the carry state ─────────────────────────
            let carry = self.model.warmup(&*self.session, &pair.warmup, &initial_state)?;

            // ── Train from the carried state, one optimizer update ───────────
            let is_last = itr + 1 == iters;
            let step = self.model.train_step(&mut *self.session, &pair.train, &carry, is_last)?;
            if let Some(summary) = step.summary {
                let global_step = self.session.counters().current_step();
                self.logger.add_merged_summary(global_step, &summary)?;
            }

            losses.push(step.loss);
            self.session.counters_mut().advance_step();

            progress.set_message(format!("loss {:.5}", step.loss));
            progress.inc(1);
        }

        if losses.is_empty() {
            progress.abandon();
            return Err(TrainerError::data(format!("data generator produced no batches in epoch {epoch}")));
        }
        if losses.len() < iters {
            warn!(epoch, expected = iters, got = losses.len(), "data generator ended the epoch early");
        }

        // ── End of epoch: log, advance, checkpoint ─────────────────────────────
        let train_loss = losses.iter().sum::<f64>() / losses.len() as f64;
        let global_step = self.session.counters().current_step();
        let mut scalars = BTreeMap::new();
        scalars.insert("train_loss".to_string(), train_loss);
        self.logger.add_scalar_summary(global_step, &scalars)?;

        let completed = self.session.counters_mut().advance_epoch();
        let checkpoint = self.save()?;
        progress.finish_with_message(format!("loss {train_loss:.5}"));

        info!(epoch = completed, step = global_step, train_loss, "epoch complete");
        Ok(EpochStats {
            epoch: completed,
            total_epochs: self.config.epochs_num,
            train_loss,
            global_step,
            iterations: losses.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            checkpoint,
        })
    }

    fn progress_bar(&self, epoch: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.config.iters_per_epoch as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_prefix(format!("epoch-{epoch}-"));
        pb
    }
}
