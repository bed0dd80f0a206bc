use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ferrite_trainer::{
    ConvLstmModel, Session, SummaryLogger, SyntheticGenerator, TrainConfig, Trainer,
};

/// Trains a ConvLSTM next-frame anomaly model on synthetic sequences.
#[derive(Parser)]
#[command(name = "ferrite-trainer", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run (or resume) training from a JSON config
    Train {
        #[arg(short, long)]
        config: PathBuf,
        /// Restore the latest checkpoint even if the config says otherwise
        #[arg(long)]
        load: bool,
        /// Hide the per-epoch progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Write a default config file
    InitConfig {
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },
    /// Restore the latest checkpoint and prepare the evaluation state
    Test {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Train { config, load, no_progress } => {
            let cfg = read_config(&config)?;
            train(with_train_flags(cfg, load, no_progress))
        }
        Command::InitConfig { output } => {
            TrainConfig::default()
                .save_json(&output)
                .with_context(|| format!("writing config {}", output.display()))?;
            info!(path = %output.display(), "wrote default config");
            Ok(())
        }
        Command::Test { config } => {
            let cfg = read_config(&config)?;
            test(for_evaluation(cfg))
        }
    }
}

fn read_config(path: &Path) -> Result<TrainConfig> {
    TrainConfig::load_json(path).with_context(|| format!("reading config {}", path.display()))
}

/// Command-line flags can only switch loading on and the progress bar off.
fn with_train_flags(mut cfg: TrainConfig, load: bool, no_progress: bool) -> TrainConfig {
    cfg.load |= load;
    cfg.show_progress &= !no_progress;
    cfg
}

/// Evaluation always starts from the latest checkpoint.
fn for_evaluation(mut cfg: TrainConfig) -> TrainConfig {
    cfg.load = true;
    cfg
}

fn build_trainer(
    session: &mut Session,
    cfg: TrainConfig,
) -> Result<Trainer<'_, ConvLstmModel, SyntheticGenerator, SummaryLogger>> {
    let model = ConvLstmModel::from_config(&cfg);
    let data = SyntheticGenerator::new(&cfg);
    let logger = SummaryLogger::new(&cfg.summary_dir)
        .with_context(|| format!("opening summary dir {}", cfg.summary_dir.display()))?;
    Ok(Trainer::new(session, model, data, logger, cfg)?)
}

fn train(cfg: TrainConfig) -> Result<()> {
    let mut session = Session::new();
    let mut trainer = build_trainer(&mut session, cfg)?;
    let history = trainer.train()?;
    if let Some(last) = history.last() {
        info!(
            epochs = history.len(),
            train_loss = last.train_loss,
            checkpoint = %last.checkpoint.display(),
            "run complete"
        );
    }
    Ok(())
}

fn test(cfg: TrainConfig) -> Result<()> {
    let mut session = Session::new();
    let trainer = build_trainer(&mut session, cfg)?;
    let counters = *trainer.session().counters();
    let state = trainer.test(counters.current_step());
    println!(
        "epoch {} step {} evaluation state {:?}",
        counters.current_epoch(),
        counters.current_step(),
        state.shape()
    );
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
