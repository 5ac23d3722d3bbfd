//! bman-train
//!
//! Trains (or restores) a learner on sandbox grid levels, then evaluates it.
//!
//! Usage: `bman-train [config.json]`. Without a config file the defaults
//! apply: restore from `/tmp/gym` and evaluate for 1000 steps.

use anyhow::{Context, Result};
use bman_rl_env::SandboxEngine;
use bman_rl_train::{BanditLearner, NeverStop, ScoreThreshold, StopPredicate, TrainConfig, Trainer};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Level size of the sandbox game, in cells
const LEVEL_HEIGHT: usize = 13;
const LEVEL_WIDTH: usize = 17;

/// Exploration rate of the demo learner
const EPSILON: f64 = 0.1;

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match std::env::args().nth(1) {
        Some(path) => TrainConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => TrainConfig::default(),
    };
    info!(
        "bman-train starting: {:?}, train={}, checkpoint_dir={}",
        config.algorithm,
        config.train,
        config.checkpoint_dir.display()
    );

    let n_actions = config.env_config().actions.n();
    let learner = BanditLearner::new(config.algorithm, n_actions, EPSILON, config.seed);
    let mut trainer = Trainer::new(
        &config,
        |_| SandboxEngine::new(LEVEL_HEIGHT, LEVEL_WIDTH),
        learner,
    )?;

    let stop: Box<dyn StopPredicate> = match config.stop_score {
        Some(threshold) => Box::new(ScoreThreshold::new(threshold)),
        None => Box::new(NeverStop),
    };
    let report = trainer.run(stop.as_ref())?;

    if let Some(train) = &report.train {
        info!(
            "Trained {} iterations ({} episodes, best score {:.2}{})",
            train.iterations,
            train.episodes,
            train.best_score,
            if train.stopped_early { ", stopped early" } else { "" }
        );
    }
    if let Some(iteration) = report.restored_iteration {
        info!("Evaluated checkpoint from iteration {}", iteration);
    }
    println!("{}", serde_json::to_string_pretty(&report.eval)?);

    Ok(())
}
