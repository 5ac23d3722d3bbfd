//! Training configuration

use std::path::{Path, PathBuf};

use bman_rl_core::{ActionSpace, BmanError, Result};
use bman_rl_env::EnvConfig;
use serde::{Deserialize, Serialize};

/// Learning algorithm family
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Value-based, replay-buffer driven
    Dqn,
    /// On-policy actor-critic
    Ppo,
}

impl Algorithm {
    /// Whether transitions are kept in a replay store
    pub fn uses_replay(&self) -> bool {
        matches!(self, Algorithm::Dqn)
    }

    fn default_num_envs(&self, train: bool) -> usize {
        match self {
            Algorithm::Dqn => 1,
            Algorithm::Ppo if train => 4,
            Algorithm::Ppo => 1,
        }
    }

    fn default_stack_depth(&self) -> usize {
        match self {
            Algorithm::Dqn => 4,
            Algorithm::Ppo => 10,
        }
    }
}

/// Immutable training run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    /// Vectorized steps to train for
    pub iterations: u64,
    /// Vectorized steps to run when evaluating
    pub steps: u64,
    pub algorithm: Algorithm,
    /// Directory holding the model and replay artifacts
    pub checkpoint_dir: PathBuf,
    /// Train (true) or restore and evaluate (false)
    pub train: bool,
    /// Concurrent environment slots; defaults per algorithm
    pub num_envs: Option<usize>,
    /// Frames per stacked observation; defaults per algorithm
    pub stack_depth: Option<usize>,
    /// Checkpoint every N iterations in addition to the final save
    pub checkpoint_every: Option<u64>,
    /// Stop early once any slot's score exceeds this
    pub stop_score: Option<f64>,
    /// Level difficulty
    pub difficulty: u32,
    /// Enable the use-special action
    pub special_action: bool,
    /// Replay store capacity in transitions
    pub replay_capacity: usize,
    /// Step slots in parallel
    pub parallel: bool,
    /// Render the first slot while evaluating
    pub render: bool,
    /// Greedy actions while evaluating
    pub deterministic_eval: bool,
    /// Seed for the learner
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            steps: 1_000,
            algorithm: Algorithm::Dqn,
            checkpoint_dir: PathBuf::from("/tmp/gym"),
            train: false,
            num_envs: None,
            stack_depth: None,
            checkpoint_every: None,
            stop_score: Some(100.0),
            difficulty: 2,
            special_action: false,
            replay_capacity: 100_000,
            parallel: false,
            render: false,
            deterministic_eval: false,
            seed: None,
        }
    }
}

impl TrainConfig {
    /// Load from a JSON file; absent fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BmanError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: TrainConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.num_envs == Some(0) {
            return Err(BmanError::Config("num_envs must be at least 1".into()));
        }
        if self.stack_depth == Some(0) {
            return Err(BmanError::Config("stack_depth must be at least 1".into()));
        }
        if self.checkpoint_every == Some(0) {
            return Err(BmanError::Config("checkpoint_every must be at least 1".into()));
        }
        if self.algorithm.uses_replay() && self.replay_capacity == 0 {
            return Err(BmanError::Config("replay_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Effective number of slots
    pub fn num_envs(&self) -> usize {
        self.num_envs
            .unwrap_or_else(|| self.algorithm.default_num_envs(self.train))
    }

    /// Effective stack depth
    pub fn stack_depth(&self) -> usize {
        self.stack_depth
            .unwrap_or_else(|| self.algorithm.default_stack_depth())
    }

    /// Per-slot environment settings
    pub fn env_config(&self) -> EnvConfig {
        EnvConfig {
            difficulty: self.difficulty,
            actions: if self.special_action {
                ActionSpace::with_special()
            } else {
                ActionSpace::new()
            },
            ..EnvConfig::default()
        }
    }
}
