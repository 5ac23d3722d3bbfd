//! Training orchestrator
//!
//! Drives the loop: stacked batch, policy actions, vectorized step, replay
//! store (replay-based algorithms only), learner update, periodic checkpoint
//! and the cooperative stop check.

use bman_rl_core::{BmanError, Result};
use bman_rl_env::{FrameStack, GameEngine, RenderMode, StackedStep, VecEnv};
use ndarray::{Array4, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checkpoint::Checkpointer;
use crate::config::TrainConfig;
use crate::monitor::StopPredicate;
use crate::policy::Learner;
use crate::replay::{ReplayBuffer, Transition};

/// Iterations between progress log lines
const LOG_EVERY: u64 = 1_000;

/// Outcome of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    /// Vectorized steps actually taken
    pub iterations: u64,
    /// Episodes finished across all slots
    pub episodes: u64,
    pub total_reward: f64,
    /// Highest cumulative score any slot reached
    pub best_score: f64,
    /// Checkpoints written, including the final one
    pub checkpoints: u32,
    pub stopped_early: bool,
}

/// Outcome of an evaluation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub steps: u64,
    pub episodes: u64,
    pub total_reward: f64,
    pub best_score: f64,
}

/// Outcome of `Trainer::run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Set when the run trained
    pub train: Option<TrainReport>,
    /// Iteration of the restored checkpoint when the run did not train
    pub restored_iteration: Option<u64>,
    pub eval: EvalReport,
}

#[derive(Debug, Default)]
struct Tally {
    episodes: u64,
    total_reward: f64,
    best_score: f64,
}

impl Tally {
    fn record(&mut self, step: &StackedStep) {
        self.total_reward += step.rewards.iter().sum::<f64>();
        self.episodes += step.dones.iter().filter(|d| **d).count() as u64;
        for info in &step.infos {
            if info.score > self.best_score {
                self.best_score = info.score;
            }
        }
    }
}

/// Owns the stacked environments, the learner and its replay store
pub struct Trainer<'a, E: GameEngine, L: Learner> {
    config: &'a TrainConfig,
    env: FrameStack<E>,
    learner: L,
    replay: Option<ReplayBuffer>,
    checkpointer: Checkpointer,
}

impl<'a, E: GameEngine, L: Learner> Trainer<'a, E, L> {
    /// Build `config.num_envs()` slots with `env_fn(slot)` and wrap them in a frame stack
    pub fn new<F>(config: &'a TrainConfig, env_fn: F, learner: L) -> Result<Self>
    where
        F: FnMut(usize) -> E,
    {
        config.validate()?;
        if learner.algorithm() != config.algorithm {
            return Err(BmanError::Config(format!(
                "learner implements {:?} but the run is configured for {:?}",
                learner.algorithm(),
                config.algorithm
            )));
        }

        let vec_env = VecEnv::new(env_fn, config.num_envs(), config.env_config())?
            .with_parallel(config.parallel);
        let env = FrameStack::new(vec_env, config.stack_depth())?;
        let replay = config
            .algorithm
            .uses_replay()
            .then(|| ReplayBuffer::new(config.replay_capacity));

        info!(
            "Trainer ready: {:?}, {} slots, stack depth {}, checkpoints in {}",
            config.algorithm,
            env.num_envs(),
            env.depth(),
            config.checkpoint_dir.display()
        );

        Ok(Self {
            config,
            env,
            learner,
            replay,
            checkpointer: Checkpointer::new(&config.checkpoint_dir, config.algorithm),
        })
    }

    /// Train for up to `iterations` vectorized steps
    pub fn train(&mut self, stop: &dyn StopPredicate) -> Result<TrainReport> {
        let mut observations = self.env.reset_all()?;
        let mut tally = Tally::default();
        let mut report = TrainReport::default();
        let mut last_saved = None;

        info!("Training for up to {} iterations", self.config.iterations);

        for iteration in 1..=self.config.iterations {
            let actions = self.learner.act(&observations, false)?;
            let step = self.env.step_all(&actions)?;

            let transitions = transitions(&observations, &actions, &step);
            if let Some(replay) = self.replay.as_mut() {
                replay.extend(transitions.iter().cloned());
            }
            self.learner.observe(&transitions, self.replay.as_ref())?;

            tally.record(&step);
            report.iterations = iteration;

            if self
                .config
                .checkpoint_every
                .is_some_and(|every| iteration % every == 0)
            {
                self.save(iteration)?;
                report.checkpoints += 1;
                last_saved = Some(iteration);
            }

            if iteration % LOG_EVERY == 0 {
                info!(
                    "Iteration {}/{}: {} episodes, best score {:.2}",
                    iteration, self.config.iterations, tally.episodes, tally.best_score
                );
            }

            let stop_now = stop.should_stop(&step.infos);
            observations = step.observations;
            if stop_now {
                info!("Stop requested at iteration {}", iteration);
                report.stopped_early = true;
                break;
            }
        }

        if last_saved != Some(report.iterations) {
            self.save(report.iterations)?;
            report.checkpoints += 1;
        }

        report.episodes = tally.episodes;
        report.total_reward = tally.total_reward;
        report.best_score = tally.best_score;
        info!(
            "Training finished after {} iterations ({} episodes, best score {:.2})",
            report.iterations, report.episodes, report.best_score
        );
        Ok(report)
    }

    /// Load learner state (and the replay store, if used) from the checkpoint directory
    pub fn restore(&mut self) -> Result<u64> {
        let (iteration, replay) = self.checkpointer.restore(&mut self.learner)?;
        if replay.is_some() {
            self.replay = replay;
        }
        Ok(iteration)
    }

    /// Run the current policy for `steps` vectorized steps without learning
    pub fn evaluate(&mut self, steps: u64) -> Result<EvalReport> {
        let mut observations = self.env.reset_all()?;
        let mut tally = Tally::default();

        for _ in 0..steps {
            if self.config.render {
                self.env.render(RenderMode::Human)?;
            }
            let actions = self
                .learner
                .act(&observations, self.config.deterministic_eval)?;
            let step = self.env.step_all(&actions)?;
            tally.record(&step);
            observations = step.observations;
        }

        if self.config.render {
            self.env.close();
        }

        let report = EvalReport {
            steps,
            episodes: tally.episodes,
            total_reward: tally.total_reward,
            best_score: tally.best_score,
        };
        info!(
            "Evaluation: {} steps, {} episodes, total reward {:.3}, best score {:.2}",
            report.steps, report.episodes, report.total_reward, report.best_score
        );
        Ok(report)
    }

    /// Train (or restore when not training), then evaluate for `steps`
    pub fn run(&mut self, stop: &dyn StopPredicate) -> Result<RunReport> {
        let (train, restored_iteration) = if self.config.train {
            (Some(self.train(stop)?), None)
        } else {
            (None, Some(self.restore()?))
        };
        let eval = self.evaluate(self.config.steps)?;
        Ok(RunReport {
            train,
            restored_iteration,
            eval,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        self.config
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn replay(&self) -> Option<&ReplayBuffer> {
        self.replay.as_ref()
    }

    pub fn env(&self) -> &FrameStack<E> {
        &self.env
    }

    pub fn checkpointer(&self) -> &Checkpointer {
        &self.checkpointer
    }

    fn save(&self, iteration: u64) -> Result<()> {
        self.checkpointer
            .save(&self.learner, self.replay.as_ref(), iteration)
            .inspect_err(|e| warn!("Checkpoint at iteration {} failed: {}", iteration, e))
    }
}

/// Pair each slot's pre-step stack with its action and outcome
fn transitions(observations: &Array4<f32>, actions: &[i64], step: &StackedStep) -> Vec<Transition> {
    actions
        .iter()
        .enumerate()
        .map(|(slot, &action)| {
            let next_observation = match &step.terminal_observations[slot] {
                Some(terminal) => terminal.clone(),
                None => {
                    if step.dones[slot] {
                        debug!("Slot {} finished without a terminal stack", slot);
                    }
                    step.observations.index_axis(Axis(0), slot).to_owned()
                }
            };
            Transition {
                observation: observations.index_axis(Axis(0), slot).to_owned(),
                action,
                reward: step.rewards[slot],
                next_observation,
                done: step.dones[slot],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;
    use crate::monitor::NeverStop;
    use crate::policy::{BanditLearner, Policy};
    use bman_rl_core::{CellKind, StepInfo};
    use bman_rl_env::SandboxEngine;
    use std::cell::Cell;
    use std::path::Path;

    fn config(dir: &Path, algorithm: Algorithm) -> TrainConfig {
        TrainConfig {
            iterations: 20,
            steps: 5,
            algorithm,
            checkpoint_dir: dir.to_path_buf(),
            train: true,
            num_envs: Some(2),
            stack_depth: Some(2),
            stop_score: None,
            difficulty: 1,
            seed: Some(1),
            ..TrainConfig::default()
        }
    }

    fn trainer(config: &TrainConfig, seed: u64) -> Trainer<'_, SandboxEngine, BanditLearner> {
        let learner = BanditLearner::new(config.algorithm, 5, 0.3, Some(seed));
        Trainer::new(config, |_| SandboxEngine::new(3, 3), learner).unwrap()
    }

    #[test]
    fn test_train_fills_replay_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), Algorithm::Dqn);
        let mut trainer = trainer(&config, 1);

        let report = trainer.train(&NeverStop).unwrap();
        assert_eq!(report.iterations, 20);
        assert_eq!(report.checkpoints, 1);
        assert!(!report.stopped_early);
        assert_eq!(trainer.replay().unwrap().len(), 40);
        assert_eq!(trainer.learner().counts().iter().sum::<u64>(), 40);
        assert!(trainer.checkpointer().model_path().exists());
        assert!(trainer.checkpointer().replay_path().exists());
    }

    #[test]
    fn test_periodic_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), Algorithm::Ppo);
        config.checkpoint_every = Some(5);
        config.iterations = 12;
        let report = trainer(&config, 2).train(&NeverStop).unwrap();
        assert_eq!(report.checkpoints, 3);

        config.iterations = 10;
        let report = trainer(&config, 2).train(&NeverStop).unwrap();
        assert_eq!(report.checkpoints, 2);
    }

    #[test]
    fn test_stop_predicate_ends_early() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), Algorithm::Ppo);
        let mut trainer = trainer(&config, 3);

        let calls = Cell::new(0);
        let stop = |_: &[StepInfo]| {
            calls.set(calls.get() + 1);
            calls.get() >= 3
        };
        let report = trainer.train(&stop).unwrap();
        assert_eq!(report.iterations, 3);
        assert!(report.stopped_early);
        assert_eq!(report.checkpoints, 1);
        assert!(trainer.replay().is_none());
    }

    #[test]
    fn test_transitions_chain_within_episode() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), Algorithm::Dqn);
        config.num_envs = Some(1);
        config.iterations = 30;
        let mut trainer = trainer(&config, 4);
        trainer.train(&NeverStop).unwrap();

        let replay = trainer.replay().unwrap();
        for i in 0..replay.len() - 1 {
            let (t, next) = (replay.get(i).unwrap(), replay.get(i + 1).unwrap());
            assert_eq!(t.observation.shape(), &[2, 3, 3]);
            if t.done {
                assert_ne!(t.next_observation, next.observation, "reset stack leaked into a done transition");
            } else {
                assert_eq!(t.next_observation, next.observation);
            }
        }
    }

    /// Always walks down, straight into the 3x3 hazard two rows below
    struct WalkDown;

    impl Policy for WalkDown {
        fn act(&mut self, observations: &Array4<f32>, _deterministic: bool) -> Result<Vec<i64>> {
            Ok(vec![1; observations.shape()[0]])
        }
    }

    impl Learner for WalkDown {
        fn algorithm(&self) -> Algorithm {
            Algorithm::Dqn
        }
        fn observe(&mut self, _transitions: &[Transition], _replay: Option<&ReplayBuffer>) -> Result<()> {
            Ok(())
        }
        fn parameters(&self) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        fn load_parameters(&mut self, _parameters: serde_json::Value) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_done_transition_keeps_terminal_stack() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), Algorithm::Dqn);
        config.num_envs = Some(1);
        config.iterations = 6;
        let mut trainer = Trainer::new(&config, |_| SandboxEngine::new(3, 3), WalkDown).unwrap();
        trainer.train(&NeverStop).unwrap();

        let replay = trainer.replay().unwrap();
        assert_eq!(replay.len(), 6);
        let mut dones = 0;
        for i in 0..replay.len() - 1 {
            let (t, next) = (replay.get(i).unwrap(), replay.get(i + 1).unwrap());
            if !t.done {
                assert_eq!(t.next_observation, next.observation);
                continue;
            }
            dones += 1;
            // Terminal stack: shifted by one frame, agent standing on the hazard
            assert_eq!(
                t.next_observation.index_axis(Axis(0), 0),
                t.observation.index_axis(Axis(0), 1)
            );
            assert_eq!(t.next_observation[[1, 2, 0]], CellKind::Player.value());
            assert_ne!(t.next_observation, next.observation);
            assert_eq!(next.observation[[1, 2, 0]], CellKind::Explosion.value());
        }
        assert_eq!(dones, 2);
    }

    #[test]
    fn test_algorithm_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), Algorithm::Dqn);
        let learner = BanditLearner::new(Algorithm::Ppo, 5, 0.1, Some(0));
        let result = Trainer::new(&config, |_| SandboxEngine::new(3, 3), learner);
        assert!(matches!(result, Err(BmanError::Config(_))));
    }

    #[test]
    fn test_run_restores_then_evaluates() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), Algorithm::Dqn);
        let mut first = trainer(&config, 5);
        let run = first.run(&NeverStop).unwrap();
        assert_eq!(run.train.as_ref().unwrap().iterations, 20);
        assert_eq!(run.eval.steps, 5);

        let eval_config = TrainConfig {
            train: false,
            deterministic_eval: true,
            ..config.clone()
        };
        let mut second = trainer(&eval_config, 6);
        let run = second.run(&NeverStop).unwrap();
        assert_eq!(run.restored_iteration, Some(20));
        assert!(run.train.is_none());
        assert_eq!(second.learner().values(), first.learner().values());
        assert_eq!(second.replay().unwrap().len(), 40);
    }

    #[test]
    fn test_run_without_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            train: false,
            ..config(&dir.path().join("missing"), Algorithm::Dqn)
        };
        let result = trainer(&config, 7).run(&NeverStop);
        assert!(matches!(result, Err(BmanError::Checkpoint(_))));
    }
}
