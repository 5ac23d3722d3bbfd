//! Vectorized environments with auto-reset
//!
//! Owns N independent episode controllers and steps them as one batch.
//! A slot whose episode ends is reset immediately: the batch carries the
//! fresh observation while still reporting `done` and the terminal reward,
//! and the terminal observation moves into that slot's info.
//!
//! Slots share no state, so stepping can optionally fan out over rayon's
//! thread pool. Results are always returned in slot order.

use bman_rl_core::{
    ActionSpace, BmanError, EnvManifest, Result, StepInfo, StepResult, stack_frames,
};
use ndarray::{Array2, Array3};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::controller::{EnvConfig, EpisodeController, RenderMode};
use crate::engine::GameEngine;
use crate::registry::SlotRegistry;

/// Batched result of one vectorized step
#[derive(Debug, Clone)]
pub struct VecStep {
    /// Observations, shape (N, h, w)
    pub observations: Array3<f32>,
    pub rewards: Vec<f64>,
    pub dones: Vec<bool>,
    pub infos: Vec<StepInfo>,
}

impl VecStep {
    /// Number of slots in the batch
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// A pool of environment slots stepped together
pub struct VecEnv<E: GameEngine> {
    envs: Vec<EpisodeController<E>>,
    registry: SlotRegistry,
    actions: ActionSpace,
    parallel: bool,
}

impl<E: GameEngine> VecEnv<E> {
    /// Create `num_envs` slots, building each engine with `env_fn(slot)`
    pub fn new<F>(mut env_fn: F, num_envs: usize, config: EnvConfig) -> Result<Self>
    where
        F: FnMut(usize) -> E,
    {
        if num_envs == 0 {
            return Err(BmanError::Config("need at least one environment".into()));
        }
        let envs = (0..num_envs)
            .map(|slot| EpisodeController::new(env_fn(slot), config))
            .collect();
        info!("Created {} environment slots", num_envs);

        Ok(Self {
            envs,
            registry: SlotRegistry::new(num_envs),
            actions: config.actions,
            parallel: false,
        })
    }

    /// Step slots on rayon's thread pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reset every slot; returns observations of shape (N, h, w)
    pub fn reset_all(&mut self) -> Result<Array3<f32>> {
        let observations = self
            .envs
            .iter_mut()
            .map(|env| env.reset())
            .collect::<Result<Vec<_>>>()?;
        for slot in 0..self.envs.len() {
            self.registry.restart(slot);
        }
        stack_frames(&observations)
    }

    /// Step slot `i` with `actions[i]`, auto-resetting finished slots
    pub fn step_all(&mut self, actions: &[i64]) -> Result<VecStep> {
        if actions.len() != self.envs.len() {
            return Err(BmanError::ActionCountMismatch {
                expected: self.envs.len(),
                actual: actions.len(),
            });
        }
        // Validate up front so a bad index leaves every slot untouched
        if let Some(&bad) = actions.iter().find(|&&a| !self.actions.contains(a)) {
            return Err(BmanError::InvalidAction {
                action: bad,
                n_actions: self.actions.n(),
            });
        }

        let results: Vec<StepResult> = if self.parallel {
            self.envs
                .par_iter_mut()
                .zip(actions.par_iter())
                .map(|(env, &action)| step_slot(env, action))
                .collect::<Result<Vec<_>>>()?
        } else {
            self.envs
                .iter_mut()
                .zip(actions.iter())
                .map(|(env, &action)| step_slot(env, action))
                .collect::<Result<Vec<_>>>()?
        };

        let n = results.len();
        let mut frames = Vec::with_capacity(n);
        let mut rewards = Vec::with_capacity(n);
        let mut dones = Vec::with_capacity(n);
        let mut infos = Vec::with_capacity(n);

        for (slot, mut result) in results.into_iter().enumerate() {
            self.registry.record_step(slot, result.reward);
            if result.done {
                result.info.episode = self.registry.finish_episode(slot);
                debug!(
                    "Slot {} finished episode (score {}), auto-reset",
                    slot, result.info.score
                );
            }
            frames.push(result.observation);
            rewards.push(result.reward);
            dones.push(result.done);
            infos.push(result.info);
        }

        Ok(VecStep {
            observations: stack_frames(&frames)?,
            rewards,
            dones,
            infos,
        })
    }

    /// Render the first slot
    pub fn render(&mut self, mode: RenderMode) -> Result<()> {
        match self.envs.first_mut() {
            Some(env) => env.render(mode),
            None => Ok(()),
        }
    }

    /// Release rendering resources of every slot
    pub fn close(&mut self) {
        for env in &mut self.envs {
            env.close();
        }
    }

    /// Number of slots
    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.actions
    }

    /// Manifest of the first slot; all slots share one layout
    pub fn manifest(&self) -> EnvManifest {
        self.envs[0].manifest()
    }

    /// Per-slot episode stats
    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    /// Get a slot's controller
    pub fn env(&self, slot: usize) -> Option<&EpisodeController<E>> {
        self.envs.get(slot)
    }
}

/// Step one slot and reset it in place if its episode ended
fn step_slot<E: GameEngine>(env: &mut EpisodeController<E>, action: i64) -> Result<StepResult> {
    let mut result = env.step(action)?;
    if result.done {
        let fresh: Array2<f32> = env.reset()?;
        let terminal = std::mem::replace(&mut result.observation, fresh);
        result.info.terminal_observation = Some(terminal);
    }
    Ok(result)
}
