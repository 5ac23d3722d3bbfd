//! Policy and learner seams, plus a small bandit learner for demos

use bman_rl_core::{BmanError, Result};
use ndarray::{Array4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::Algorithm;
use crate::replay::{ReplayBuffer, Transition};

/// Chooses one action per slot
pub trait Policy {
    /// Actions for a batch of stacked observations, shape (N, K, h, w)
    fn act(&mut self, observations: &Array4<f32>, deterministic: bool) -> Result<Vec<i64>>;
}

/// A policy that learns from transitions and can be checkpointed
pub trait Learner: Policy {
    /// Algorithm family this learner implements
    fn algorithm(&self) -> Algorithm;

    /// Learn from one vectorized step. `replay` is set for replay-based algorithms.
    fn observe(&mut self, transitions: &[Transition], replay: Option<&ReplayBuffer>) -> Result<()>;

    /// Learnable state to persist
    fn parameters(&self) -> Result<serde_json::Value>;

    /// Restore learnable state saved by `parameters`
    fn load_parameters(&mut self, parameters: serde_json::Value) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BanditParams {
    values: Vec<f64>,
    counts: Vec<u64>,
    epsilon: f64,
}

/// Epsilon-greedy learner over per-action mean rewards.
///
/// Ignores the observation entirely; it exists to drive the training loop
/// end to end without a neural network.
pub struct BanditLearner {
    algorithm: Algorithm,
    params: BanditParams,
    rng: StdRng,
}

impl BanditLearner {
    pub fn new(algorithm: Algorithm, n_actions: usize, epsilon: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            algorithm,
            params: BanditParams {
                values: vec![0.0; n_actions],
                counts: vec![0; n_actions],
                epsilon,
            },
            rng,
        }
    }

    /// Estimated mean reward per action
    pub fn values(&self) -> &[f64] {
        &self.params.values
    }

    /// Times each action was learned from
    pub fn counts(&self) -> &[u64] {
        &self.params.counts
    }

    fn greedy(&self) -> i64 {
        let mut best = 0;
        for (i, v) in self.params.values.iter().enumerate() {
            if *v > self.params.values[best] {
                best = i;
            }
        }
        best as i64
    }
}

impl Policy for BanditLearner {
    fn act(&mut self, observations: &Array4<f32>, deterministic: bool) -> Result<Vec<i64>> {
        let n_actions = self.params.values.len();
        let slots = observations.len_of(Axis(0));
        let mut actions = Vec::with_capacity(slots);
        for _ in 0..slots {
            let explore = !deterministic && self.rng.random::<f64>() < self.params.epsilon;
            let action = if explore {
                self.rng.random_range(0..n_actions) as i64
            } else {
                self.greedy()
            };
            actions.push(action);
        }
        Ok(actions)
    }
}

impl Learner for BanditLearner {
    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    fn observe(&mut self, transitions: &[Transition], _replay: Option<&ReplayBuffer>) -> Result<()> {
        let n_actions = self.params.values.len();
        for t in transitions {
            if t.action < 0 || t.action as usize >= n_actions {
                return Err(BmanError::InvalidAction {
                    action: t.action,
                    n_actions,
                });
            }
            let a = t.action as usize;
            self.params.counts[a] += 1;
            self.params.values[a] += (t.reward - self.params.values[a]) / self.params.counts[a] as f64;
        }
        Ok(())
    }

    fn parameters(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.params)?)
    }

    fn load_parameters(&mut self, parameters: serde_json::Value) -> Result<()> {
        let params: BanditParams = serde_json::from_value(parameters)?;
        if params.values.len() != self.params.values.len() {
            return Err(BmanError::Checkpoint(format!(
                "Checkpoint has {} actions, learner has {}",
                params.values.len(),
                self.params.values.len()
            )));
        }
        self.params = params;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn transition(action: i64, reward: f64) -> Transition {
        Transition {
            observation: Array3::zeros((1, 1, 1)),
            action,
            reward,
            next_observation: Array3::zeros((1, 1, 1)),
            done: false,
        }
    }

    #[test]
    fn test_learns_best_action() {
        let mut learner = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(7));
        learner
            .observe(
                &[transition(0, 0.0), transition(3, 1.0), transition(3, 0.5)],
                None,
            )
            .unwrap();

        assert_eq!(learner.counts()[3], 2);
        assert!((learner.values()[3] - 0.75).abs() < 1e-12);

        let obs = Array4::zeros((3, 4, 2, 2));
        let actions = learner.act(&obs, true).unwrap();
        assert_eq!(actions, vec![3, 3, 3]);
    }

    #[test]
    fn test_exploration_stays_in_range() {
        let mut learner = BanditLearner::new(Algorithm::Ppo, 6, 1.0, Some(1));
        let obs = Array4::zeros((64, 1, 1, 1));
        let actions = learner.act(&obs, false).unwrap();
        assert_eq!(actions.len(), 64);
        assert!(actions.iter().all(|&a| (0..6).contains(&a)));
    }

    #[test]
    fn test_rejects_out_of_range_transition() {
        let mut learner = BanditLearner::new(Algorithm::Dqn, 5, 0.0, Some(0));
        assert!(matches!(
            learner.observe(&[transition(5, 1.0)], None),
            Err(BmanError::InvalidAction { .. })
        ));
    }

    #[test]
    fn test_parameters_roundtrip() {
        let mut learner = BanditLearner::new(Algorithm::Dqn, 5, 0.2, Some(3));
        learner.observe(&[transition(2, 4.0)], None).unwrap();
        let saved = learner.parameters().unwrap();

        let mut fresh = BanditLearner::new(Algorithm::Dqn, 5, 0.2, Some(4));
        fresh.load_parameters(saved).unwrap();
        assert_eq!(fresh.values(), learner.values());
        assert_eq!(fresh.counts(), learner.counts());

        let mut wrong = BanditLearner::new(Algorithm::Dqn, 6, 0.2, None);
        assert!(matches!(
            wrong.load_parameters(learner.parameters().unwrap()),
            Err(BmanError::Checkpoint(_))
        ));
    }
}
