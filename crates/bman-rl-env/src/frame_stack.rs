//! Temporal frame stacking over a vectorized environment

use std::collections::VecDeque;

use bman_rl_core::{BmanError, EnvManifest, Result, StepInfo, stack_frames};
use ndarray::{Array2, Array3, Array4, Axis};

use crate::controller::RenderMode;
use crate::engine::GameEngine;
use crate::vec_env::VecEnv;

/// Fixed-depth history of the most recent observations, oldest first
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    depth: usize,
    frames: VecDeque<Array2<f32>>,
}

impl HistoryBuffer {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            frames: VecDeque::with_capacity(depth),
        }
    }

    /// Fill the buffer with `depth` copies of `observation`
    pub fn reset(&mut self, observation: &Array2<f32>) {
        self.frames.clear();
        for _ in 0..self.depth {
            self.frames.push_back(observation.clone());
        }
    }

    /// Append `observation`, evicting the oldest frame when full
    pub fn push(&mut self, observation: Array2<f32>) {
        if self.frames.len() == self.depth {
            self.frames.pop_front();
        }
        self.frames.push_back(observation);
    }

    /// Frames stacked along a new leading axis, shape (depth, h, w)
    pub fn stacked(&self) -> Result<Array3<f32>> {
        stack_frames(self.frames.iter())
    }

    /// Stack as if `observation` had been pushed, without modifying the buffer
    pub fn stacked_with(&self, observation: &Array2<f32>) -> Result<Array3<f32>> {
        let skip = usize::from(self.frames.len() == self.depth);
        stack_frames(
            self.frames
                .iter()
                .skip(skip)
                .chain(std::iter::once(observation)),
        )
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Iterate frames oldest first
    pub fn frames(&self) -> impl Iterator<Item = &Array2<f32>> {
        self.frames.iter()
    }
}

/// Batched result of one stacked step
#[derive(Debug, Clone)]
pub struct StackedStep {
    /// Stacked observations, shape (N, K, h, w)
    pub observations: Array4<f32>,
    pub rewards: Vec<f64>,
    pub dones: Vec<bool>,
    pub infos: Vec<StepInfo>,
    /// Stack ending in the terminal frame, for slots that were auto-reset
    pub terminal_observations: Vec<Option<Array3<f32>>>,
}

/// Vectorized environment whose observations are the last K frames per slot
pub struct FrameStack<E: GameEngine> {
    inner: VecEnv<E>,
    histories: Vec<HistoryBuffer>,
}

impl<E: GameEngine> FrameStack<E> {
    pub fn new(inner: VecEnv<E>, depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(BmanError::Config("stack depth must be at least 1".into()));
        }
        let histories = (0..inner.num_envs())
            .map(|_| HistoryBuffer::new(depth))
            .collect();
        Ok(Self { inner, histories })
    }

    /// Reset every slot; returns observations of shape (N, K, h, w)
    pub fn reset_all(&mut self) -> Result<Array4<f32>> {
        let observations = self.inner.reset_all()?;
        for (history, obs) in self.histories.iter_mut().zip(observations.outer_iter()) {
            history.reset(&obs.to_owned());
        }
        self.batch()
    }

    /// Step every slot and return stacked observations
    pub fn step_all(&mut self, actions: &[i64]) -> Result<StackedStep> {
        let step = self.inner.step_all(actions)?;

        let mut terminal_observations = Vec::with_capacity(step.len());
        for (slot, history) in self.histories.iter_mut().enumerate() {
            let obs = step.observations.index_axis(Axis(0), slot).to_owned();
            if step.dones[slot] {
                let terminal = match &step.infos[slot].terminal_observation {
                    Some(frame) => Some(history.stacked_with(frame)?),
                    None => None,
                };
                terminal_observations.push(terminal);
                history.reset(&obs);
            } else {
                terminal_observations.push(None);
                history.push(obs);
            }
        }

        Ok(StackedStep {
            observations: self.batch()?,
            rewards: step.rewards,
            dones: step.dones,
            infos: step.infos,
            terminal_observations,
        })
    }

    fn batch(&self) -> Result<Array4<f32>> {
        let stacks = self
            .histories
            .iter()
            .map(|h| h.stacked())
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<_> = stacks.iter().map(|s| s.view()).collect();
        ndarray::stack(Axis(0), &views).map_err(|_| {
            let shapes: Vec<Vec<usize>> = stacks.iter().map(|s| s.shape().to_vec()).collect();
            let expected = shapes.first().cloned().unwrap_or_default();
            let actual = shapes
                .iter()
                .find(|s| **s != expected)
                .cloned()
                .unwrap_or_default();
            BmanError::ShapeMismatch { expected, actual }
        })
    }

    /// History depth K
    pub fn depth(&self) -> usize {
        self.histories.first().map(|h| h.depth()).unwrap_or(0)
    }

    /// History of one slot
    pub fn history(&self, slot: usize) -> Option<&HistoryBuffer> {
        self.histories.get(slot)
    }

    pub fn num_envs(&self) -> usize {
        self.inner.num_envs()
    }

    pub fn render(&mut self, mode: RenderMode) -> Result<()> {
        self.inner.render(mode)
    }

    pub fn close(&mut self) {
        self.inner.close();
    }

    pub fn manifest(&self) -> EnvManifest {
        self.inner.manifest()
    }

    pub fn inner(&self) -> &VecEnv<E> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::EnvConfig;
    use crate::sandbox::SandboxEngine;

    fn frame(value: f32) -> Array2<f32> {
        Array2::from_elem((2, 2), value)
    }

    fn stacked_env(n: usize, depth: usize) -> FrameStack<SandboxEngine> {
        let config = EnvConfig {
            difficulty: 1,
            ..EnvConfig::default()
        };
        let inner = VecEnv::new(|_| SandboxEngine::new(3, 3), n, config).unwrap();
        FrameStack::new(inner, depth).unwrap()
    }

    #[test]
    fn test_history_reset_fills_depth() {
        let mut history = HistoryBuffer::new(4);
        assert!(history.is_empty());

        history.reset(&frame(0.5));
        assert_eq!(history.len(), 4);
        assert!(history.frames().all(|f| f == &frame(0.5)));
    }

    #[test]
    fn test_history_push_keeps_depth() {
        let mut history = HistoryBuffer::new(3);
        history.reset(&frame(0.0));
        for i in 1..=10 {
            history.push(frame(i as f32));
            assert_eq!(history.len(), 3);
        }

        let stacked = history.stacked().unwrap();
        assert_eq!(stacked.dim(), (3, 2, 2));
        assert_eq!(stacked[[0, 0, 0]], 8.0);
        assert_eq!(stacked[[2, 0, 0]], 10.0);
    }

    #[test]
    fn test_stacked_with_does_not_mutate() {
        let mut history = HistoryBuffer::new(2);
        history.reset(&frame(1.0));
        let stacked = history.stacked_with(&frame(2.0)).unwrap();

        assert_eq!(stacked.dim(), (2, 2, 2));
        assert_eq!(stacked[[0, 0, 0]], 1.0);
        assert_eq!(stacked[[1, 0, 0]], 2.0);
        assert!(history.frames().all(|f| f == &frame(1.0)));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let inner = VecEnv::new(|_| SandboxEngine::new(3, 3), 1, EnvConfig::default()).unwrap();
        assert!(matches!(
            FrameStack::new(inner, 0),
            Err(BmanError::Config(_))
        ));
    }

    #[test]
    fn test_shape_invariant() {
        let mut env = stacked_env(2, 4);
        let obs = env.reset_all().unwrap();
        assert_eq!(obs.dim(), (2, 4, 3, 3));
        for k in 1..4 {
            assert_eq!(
                obs.index_axis(Axis(1), k),
                obs.index_axis(Axis(1), 0),
                "reset should repeat the initial frame"
            );
        }

        for actions in [[3, 3], [3, 0], [1, 1], [1, 1], [4, 2]] {
            let step = env.step_all(&actions).unwrap();
            assert_eq!(step.observations.dim(), (2, 4, 3, 3));
            assert_eq!(env.history(0).unwrap().len(), 4);
            assert_eq!(env.history(1).unwrap().len(), 4);
        }
    }

    #[test]
    fn test_newest_frame_last() {
        let mut env = stacked_env(1, 3);
        let initial = env.reset_all().unwrap();
        let step = env.step_all(&[3]).unwrap();

        let newest = step.observations.slice(ndarray::s![0, 2, .., ..]);
        let oldest = step.observations.slice(ndarray::s![0, 0, .., ..]);
        assert_eq!(newest[[0usize, 1]], 0.25);
        assert_eq!(oldest, initial.slice(ndarray::s![0, 0, .., ..]));
    }

    #[test]
    fn test_auto_reset_refills_history() {
        let mut env = stacked_env(1, 3);
        let initial = env.reset_all().unwrap();

        env.step_all(&[1]).unwrap();
        let step = env.step_all(&[1]).unwrap();
        assert!(step.dones[0]);
        assert_eq!(step.observations, initial);

        let terminal = step.terminal_observations[0].as_ref().unwrap();
        assert_eq!(terminal.dim(), (3, 3, 3));
        assert_eq!(terminal[[2, 2, 0]], 0.25);
        assert_eq!(terminal[[1, 1, 0]], 0.25);
        assert_eq!(terminal[[0, 0, 0]], 0.25);
    }
}
