//! Single-environment episode controller

use std::fmt;
use std::str::FromStr;

use bman_rl_core::{
    ActionSpace, BmanError, EnvManifest, Result, RewardShaper, StepInfo, StepResult, encode,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{GameEngine, RenderSurface};

/// Agent index the controller drives
pub const PLAYER_ID: usize = 0;

/// Name reported in the environment manifest
pub const ENV_NAME: &str = "bman-grid";

/// Lifecycle of one environment slot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeState {
    Uninitialized,
    Running,
    Done,
}

/// Render target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Visible display surface
    Human,
    /// Text to the console
    Console,
    /// Pixel array
    RgbArray,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderMode::Human => "human",
            RenderMode::Console => "console",
            RenderMode::RgbArray => "rgb_array",
        };
        f.write_str(name)
    }
}

impl FromStr for RenderMode {
    type Err = BmanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "human" => Ok(RenderMode::Human),
            "console" => Ok(RenderMode::Console),
            "rgb_array" => Ok(RenderMode::RgbArray),
            other => Err(BmanError::UnsupportedRenderMode(other.to_string())),
        }
    }
}

/// Per-environment settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvConfig {
    /// Level difficulty passed to the engine
    pub difficulty: u32,
    /// Discrete action layout
    pub actions: ActionSpace,
    /// Reward shaping constants
    pub reward: RewardShaper,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            actions: ActionSpace::new(),
            reward: RewardShaper::default(),
        }
    }
}

/// Drives one engine through reset/step episodes
pub struct EpisodeController<E: GameEngine> {
    engine: E,
    config: EnvConfig,
    state: EpisodeState,
    step_count: u64,
    surface: Option<E::Surface>,
}

impl<E: GameEngine> EpisodeController<E> {
    /// Wrap an engine and build its first level
    pub fn new(mut engine: E, config: EnvConfig) -> Self {
        engine.new_level(config.difficulty);
        Self {
            engine,
            config,
            state: EpisodeState::Uninitialized,
            step_count: 0,
            surface: None,
        }
    }

    /// Start a fresh episode and return its first observation
    pub fn reset(&mut self) -> Result<Array2<f32>> {
        self.engine.reset();
        self.step_count = 0;
        self.state = EpisodeState::Running;
        debug!("Episode reset");
        encode(&self.engine.get_map())
    }

    /// Apply one action
    pub fn step(&mut self, action: i64) -> Result<StepResult> {
        match self.state {
            EpisodeState::Uninitialized => return Err(BmanError::EpisodeNotStarted),
            EpisodeState::Done => return Err(BmanError::EpisodeTerminated),
            EpisodeState::Running => {}
        }
        let decoded = self.config.actions.decode(action)?;

        let score_before = self.engine.get_score(PLAYER_ID);
        let pos_before = self.engine.pos();
        self.engine.move_agent(decoded.intent());
        let score_after = self.engine.get_score(PLAYER_ID);
        let pos_after = self.engine.pos();

        // The engine has already advanced; a map it cannot encode ends the episode
        let observation = match encode(&self.engine.get_map()) {
            Ok(observation) => observation,
            Err(e) => {
                self.state = EpisodeState::Done;
                warn!("Episode aborted after {} steps: {}", self.step_count, e);
                return Err(e);
            }
        };
        self.step_count += 1;
        let done = self.engine.player_is_dead();
        let reward = self
            .config
            .reward
            .reward(score_before, score_after, pos_before, pos_after, done);

        if done {
            self.state = EpisodeState::Done;
            debug!(
                "Episode done after {} steps, score {}",
                self.step_count, score_after
            );
        }

        let mut info = StepInfo::new(action, score_after, self.step_count);
        info.ordnance = self.engine.ordnance_available();

        Ok(StepResult {
            observation,
            reward,
            done,
            info,
        })
    }

    /// Draw the current state; only human mode is supported
    pub fn render(&mut self, mode: RenderMode) -> Result<()> {
        if mode != RenderMode::Human {
            return Err(BmanError::UnsupportedRenderMode(mode.to_string()));
        }
        if self.surface.is_none() {
            info!("Opening display surface");
            self.surface = Some(self.engine.open_surface()?);
        }
        match self.surface.as_mut() {
            Some(surface) => surface.draw(&self.engine),
            None => Ok(()),
        }
    }

    /// Release the display surface, if one was opened
    pub fn close(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.close();
            debug!("Display surface closed");
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EpisodeState {
        self.state
    }

    /// Steps taken in the current episode
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Whether a display surface is open
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.config.actions
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Observation and action spaces for this environment
    pub fn manifest(&self) -> EnvManifest {
        EnvManifest::new(ENV_NAME, self.engine.get_map().shape(), &self.config.actions)
    }
}

impl<E: GameEngine> Drop for EpisodeController<E> {
    fn drop(&mut self) {
        self.close();
    }
}
