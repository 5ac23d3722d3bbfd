//! Grid maps, observation encoding and step results

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{BmanError, Result};

/// Lower bound of encoded cell values
pub const CELL_LOW: f32 = -1.0;

/// Upper bound of encoded cell values
pub const CELL_HIGH: f32 = 1.0;

/// Engine map snapshot: row-major cell codes in [-1, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMap {
    pub height: usize,
    pub width: usize,
    pub cells: Vec<f32>,
}

impl GridMap {
    pub fn new(height: usize, width: usize, cells: Vec<f32>) -> Self {
        Self {
            height,
            width,
            cells,
        }
    }

    /// Encoded (height, width) shape
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

/// Reshape an engine map into a (height, width) observation.
///
/// Values are passed through untouched; the engine is responsible for
/// normalizing them. A map whose cell count disagrees with its dimensions
/// is rejected rather than reshaped.
pub fn encode(map: &GridMap) -> Result<Array2<f32>> {
    if map.height == 0 || map.width == 0 || map.cells.len() != map.height * map.width {
        return Err(BmanError::ShapeMismatch {
            expected: vec![map.height, map.width],
            actual: vec![map.cells.len()],
        });
    }
    Array2::from_shape_vec((map.height, map.width), map.cells.clone()).map_err(|_| {
        BmanError::ShapeMismatch {
            expected: vec![map.height, map.width],
            actual: vec![map.cells.len()],
        }
    })
}

/// Flatten an observation back into row-major cell order
pub fn flatten(observation: &Array2<f32>) -> Vec<f32> {
    observation.iter().copied().collect()
}

/// Stats for a finished episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Sum of shaped rewards over the episode
    pub episode_return: f64,
    /// Number of steps in the episode
    pub length: u64,
}

/// Auxiliary diagnostics for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Action index that produced this step
    pub last_action: i64,

    /// Cumulative score of the controlled agent
    pub score: f64,

    /// Steps taken in the current episode
    pub episode_step: u64,

    /// Ordnance the agent can still place
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordnance: Option<u32>,

    /// Observation at the terminal step, set when the slot was auto-reset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_observation: Option<Array2<f32>>,

    /// Set on the step that ends an episode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeSummary>,
}

impl StepInfo {
    pub fn new(last_action: i64, score: f64, episode_step: u64) -> Self {
        Self {
            last_action,
            score,
            episode_step,
            ordnance: None,
            terminal_observation: None,
            episode: None,
        }
    }
}

/// Result of a single environment step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Encoded map after the action
    pub observation: Array2<f32>,

    /// Shaped scalar reward
    pub reward: f64,

    /// Episode ended (player died)
    pub done: bool,

    /// Diagnostics
    pub info: StepInfo,
}

/// Stack 2-D observations along a new leading axis.
///
/// All observations must share one shape.
pub fn stack_frames<'a, I>(frames: I) -> Result<Array3<f32>>
where
    I: IntoIterator<Item = &'a Array2<f32>>,
{
    let views: Vec<_> = frames.into_iter().map(|f| f.view()).collect();
    let first = views.first().ok_or(BmanError::EpisodeNotStarted)?.dim();
    if let Some(bad) = views.iter().find(|v| v.dim() != first) {
        return Err(BmanError::ShapeMismatch {
            expected: vec![first.0, first.1],
            actual: vec![bad.dim().0, bad.dim().1],
        });
    }
    ndarray::stack(ndarray::Axis(0), &views).map_err(|_| BmanError::ShapeMismatch {
        expected: vec![views.len(), first.0, first.1],
        actual: Vec::new(),
    })
}
