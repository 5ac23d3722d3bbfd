//! Reward shaping

use serde::{Deserialize, Serialize};

/// Penalty subtracted on the step that kills the agent
pub const TERMINAL_PENALTY: f64 = 5.0;

/// Divisor applied to the squared displacement bonus
pub const DISPLACEMENT_SCALE: f64 = 1000.0;

/// Agent grid position
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Squared euclidean distance to `other`
    pub fn squared_distance(&self, other: &Position) -> i64 {
        let dr = i64::from(self.row) - i64::from(other.row);
        let dc = i64::from(self.col) - i64::from(other.col);
        dr.saturating_mul(dr).saturating_add(dc.saturating_mul(dc))
    }
}

/// Decomposed reward for a single step
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Reward {
    /// Change in the agent's score
    pub score_delta: f64,
    /// Scaled movement bonus
    pub displacement: f64,
    /// Penalty applied when the episode ended
    pub terminal_penalty: f64,
}

impl Reward {
    /// Total scalar reward
    pub fn value(&self) -> f64 {
        self.score_delta + self.displacement - self.terminal_penalty
    }
}

/// Score-delta reward with a small movement bonus and a death penalty
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RewardShaper {
    pub terminal_penalty: f64,
    pub displacement_scale: f64,
}

impl Default for RewardShaper {
    fn default() -> Self {
        Self {
            terminal_penalty: TERMINAL_PENALTY,
            displacement_scale: DISPLACEMENT_SCALE,
        }
    }
}

impl RewardShaper {
    /// Reward for one transition, broken into components
    pub fn compute(
        &self,
        score_before: f64,
        score_after: f64,
        pos_before: Position,
        pos_after: Position,
        done: bool,
    ) -> Reward {
        Reward {
            score_delta: score_after - score_before,
            displacement: pos_before.squared_distance(&pos_after) as f64
                / self.displacement_scale,
            terminal_penalty: if done { self.terminal_penalty } else { 0.0 },
        }
    }

    /// Scalar reward for one transition
    pub fn reward(
        &self,
        score_before: f64,
        score_after: f64,
        pos_before: Position,
        pos_after: Position,
        done: bool,
    ) -> f64 {
        self.compute(score_before, score_after, pos_before, pos_after, done)
            .value()
    }
}
