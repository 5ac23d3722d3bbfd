//! Action types and the discrete action space

use serde::{Deserialize, Serialize};

use crate::error::{BmanError, Result};

/// Index of the place-ordnance action
pub const PLACE_ORDNANCE_INDEX: i64 = 4;

/// Index of the use-special action, when enabled
pub const USE_SPECIAL_INDEX: i64 = 5;

/// Movement direction on the grid
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions in action-index order
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit (row, col) delta
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}

/// A decoded agent action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Move one cell
    Move(Direction),
    /// Drop ordnance at the current cell
    PlaceOrdnance,
    /// Trigger the held special ability
    UseSpecial,
}

impl Action {
    /// Engine-level intent for this action
    pub fn intent(&self) -> Intent {
        match *self {
            Action::Move(dir) => Intent {
                direction: Some(dir),
                ..Intent::default()
            },
            Action::PlaceOrdnance => Intent {
                place_ordnance: true,
                ..Intent::default()
            },
            Action::UseSpecial => Intent {
                use_special: true,
                ..Intent::default()
            },
        }
    }

    /// Short action name
    pub fn name(&self) -> &'static str {
        match self {
            Action::Move(Direction::Up) => "move_up",
            Action::Move(Direction::Down) => "move_down",
            Action::Move(Direction::Left) => "move_left",
            Action::Move(Direction::Right) => "move_right",
            Action::PlaceOrdnance => "place_ordnance",
            Action::UseSpecial => "use_special",
        }
    }
}

/// Command dispatched to the engine for one agent step
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Intent {
    /// Direction to move, if any
    pub direction: Option<Direction>,
    /// Drop ordnance this step
    pub place_ordnance: bool,
    /// Use the special ability this step
    pub use_special: bool,
}

/// Discrete action space: four moves, place ordnance, and an optional special
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionSpace {
    /// Whether index 5 maps to the use-special action
    #[serde(default)]
    pub special: bool,
}

impl ActionSpace {
    /// Action space without the special action (5 actions)
    pub fn new() -> Self {
        Self { special: false }
    }

    /// Action space with the special action enabled (6 actions)
    pub fn with_special() -> Self {
        Self { special: true }
    }

    /// Number of discrete actions
    pub fn n(&self) -> usize {
        if self.special { 6 } else { 5 }
    }

    /// Whether `index` is a valid action
    pub fn contains(&self, index: i64) -> bool {
        index >= 0 && (index as u64) < self.n() as u64
    }

    /// Decode an action index
    pub fn decode(&self, index: i64) -> Result<Action> {
        match index {
            0..=3 => Ok(Action::Move(Direction::ALL[index as usize])),
            PLACE_ORDNANCE_INDEX => Ok(Action::PlaceOrdnance),
            USE_SPECIAL_INDEX if self.special => Ok(Action::UseSpecial),
            _ => Err(BmanError::InvalidAction {
                action: index,
                n_actions: self.n(),
            }),
        }
    }

    /// Action names in index order
    pub fn names(&self) -> Vec<String> {
        (0..self.n() as i64)
            .filter_map(|i| self.decode(i).ok())
            .map(|a| a.name().to_string())
            .collect()
    }
}
