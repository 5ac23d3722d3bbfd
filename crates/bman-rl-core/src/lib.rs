//! # bman-rl-core
//!
//! Core types for the bman-rl agent/environment interface.
//!
//! This crate provides the data model shared by every bman-rl crate:
//! - Grid maps and the observation encoder
//! - The discrete action space and its decoder
//! - Reward shaping
//! - Step results and per-step diagnostics
//! - The error taxonomy

pub mod action;
pub mod error;
pub mod manifest;
pub mod map;
pub mod observation;
pub mod reward;

pub use action::{Action, ActionSpace, Direction, Intent};
pub use error::{BmanError, Result};
pub use manifest::EnvManifest;
pub use map::{CellKind, GridMapBuilder};
pub use observation::{EpisodeSummary, GridMap, StepInfo, StepResult, encode, flatten, stack_frames};
pub use reward::{Position, Reward, RewardShaper};
