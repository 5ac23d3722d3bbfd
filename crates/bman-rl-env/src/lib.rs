//! # bman-rl-env
//!
//! Environment runtime for bman-rl.
//!
//! This crate provides:
//! - `GameEngine` and `RenderSurface` traits for plugging in a game engine
//! - `EpisodeController`, the single-environment reset/step state machine
//! - `VecEnv`, N independent slots stepped as one batch with auto-reset
//! - `FrameStack`, per-slot history of the last K observations
//! - `SandboxEngine`, a small deterministic engine for tests and demos

pub mod controller;
pub mod engine;
pub mod frame_stack;
pub mod registry;
pub mod sandbox;
pub mod vec_env;

pub use controller::{EnvConfig, EpisodeController, EpisodeState, RenderMode};
pub use engine::{GameEngine, RenderSurface};
pub use frame_stack::{FrameStack, HistoryBuffer, StackedStep};
pub use registry::{SlotEntry, SlotRegistry};
pub use sandbox::SandboxEngine;
pub use vec_env::{VecEnv, VecStep};
