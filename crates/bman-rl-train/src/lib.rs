//! # bman-rl-train
//!
//! Training orchestration for bman-rl.
//!
//! This crate provides:
//! - `TrainConfig`, the immutable run configuration loaded from JSON
//! - `Policy` and `Learner` traits plus `BanditLearner` for demos
//! - `ReplayBuffer` for replay-based algorithms
//! - `Checkpointer`, digest-verified persistence of learner state
//! - `StopPredicate` early-stop monitors
//! - `Trainer`, which drives the train/restore/evaluate loop

pub mod checkpoint;
pub mod config;
pub mod monitor;
pub mod orchestrator;
pub mod policy;
pub mod replay;

pub use checkpoint::{Checkpointer, MODEL_ARTIFACT, REPLAY_ARTIFACT};
pub use config::{Algorithm, TrainConfig};
pub use monitor::{NeverStop, ScoreThreshold, StopPredicate};
pub use orchestrator::{EvalReport, RunReport, TrainReport, Trainer};
pub use policy::{BanditLearner, Learner, Policy};
pub use replay::{ReplayBuffer, Transition};
