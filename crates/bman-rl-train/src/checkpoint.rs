//! Checkpoint persistence
//!
//! A checkpoint directory holds `model.json` (learnable parameters) and, for
//! replay-based algorithms, `replay_buffer.json`. Each file wraps its payload
//! in an envelope carrying the algorithm, the training iteration and a
//! SHA-256 digest of the payload text exactly as written, which is verified
//! on load before the payload is parsed.

use std::fs;
use std::path::{Path, PathBuf};

use bman_rl_core::{BmanError, Result};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::Algorithm;
use crate::policy::Learner;
use crate::replay::ReplayBuffer;

/// File name of the learnable-parameters artifact
pub const MODEL_ARTIFACT: &str = "model.json";

/// File name of the replay-buffer artifact
pub const REPLAY_ARTIFACT: &str = "replay_buffer.json";

/// Envelope format version
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    algorithm: Algorithm,
    iteration: u64,
    sha256: String,
    payload: Box<RawValue>,
}

/// Saves and restores learner state under one directory
#[derive(Debug, Clone)]
pub struct Checkpointer {
    dir: PathBuf,
    algorithm: Algorithm,
}

impl Checkpointer {
    pub fn new(dir: impl Into<PathBuf>, algorithm: Algorithm) -> Self {
        Self {
            dir: dir.into(),
            algorithm,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_ARTIFACT)
    }

    pub fn replay_path(&self) -> PathBuf {
        self.dir.join(REPLAY_ARTIFACT)
    }

    /// Persist learner parameters and, for replay-based algorithms, the replay store
    pub fn save<L: Learner + ?Sized>(
        &self,
        learner: &L,
        replay: Option<&ReplayBuffer>,
        iteration: u64,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            BmanError::Checkpoint(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        self.write_artifact(&self.model_path(), learner.parameters()?, iteration)?;
        if self.algorithm.uses_replay() {
            if let Some(replay) = replay {
                self.write_artifact(&self.replay_path(), serde_json::to_value(replay)?, iteration)?;
            }
        }
        info!(
            "Checkpoint saved to {} at iteration {}",
            self.dir.display(),
            iteration
        );
        Ok(())
    }

    /// Load learner parameters; returns the iteration they were saved at
    pub fn load_model<L: Learner + ?Sized>(&self, learner: &mut L) -> Result<u64> {
        let (payload, iteration) = self.read_artifact(&self.model_path())?;
        learner.load_parameters(serde_json::from_str(payload.get())?)?;
        Ok(iteration)
    }

    /// Load the replay store
    pub fn load_replay(&self) -> Result<ReplayBuffer> {
        self.load_replay_at().map(|(replay, _)| replay)
    }

    fn load_replay_at(&self) -> Result<(ReplayBuffer, u64)> {
        let (payload, iteration) = self.read_artifact(&self.replay_path())?;
        Ok((serde_json::from_str(payload.get())?, iteration))
    }

    /// Restore a learner and, for replay-based algorithms, its replay store.
    ///
    /// Both artifacts must come from the same save.
    pub fn restore<L: Learner + ?Sized>(
        &self,
        learner: &mut L,
    ) -> Result<(u64, Option<ReplayBuffer>)> {
        let (model, iteration) = self.read_artifact(&self.model_path())?;
        let replay = if self.algorithm.uses_replay() {
            let (replay, replay_iteration) = self.load_replay_at()?;
            if replay_iteration != iteration {
                return Err(BmanError::Checkpoint(format!(
                    "{} is from iteration {} but {} is from iteration {}",
                    self.model_path().display(),
                    iteration,
                    self.replay_path().display(),
                    replay_iteration
                )));
            }
            Some(replay)
        } else {
            None
        };
        learner.load_parameters(serde_json::from_str(model.get())?)?;
        info!(
            "Checkpoint restored from {} (iteration {})",
            self.dir.display(),
            iteration
        );
        Ok((iteration, replay))
    }

    fn write_artifact(&self, path: &Path, payload: serde_json::Value, iteration: u64) -> Result<()> {
        let payload = serde_json::value::to_raw_value(&payload)?;
        let envelope = Envelope {
            format_version: FORMAT_VERSION,
            algorithm: self.algorithm,
            iteration,
            sha256: digest(&payload),
            payload,
        };
        let bytes = serde_json::to_vec(&envelope)?;

        // Write then rename so a crash never leaves a half-written artifact
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)
            .map_err(|e| BmanError::Checkpoint(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, path).map_err(|e| {
            BmanError::Checkpoint(format!("Failed to move {} into place: {}", path.display(), e))
        })?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    fn read_artifact(&self, path: &Path) -> Result<(Box<RawValue>, u64)> {
        let bytes = fs::read(path)
            .map_err(|e| BmanError::Checkpoint(format!("Failed to read {}: {}", path.display(), e)))?;
        let envelope: Envelope = serde_json::from_slice(&bytes)?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(BmanError::Checkpoint(format!(
                "{}: unsupported format version {}",
                path.display(),
                envelope.format_version
            )));
        }
        if envelope.algorithm != self.algorithm {
            return Err(BmanError::Checkpoint(format!(
                "{}: saved by {:?}, expected {:?}",
                path.display(),
                envelope.algorithm,
                self.algorithm
            )));
        }
        let actual = digest(&envelope.payload);
        if actual != envelope.sha256 {
            return Err(BmanError::Checkpoint(format!(
                "{}: digest mismatch (expected {}, got {})",
                path.display(),
                envelope.sha256,
                actual
            )));
        }
        Ok((envelope.payload, envelope.iteration))
    }
}

/// Hex SHA-256 of the payload text as it appears in the file
fn digest(payload: &RawValue) -> String {
    hex::encode(Sha256::digest(payload.get().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::BanditLearner;
    use crate::replay::Transition;
    use ndarray::Array3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn trained_learner() -> BanditLearner {
        let mut learner = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(11));
        let t = Transition {
            observation: Array3::zeros((1, 2, 2)),
            action: 1,
            reward: 2.5,
            next_observation: Array3::from_elem((1, 2, 2), 0.25),
            done: true,
        };
        learner.observe(&[t], None).unwrap();
        learner
    }

    fn replay() -> ReplayBuffer {
        let mut buffer = ReplayBuffer::new(8);
        buffer.push(Transition {
            observation: Array3::from_elem((1, 2, 2), 0.1),
            action: 4,
            reward: -4.999,
            next_observation: Array3::from_elem((1, 2, 2), -0.5),
            done: true,
        });
        buffer
    }

    #[test]
    fn test_save_restore() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpointer::new(dir.path().join("run"), Algorithm::Dqn);
        let learner = trained_learner();
        let buffer = replay();

        ckpt.save(&learner, Some(&buffer), 42).unwrap();
        assert!(ckpt.model_path().exists());
        assert!(ckpt.replay_path().exists());

        let mut fresh = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(0));
        let (iteration, restored) = ckpt.restore(&mut fresh).unwrap();
        assert_eq!(iteration, 42);
        assert_eq!(fresh.values(), learner.values());
        assert_eq!(restored, Some(buffer));
    }

    #[test]
    fn test_ppo_has_no_replay_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpointer::new(dir.path(), Algorithm::Ppo);
        let learner = BanditLearner::new(Algorithm::Ppo, 5, 0.1, Some(0));

        ckpt.save(&learner, Some(&replay()), 1).unwrap();
        assert!(ckpt.model_path().exists());
        assert!(!ckpt.replay_path().exists());

        let mut fresh = BanditLearner::new(Algorithm::Ppo, 5, 0.1, Some(0));
        let (_, restored) = ckpt.restore(&mut fresh).unwrap();
        assert!(restored.is_none());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpointer::new(dir.path(), Algorithm::Dqn);
        ckpt.save(&trained_learner(), Some(&replay()), 7).unwrap();

        let mut envelope: serde_json::Value =
            serde_json::from_slice(&fs::read(ckpt.model_path()).unwrap()).unwrap();
        envelope["payload"]["epsilon"] = serde_json::json!(0.9);
        fs::write(ckpt.model_path(), serde_json::to_vec(&envelope).unwrap()).unwrap();

        let mut fresh = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(0));
        match ckpt.restore(&mut fresh) {
            Err(BmanError::Checkpoint(msg)) => assert!(msg.contains("digest mismatch")),
            other => panic!("Expected digest mismatch, got {:?}", other.map(|r| r.0)),
        }
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        Checkpointer::new(dir.path(), Algorithm::Ppo)
            .save(&BanditLearner::new(Algorithm::Ppo, 5, 0.1, Some(0)), None, 3)
            .unwrap();

        let mut learner = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(0));
        let result = Checkpointer::new(dir.path(), Algorithm::Dqn).load_model(&mut learner);
        assert!(matches!(result, Err(BmanError::Checkpoint(_))));
    }

    #[test]
    fn test_missing_checkpoint_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpointer::new(dir.path().join("absent"), Algorithm::Dqn);
        let mut learner = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(0));
        assert!(matches!(
            ckpt.restore(&mut learner),
            Err(BmanError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_arbitrary_floats_survive_restore() {
        let mut rng = StdRng::seed_from_u64(2024);
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpointer::new(dir.path(), Algorithm::Dqn);

        for round in 0..50 {
            let mut buffer = ReplayBuffer::new(64);
            let mut learner = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(round));
            for _ in 0..64 {
                let t = Transition {
                    observation: Array3::from_shape_fn((2, 3, 3), |_| rng.random_range(-1.0..1.0)),
                    action: rng.random_range(0..5),
                    reward: rng.random_range(-5.0..-4.0),
                    next_observation: Array3::from_shape_fn((2, 3, 3), |_| {
                        rng.random_range(-1.0..1.0)
                    }),
                    done: rng.random(),
                };
                learner.observe(std::slice::from_ref(&t), None).unwrap();
                buffer.push(t);
            }

            ckpt.save(&learner, Some(&buffer), round).unwrap();
            let mut fresh = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(0));
            let (iteration, restored) = ckpt
                .restore(&mut fresh)
                .unwrap_or_else(|e| panic!("round {} failed to restore: {}", round, e));

            assert_eq!(iteration, round);
            assert_eq!(fresh.values(), learner.values());
            assert_eq!(fresh.counts(), learner.counts());
            assert_eq!(restored, Some(buffer));
        }
    }

    #[test]
    fn test_stale_replay_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = Checkpointer::new(dir.path(), Algorithm::Dqn);
        ckpt.save(&trained_learner(), Some(&replay()), 5).unwrap();
        let stale = fs::read(ckpt.replay_path()).unwrap();

        ckpt.save(&trained_learner(), Some(&replay()), 9).unwrap();
        fs::write(ckpt.replay_path(), stale).unwrap();

        let mut fresh = BanditLearner::new(Algorithm::Dqn, 5, 0.1, Some(0));
        match ckpt.restore(&mut fresh) {
            Err(BmanError::Checkpoint(msg)) => {
                assert!(msg.contains("iteration 9"), "{}", msg);
                assert!(msg.contains("iteration 5"), "{}", msg);
            }
            other => panic!("Expected iteration mismatch, got {:?}", other.map(|r| r.0)),
        }
        assert_eq!(fresh.counts().iter().sum::<u64>(), 0);
        assert_eq!(ckpt.load_replay().unwrap().len(), 1);
    }
}
