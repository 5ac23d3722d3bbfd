//! Environment manifest types

use serde::{Deserialize, Serialize};

use crate::action::ActionSpace;
use crate::observation::{CELL_HIGH, CELL_LOW};

/// Observation and action spaces exposed to a learner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvManifest {
    /// Environment name
    pub name: String,
    /// Crate version
    pub version: String,
    /// Per-frame observation shape (height, width)
    pub observation_shape: [usize; 2],
    /// Observation lower bound
    pub low: f32,
    /// Observation upper bound
    pub high: f32,
    /// Number of discrete actions
    pub n_actions: usize,
    /// Action names in index order
    pub action_names: Vec<String>,
}

impl EnvManifest {
    pub fn new(name: impl Into<String>, shape: (usize, usize), actions: &ActionSpace) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").into(),
            observation_shape: [shape.0, shape.1],
            low: CELL_LOW,
            high: CELL_HIGH,
            n_actions: actions.n(),
            action_names: actions.names(),
        }
    }

    /// Shape of a stacked observation of depth `k`
    pub fn stacked_shape(&self, k: usize) -> [usize; 3] {
        [k, self.observation_shape[0], self.observation_shape[1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_from_space() {
        let manifest = EnvManifest::new("bman-grid", (39, 51), &ActionSpace::new());

        assert_eq!(manifest.observation_shape, [39, 51]);
        assert_eq!(manifest.n_actions, 5);
        assert_eq!(manifest.action_names.len(), 5);
        assert_eq!(manifest.low, -1.0);
        assert_eq!(manifest.stacked_shape(4), [4, 39, 51]);
    }
}
