//! Per-slot episode bookkeeping

use bman_rl_core::EpisodeSummary;
use serde::{Deserialize, Serialize};

/// Running stats for one environment slot
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlotEntry {
    /// Slot index in the batch
    pub slot: usize,
    /// Episodes finished in this slot
    pub episodes: u64,
    /// Steps taken in the current episode
    pub episode_steps: u64,
    /// Reward accumulated in the current episode
    pub episode_return: f64,
    /// Steps taken across all episodes
    pub total_steps: u64,
    /// Most recently finished episode
    pub last_episode: Option<EpisodeSummary>,
}

/// Registry of slot stats, indexed by slot
pub struct SlotRegistry {
    slots: Vec<SlotEntry>,
}

impl SlotRegistry {
    /// Create a registry for `num_slots` slots
    pub fn new(num_slots: usize) -> Self {
        Self {
            slots: (0..num_slots)
                .map(|slot| SlotEntry {
                    slot,
                    ..SlotEntry::default()
                })
                .collect(),
        }
    }

    /// Record a step for a slot
    pub fn record_step(&mut self, slot: usize, reward: f64) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.episode_steps += 1;
            entry.total_steps += 1;
            entry.episode_return += reward;
        }
    }

    /// Close the current episode of a slot and return its summary
    pub fn finish_episode(&mut self, slot: usize) -> Option<EpisodeSummary> {
        let entry = self.slots.get_mut(slot)?;
        let summary = EpisodeSummary {
            episode_return: entry.episode_return,
            length: entry.episode_steps,
        };
        entry.episodes += 1;
        entry.episode_steps = 0;
        entry.episode_return = 0.0;
        entry.last_episode = Some(summary);
        Some(summary)
    }

    /// Discard the in-progress episode of a slot (explicit reset)
    pub fn restart(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            entry.episode_steps = 0;
            entry.episode_return = 0.0;
        }
    }

    /// Get a slot entry
    pub fn get(&self, slot: usize) -> Option<&SlotEntry> {
        self.slots.get(slot)
    }

    /// List all slots
    pub fn list(&self) -> &[SlotEntry] {
        &self.slots
    }

    /// Episodes finished across all slots
    pub fn total_episodes(&self) -> u64 {
        self.slots.iter().map(|s| s.episodes).sum()
    }

    /// Number of slots
    pub fn count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_accounting() {
        let mut registry = SlotRegistry::new(2);
        registry.record_step(0, 1.5);
        registry.record_step(0, -0.5);
        registry.record_step(1, 3.0);

        let summary = registry.finish_episode(0).unwrap();
        assert_eq!(summary.length, 2);
        assert!((summary.episode_return - 1.0).abs() < 1e-12);

        let slot0 = registry.get(0).unwrap();
        assert_eq!(slot0.episodes, 1);
        assert_eq!(slot0.episode_steps, 0);
        assert_eq!(slot0.total_steps, 2);
        assert_eq!(slot0.last_episode, Some(summary));

        assert_eq!(registry.get(1).unwrap().episode_steps, 1);
        assert_eq!(registry.total_episodes(), 1);
    }

    #[test]
    fn test_restart_and_out_of_range() {
        let mut registry = SlotRegistry::new(1);
        registry.record_step(0, 2.0);
        registry.restart(0);
        assert_eq!(registry.get(0).unwrap().episode_return, 0.0);
        assert_eq!(registry.get(0).unwrap().episodes, 0);

        registry.record_step(7, 1.0);
        assert!(registry.finish_episode(7).is_none());
        assert_eq!(registry.count(), 1);
    }
}
