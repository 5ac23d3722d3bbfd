//! Bounded transition store for replay-based algorithms

use std::collections::VecDeque;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// One slot's transition from a single vectorized step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Stacked observation the action was chosen from
    pub observation: Array3<f32>,
    pub action: i64,
    pub reward: f64,
    /// Stacked observation that followed; the terminal stack when `done`
    pub next_observation: Array3<f32>,
    pub done: bool,
}

/// FIFO replay store; the oldest transitions are evicted at capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayBuffer {
    capacity: usize,
    transitions: VecDeque<Transition>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            transitions: VecDeque::new(),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    pub fn extend(&mut self, transitions: impl IntoIterator<Item = Transition>) {
        for t in transitions {
            self.push(t);
        }
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get a transition, oldest first
    pub fn get(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }
}
