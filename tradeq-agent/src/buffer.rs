//! Experience replay buffer

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::SeedableRng;

use tradeq_core::{AgentError, Result, Transition};

/// Bounded FIFO store of transitions with uniform random sampling.
///
/// When full, pushing evicts the oldest transition. The buffer owns its RNG,
/// so a seeded buffer replays the same sample sequence run after run.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    /// Buffer storage, oldest transition at the front
    transitions: VecDeque<Transition>,
    /// Maximum capacity
    capacity: usize,
    /// Sampling RNG
    rng: StdRng,
}

impl ReplayBuffer {
    /// Create a buffer holding at most `capacity` transitions.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    /// Create a buffer with a fixed sampling seed, for reproducible runs.
    #[must_use]
    pub fn seeded(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            transitions: VecDeque::with_capacity(capacity),
            capacity,
            rng,
        }
    }

    /// Append a transition, evicting the oldest one if the buffer is full.
    ///
    /// A zero-capacity buffer stores nothing.
    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.transitions.len() >= self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Draw `count` distinct transitions uniformly at random.
    ///
    /// Sampling is without replacement within one call and independent across
    /// calls. Fails with [`AgentError::BufferUnderfilled`] when fewer than
    /// `count` transitions are stored.
    pub fn sample(&mut self, count: usize) -> Result<Vec<Transition>> {
        if self.transitions.len() < count {
            return Err(AgentError::BufferUnderfilled {
                required: count,
                available: self.transitions.len(),
            });
        }
        let picks = rand::seq::index::sample(&mut self.rng, self.transitions.len(), count);
        Ok(picks.iter().map(|i| self.transitions[i].clone()).collect())
    }

    /// Number of stored transitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Whether the buffer holds no transitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Maximum number of transitions retained.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate stored transitions oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Drop all stored transitions.
    pub fn clear(&mut self) {
        self.transitions.clear();
    }
}
