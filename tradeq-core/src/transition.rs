//! Transition records, the unit of experience

use serde::{Deserialize, Serialize};

use crate::action::JointAction;
use crate::observation::Observation;

/// One step of interaction: state, action, reward, successor, terminal flag.
///
/// Transitions are immutable once recorded; the replay buffer hands out
/// clones and never rewrites history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Observation before the action
    pub state: Observation,
    /// Joint action taken
    pub action: JointAction,
    /// Scalar reward received
    pub reward: f32,
    /// Observation after the action
    pub next_state: Observation,
    /// Whether the episode ended at this step
    pub done: bool,
}

impl Transition {
    /// Assemble a transition record.
    #[must_use]
    pub fn new(
        state: Observation,
        action: JointAction,
        reward: f32,
        next_state: Observation,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}
