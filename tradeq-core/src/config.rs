//! Agent configuration

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Hyper-parameters and shape constants for the D3QN agent.
///
/// Every field is explicit; there is no default configuration. Shapes are
/// fixed for the lifetime of an agent, so changing the universe or the
/// feature set means building a new agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Number of assets in the trading universe
    pub universe_size: usize,
    /// Number of features observed per asset
    pub feature_size: usize,
    /// Number of discrete actions available per asset
    pub action_size: usize,
    /// Maximum number of transitions retained in the replay buffer
    pub memory_size: usize,
    /// Transitions drawn per gradient update
    pub batch_size: usize,
    /// Discount factor for bootstrapped returns, in (0, 1)
    pub gamma: f64,
    /// Global gradient-norm bound applied before each optimizer step
    pub max_grad_norm: f64,
    /// Nadam learning rate
    pub learning_rate: f64,
}

impl AgentConfig {
    /// Check for values the agent cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.universe_size == 0 {
            return Err(AgentError::Config("universe_size must be positive".into()));
        }
        if self.feature_size == 0 {
            return Err(AgentError::Config("feature_size must be positive".into()));
        }
        if self.action_size == 0 {
            return Err(AgentError::Config("action_size must be positive".into()));
        }
        if self.memory_size == 0 {
            return Err(AgentError::Config("memory_size must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(AgentError::Config("batch_size must be positive".into()));
        }
        if self.batch_size > self.memory_size {
            return Err(AgentError::Config(format!(
                "batch_size {} exceeds memory_size {}",
                self.batch_size, self.memory_size
            )));
        }
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(AgentError::Config(format!(
                "gamma must lie in (0, 1), got {}",
                self.gamma
            )));
        }
        if !self.max_grad_norm.is_finite() || self.max_grad_norm <= 0.0 {
            return Err(AgentError::Config(format!(
                "max_grad_norm must be positive and finite, got {}",
                self.max_grad_norm
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(AgentError::Config(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Shape of a single observation, `[universe_size, feature_size]`.
    #[must_use]
    pub fn observation_shape(&self) -> [usize; 2] {
        [self.universe_size, self.feature_size]
    }
}
