//! Joint actions over the asset universe

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// One discrete action index per asset, ordered like the observation rows.
///
/// The framework attaches no trading meaning to the indices; a driver maps
/// them to positions (for an index timing setup typically short, flat, long).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointAction(pub Vec<usize>);

impl JointAction {
    /// Wrap per-asset action indices.
    #[must_use]
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// Number of assets the action covers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the action covers no assets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the per-asset indices.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Check the action against a universe size and an action count.
    pub fn validate(&self, universe_size: usize, action_size: usize) -> Result<()> {
        if self.0.len() != universe_size {
            return Err(AgentError::InvalidAction(format!(
                "expected one action per asset ({universe_size}), got {}",
                self.0.len()
            )));
        }
        for (asset, &index) in self.0.iter().enumerate() {
            if index >= action_size {
                return Err(AgentError::InvalidAction(format!(
                    "action {index} for asset {asset} is out of range (action_size {action_size})"
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<usize>> for JointAction {
    fn from(indices: Vec<usize>) -> Self {
        Self::new(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_in_range_indices() {
        let action = JointAction::new(vec![0, 2, 1]);
        assert!(action.validate(3, 3).is_ok());
    }

    #[test]
    fn validate_rejects_wrong_arity() {
        let action = JointAction::new(vec![0, 1]);
        assert!(matches!(
            action.validate(3, 3),
            Err(AgentError::InvalidAction(_))
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_index() {
        let action = JointAction::new(vec![0, 3]);
        assert!(matches!(
            action.validate(2, 3),
            Err(AgentError::InvalidAction(_))
        ));
    }
}
