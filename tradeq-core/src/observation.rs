//! Market observations

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Market state for one decision step.
///
/// Rows index assets of the trading universe, columns index the features
/// observed per asset. Values are `f32`; feature scaling is the data
/// pipeline's concern, not the agent's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observed features, `[universe, features]`
    pub data: Array2<f32>,
}

impl Observation {
    /// Wrap an already-shaped feature matrix.
    #[must_use]
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Build from a flat row-major buffer, validating its length.
    pub fn from_flat(universe: usize, features: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != universe * features {
            return Err(AgentError::ShapeMismatch {
                expected: vec![universe, features],
                actual: vec![values.len()],
            });
        }
        let data = Array2::from_shape_vec((universe, features), values).map_err(|_| {
            AgentError::ShapeMismatch {
                expected: vec![universe, features],
                actual: vec![],
            }
        })?;
        Ok(Self { data })
    }

    /// `[universe, features]` shape of this observation.
    #[must_use]
    pub fn shape(&self) -> [usize; 2] {
        [self.data.nrows(), self.data.ncols()]
    }

    /// Number of assets covered.
    #[must_use]
    pub fn universe_size(&self) -> usize {
        self.data.nrows()
    }

    /// Features observed per asset.
    #[must_use]
    pub fn feature_size(&self) -> usize {
        self.data.ncols()
    }
}

impl From<Array2<f32>> for Observation {
    fn from(data: Array2<f32>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn from_flat_builds_row_major() {
        let obs = Observation::from_flat(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(obs.data, arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]));
        assert_eq!(obs.shape(), [2, 3]);
        assert_eq!(obs.universe_size(), 2);
        assert_eq!(obs.feature_size(), 3);
    }

    #[test]
    fn from_flat_rejects_wrong_length() {
        let err = Observation::from_flat(2, 3, vec![1.0; 5]).unwrap_err();
        assert!(matches!(err, AgentError::ShapeMismatch { .. }));
    }

    #[test]
    fn serializes_round_trip() {
        let obs = Observation::from_flat(1, 2, vec![0.5, -0.5]).unwrap();
        let json = serde_json::to_string(&obs).unwrap();
        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obs);
    }
}
