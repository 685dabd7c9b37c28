//! Action selection from value estimates

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tradeq_core::{AgentError, JointAction, Result};

/// Derives joint actions from per-asset action-value estimates.
///
/// The stochastic policy draws one coin per decision: with probability
/// `epsilon` it returns the greedy joint action, otherwise it draws a uniform
/// random action index for every asset. `epsilon` is the probability of
/// EXPLOITING, not of exploring; drivers anneal it upward as training
/// progresses. The selector owns its RNG so seeded runs reproduce.
pub struct PolicySelector {
    action_size: usize,
    rng: StdRng,
}

impl PolicySelector {
    /// Selector over `action_size` discrete actions per asset.
    #[must_use]
    pub fn new(action_size: usize) -> Self {
        Self {
            action_size,
            rng: StdRng::from_entropy(),
        }
    }

    /// Selector with a fixed RNG seed, for reproducible runs.
    #[must_use]
    pub fn seeded(action_size: usize, seed: u64) -> Self {
        Self {
            action_size,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Greedy joint action: per asset, the index of the highest value.
    ///
    /// Ties go to the first maximal index, so the result is deterministic for
    /// fixed values.
    pub fn deterministic(&self, values: &ArrayView2<f32>) -> Result<JointAction> {
        self.check_width(values)?;
        let indices = values.rows().into_iter().map(argmax).collect();
        Ok(JointAction::new(indices))
    }

    /// Epsilon-greedy joint action with `epsilon` the exploitation probability.
    ///
    /// At `epsilon = 1.0` this is exactly [`PolicySelector::deterministic`];
    /// at `epsilon = 0.0` every asset gets a uniform random action.
    pub fn stochastic(&mut self, values: &ArrayView2<f32>, epsilon: f64) -> Result<JointAction> {
        self.check_width(values)?;
        if self.rng.gen::<f64>() < epsilon {
            self.deterministic(values)
        } else {
            let indices = (0..values.nrows())
                .map(|_| self.rng.gen_range(0..self.action_size))
                .collect();
            Ok(JointAction::new(indices))
        }
    }

    fn check_width(&self, values: &ArrayView2<f32>) -> Result<()> {
        if self.action_size == 0 {
            return Err(AgentError::Config("action_size must be positive".into()));
        }
        if values.ncols() != self.action_size {
            return Err(AgentError::ShapeMismatch {
                expected: vec![values.nrows(), self.action_size],
                actual: values.shape().to_vec(),
            });
        }
        Ok(())
    }
}

/// Index of the row maximum; the first maximal entry wins.
///
/// Strict greater-than comparison, so NaN entries are never selected and an
/// all-NaN row falls back to index 0.
pub(crate) fn argmax(values: ArrayView1<f32>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        // A NaN incumbent compares false against everything, so displace it
        // explicitly; otherwise a NaN at index 0 would win every row.
        if v > values[best] || (values[best].is_nan() && !v.is_nan()) {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn deterministic_picks_per_asset_argmax() {
        let selector = PolicySelector::seeded(3, 0);
        let values = arr2(&[[0.1, 0.9, 0.2], [2.0, -1.0, 0.0]]);
        let action = selector.deterministic(&values.view()).unwrap();
        assert_eq!(action.as_slice(), &[1, 0]);
    }

    #[test]
    fn ties_resolve_to_the_first_index() {
        let selector = PolicySelector::seeded(3, 0);
        let values = arr2(&[[1.0, 3.0, 3.0], [7.0, 7.0, 7.0]]);
        let action = selector.deterministic(&values.view()).unwrap();
        assert_eq!(action.as_slice(), &[1, 0]);
    }

    #[test]
    fn nan_values_are_never_selected() {
        let selector = PolicySelector::seeded(3, 0);
        let values = arr2(&[[f32::NAN, 1.0, 0.5]]);
        let action = selector.deterministic(&values.view()).unwrap();
        assert_eq!(action.as_slice(), &[1]);

        // NaN anywhere, including index 0, loses to any finite value
        let values = arr2(&[[f32::NAN, -5.0, f32::NAN], [0.5, f32::NAN, 0.7]]);
        let action = selector.deterministic(&values.view()).unwrap();
        assert_eq!(action.as_slice(), &[1, 2]);
    }

    #[test]
    fn all_nan_row_falls_back_to_the_first_index() {
        let selector = PolicySelector::seeded(3, 0);
        let values = arr2(&[[f32::NAN, f32::NAN, f32::NAN]]);
        let action = selector.deterministic(&values.view()).unwrap();
        assert_eq!(action.as_slice(), &[0]);
    }

    #[test]
    fn full_exploitation_is_always_greedy() {
        let mut selector = PolicySelector::seeded(4, 1);
        let values = arr2(&[[0.0, 0.0, 5.0, 0.0], [9.0, 0.0, 0.0, 0.0]]);
        for _ in 0..100 {
            let action = selector.stochastic(&values.view(), 1.0).unwrap();
            assert_eq!(action.as_slice(), &[2, 0]);
        }
    }

    #[test]
    fn zero_exploitation_explores() {
        let mut selector = PolicySelector::seeded(4, 2);
        let values = arr2(&[[5.0, 0.0, 0.0, 0.0], [5.0, 0.0, 0.0, 0.0], [5.0, 0.0, 0.0, 0.0]]);
        let mut diverged = false;
        for _ in 0..50 {
            let action = selector.stochastic(&values.view(), 0.0).unwrap();
            assert!(action.as_slice().iter().all(|&a| a < 4));
            if action.as_slice() != [0, 0, 0] {
                diverged = true;
            }
        }
        assert!(diverged, "pure exploration should leave the greedy action");
    }

    #[test]
    fn exploitation_rate_is_close_to_epsilon() {
        let mut selector = PolicySelector::seeded(5, 3);
        let values = arr2(&[[0.0, 0.0, 9.0, 0.0, 0.0], [0.0, 0.0, 9.0, 0.0, 0.0]]);
        let greedy = [2_usize, 2];
        let epsilon = 0.7;
        let draws = 10_000;
        let mut matched = 0;
        for _ in 0..draws {
            let action = selector.stochastic(&values.view(), epsilon).unwrap();
            if action.as_slice() == greedy {
                matched += 1;
            }
        }
        // Random draws also hit the greedy pair with probability (1/5)^2
        let expected = epsilon + (1.0 - epsilon) * 0.04;
        let rate = f64::from(matched) / f64::from(draws);
        assert!(
            (rate - expected).abs() < 0.02,
            "exploitation rate {rate} too far from {expected}"
        );
    }

    #[test]
    fn width_mismatch_is_an_error() {
        let selector = PolicySelector::seeded(3, 0);
        let values = arr2(&[[1.0, 2.0]]);
        assert!(matches!(
            selector.deterministic(&values.view()),
            Err(AgentError::ShapeMismatch { .. })
        ));
    }
}
