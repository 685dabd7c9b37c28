//! Exploitation-probability schedules
//!
//! Drivers pass the schedule value at the current step to
//! [`PolicySelector::stochastic`](crate::PolicySelector::stochastic). Because
//! the value is the probability of exploiting, annealing runs upward: more
//! greedy behavior as training progresses, not less.

use serde::{Deserialize, Serialize};

/// Exploitation probability as a function of the global step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// Fixed value at every step
    Constant {
        /// Exploitation probability
        value: f64,
    },
    /// Linear interpolation from `start` to `end` over `steps`, then flat
    Linear {
        /// Value at step 0
        start: f64,
        /// Value from `steps` onward
        end: f64,
        /// Steps over which to interpolate
        steps: usize,
    },
    /// Geometric approach from `start` toward `limit`
    Exponential {
        /// Value at step 0
        start: f64,
        /// Bound the value never crosses
        limit: f64,
        /// Per-step rate in (0, 1); smaller reaches the limit faster
        rate: f64,
    },
}

impl EpsilonSchedule {
    /// Schedule value at `step`.
    #[must_use]
    pub fn value(&self, step: usize) -> f64 {
        match *self {
            Self::Constant { value } => value,
            Self::Linear { start, end, steps } => {
                if steps == 0 || step >= steps {
                    end
                } else {
                    let progress = step as f64 / steps as f64;
                    start + (end - start) * progress
                }
            }
            Self::Exponential { start, limit, rate } => {
                limit + (start - limit) * rate.powf(step as f64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_ignores_the_step() {
        let schedule = EpsilonSchedule::Constant { value: 0.9 };
        assert_eq!(schedule.value(0), 0.9);
        assert_eq!(schedule.value(1_000_000), 0.9);
    }

    #[test]
    fn linear_interpolates_and_saturates() {
        let schedule = EpsilonSchedule::Linear {
            start: 0.5,
            end: 0.95,
            steps: 100,
        };
        assert_relative_eq!(schedule.value(0), 0.5);
        assert_relative_eq!(schedule.value(50), 0.725);
        assert_relative_eq!(schedule.value(100), 0.95);
        assert_relative_eq!(schedule.value(500), 0.95);
    }

    #[test]
    fn exponential_approaches_the_limit_monotonically() {
        let schedule = EpsilonSchedule::Exponential {
            start: 0.5,
            limit: 0.95,
            rate: 0.99,
        };
        assert_relative_eq!(schedule.value(0), 0.5);
        let mut previous = schedule.value(0);
        for step in [10, 100, 1_000, 10_000] {
            let value = schedule.value(step);
            assert!(value > previous);
            assert!(value <= 0.95);
            previous = value;
        }
    }

    #[test]
    fn serializes_with_a_kind_tag() {
        let schedule = EpsilonSchedule::Linear {
            start: 0.5,
            end: 0.9,
            steps: 10,
        };
        let json = serde_json::to_string(&schedule).unwrap();
        assert!(json.contains("\"kind\":\"linear\""));
        let back: EpsilonSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schedule);
    }
}
