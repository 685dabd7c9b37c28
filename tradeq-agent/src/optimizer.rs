//! Nadam optimizer and gradient post-processing

use serde::{Deserialize, Serialize};

use tradeq_core::{AgentError, Result};

/// Exponential decay rate for the first moment
const BETA1: f64 = 0.9;
/// Exponential decay rate for the second moment
const BETA2: f64 = 0.999;
/// Keeps the update denominator away from zero
const EPSILON: f64 = 1e-8;

/// Adam with Nesterov momentum.
///
/// Moment estimates are owned state, serialized alongside the network
/// parameters so a restored run resumes with the same update dynamics.
/// One flat parameter layout per instance; the caller keeps parameter and
/// gradient vectors in the same order across steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nadam {
    learning_rate: f64,
    first_moment: Vec<f32>,
    second_moment: Vec<f32>,
    step_count: usize,
}

impl Nadam {
    /// Optimizer state for `parameter_count` parameters.
    #[must_use]
    pub fn new(learning_rate: f64, parameter_count: usize) -> Self {
        Self {
            learning_rate,
            first_moment: vec![0.0; parameter_count],
            second_moment: vec![0.0; parameter_count],
            step_count: 0,
        }
    }

    /// Number of steps applied so far.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.step_count
    }

    /// Configured learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Apply one Nadam step to `params` in place.
    pub fn step(&mut self, params: &mut [f32], grads: &[f32]) -> Result<()> {
        let n = self.first_moment.len();
        if params.len() != n {
            return Err(AgentError::ShapeMismatch {
                expected: vec![n],
                actual: vec![params.len()],
            });
        }
        if grads.len() != n {
            return Err(AgentError::ShapeMismatch {
                expected: vec![n],
                actual: vec![grads.len()],
            });
        }

        self.step_count += 1;
        let t = self.step_count as i32;
        let bias1 = 1.0 - BETA1.powi(t);
        let bias2 = 1.0 - BETA2.powi(t);

        for i in 0..n {
            let g = f64::from(grads[i]);
            let m = BETA1 * f64::from(self.first_moment[i]) + (1.0 - BETA1) * g;
            let v = BETA2 * f64::from(self.second_moment[i]) + (1.0 - BETA2) * g * g;
            self.first_moment[i] = m as f32;
            self.second_moment[i] = v as f32;

            let m_hat = m / bias1;
            let v_hat = v / bias2;
            // Nesterov look-ahead: blend the corrected moment with the raw gradient
            let m_bar = BETA1 * m_hat + (1.0 - BETA1) * g / bias1;

            params[i] -= (self.learning_rate * m_bar / (v_hat.sqrt() + EPSILON)) as f32;
        }
        Ok(())
    }
}

/// Scale `grads` so their global L2 norm is at most `max_norm`.
///
/// Returns the norm measured before any rescaling. Gradients already within
/// the bound are left untouched; a non-finite norm leaves them untouched too,
/// so the caller can detect it.
pub fn clip_global_norm(grads: &mut [f32], max_norm: f64) -> f64 {
    let norm = grads
        .iter()
        .map(|&g| f64::from(g) * f64::from(g))
        .sum::<f64>()
        .sqrt();
    if norm.is_finite() && norm > max_norm {
        let scale = (max_norm / norm) as f32;
        for g in grads.iter_mut() {
            *g *= scale;
        }
    }
    norm
}
