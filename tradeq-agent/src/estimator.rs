//! Double deep Q-network value estimation and training
//!
//! [`ValueEstimator`] owns the online ("value") and lagged ("target")
//! networks, the replay buffer and the optimizer state. It builds double-Q
//! regression targets, applies clipped Nadam updates to the value network,
//! and copies parameters onto the target network only when the driver says
//! so.

use std::path::Path;

use ndarray::{s, Array1, Array2, Array3, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tradeq_core::{AgentConfig, AgentError, Observation, Result, Transition};

use crate::buffer::ReplayBuffer;
use crate::network::QNetwork;
use crate::optimizer::{clip_global_norm, Nadam};
use crate::policy::argmax;

/// D3QN value estimator.
///
/// The double-Q rule splits the bootstrap across the two networks: the value
/// network selects the best action per asset, the target network evaluates
/// it, and the evaluations are averaged over the universe. No gradient flows
/// through target construction; the only trained parameters are the value
/// network's, and the target network changes only through
/// [`ValueEstimator::update_target_net`].
pub struct ValueEstimator {
    config: AgentConfig,
    value_net: Box<dyn QNetwork>,
    target_net: Box<dyn QNetwork>,
    optimizer: Nadam,
    memory: ReplayBuffer,
}

/// Serialized estimator state
#[derive(Serialize, Deserialize)]
struct Checkpoint {
    config: AgentConfig,
    parameter_names: Vec<String>,
    value_parameters: Vec<f32>,
    target_parameters: Vec<f32>,
    optimizer: Nadam,
}

impl ValueEstimator {
    /// Build an estimator that takes ownership of both networks.
    ///
    /// The networks must match the configured shapes and share a parameter
    /// layout. They are NOT synchronized here: freshly built instances keep
    /// their independent initial weights until the first
    /// [`ValueEstimator::update_target_net`].
    pub fn new(
        config: AgentConfig,
        value_net: Box<dyn QNetwork>,
        target_net: Box<dyn QNetwork>,
    ) -> Result<Self> {
        Self::build(config, value_net, target_net, None)
    }

    /// Like [`ValueEstimator::new`] with deterministic replay sampling.
    pub fn seeded(
        config: AgentConfig,
        value_net: Box<dyn QNetwork>,
        target_net: Box<dyn QNetwork>,
        seed: u64,
    ) -> Result<Self> {
        Self::build(config, value_net, target_net, Some(seed))
    }

    fn build(
        config: AgentConfig,
        value_net: Box<dyn QNetwork>,
        target_net: Box<dyn QNetwork>,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;
        for net in [&value_net, &target_net] {
            if net.universe_size() != config.universe_size
                || net.feature_size() != config.feature_size
                || net.action_size() != config.action_size
            {
                return Err(AgentError::Config(format!(
                    "network '{}' does not match the configured shapes",
                    net.name()
                )));
            }
        }
        let parameter_count = value_net.parameters().len();
        if parameter_count != target_net.parameters().len() {
            return Err(AgentError::Config(
                "value and target networks must share a parameter layout".into(),
            ));
        }

        let memory = match seed {
            Some(seed) => ReplayBuffer::seeded(config.memory_size, seed),
            None => ReplayBuffer::new(config.memory_size),
        };
        let optimizer = Nadam::new(config.learning_rate, parameter_count);

        Ok(Self {
            config,
            value_net,
            target_net,
            optimizer,
            memory,
        })
    }

    /// Agent configuration in force.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Read access to the replay buffer, for warm-up checks.
    #[must_use]
    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    /// Optimizer steps applied so far.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.optimizer.steps()
    }

    /// Flat snapshot of the value network's parameters.
    #[must_use]
    pub fn value_parameters(&self) -> Vec<f32> {
        self.value_net.parameters()
    }

    /// Flat snapshot of the target network's parameters.
    #[must_use]
    pub fn target_parameters(&self) -> Vec<f32> {
        self.target_net.parameters()
    }

    /// Validate and append a transition to the replay buffer.
    pub fn record(&mut self, transition: Transition) -> Result<()> {
        let expected = self.config.observation_shape();
        for obs in [&transition.state, &transition.next_state] {
            if obs.shape() != expected {
                return Err(AgentError::ShapeMismatch {
                    expected: expected.to_vec(),
                    actual: obs.shape().to_vec(),
                });
            }
        }
        transition
            .action
            .validate(self.config.universe_size, self.config.action_size)?;
        self.memory.push(transition);
        Ok(())
    }

    /// Action-value estimates for one live decision, `[universe, actions]`.
    ///
    /// Runs the value network over a single-observation batch and squeezes
    /// the batch axis away.
    pub fn step_values(&self, observation: &Observation) -> Result<Array2<f32>> {
        let input = observation.data.clone().insert_axis(Axis(0));
        let values = self.value_net.forward(&input.view())?;
        Ok(values.index_axis(Axis(0), 0).to_owned())
    }

    /// Double-Q value estimate for each next observation.
    pub fn target_values(&self, next_states: &[Observation]) -> Result<Array1<f32>> {
        let batch = stack_observations(
            next_states.iter(),
            self.config.universe_size,
            self.config.feature_size,
        )?;
        self.double_q_values(&batch.view())
    }

    /// One-step bootstrapped regression targets.
    ///
    /// `reward` for terminal transitions, `reward + gamma * estimate`
    /// otherwise, where the estimate is the double-Q value of the successor.
    pub fn td_targets(
        &self,
        rewards: &[f32],
        dones: &[bool],
        next_states: &[Observation],
    ) -> Result<Array1<f32>> {
        if rewards.len() != next_states.len() || dones.len() != next_states.len() {
            return Err(AgentError::ShapeMismatch {
                expected: vec![next_states.len()],
                actual: vec![rewards.len(), dones.len()],
            });
        }
        let estimates = self.double_q_values(
            &stack_observations(
                next_states.iter(),
                self.config.universe_size,
                self.config.feature_size,
            )?
            .view(),
        )?;
        Ok(bootstrap(rewards, dones, &estimates, self.config.gamma))
    }

    /// Sample a batch and apply one clipped Nadam update to the value network.
    ///
    /// Returns the scalar loss: the squared target/prediction difference
    /// summed over the batch, where the prediction is the value network's
    /// estimate of the taken action averaged over the universe. The target
    /// network is never touched here.
    pub fn update_value_net(&mut self) -> Result<f64> {
        let samples = self.memory.sample(self.config.batch_size)?;
        let (states, actions, rewards, next_states, dones) = batch_tensors(
            &samples,
            self.config.universe_size,
            self.config.feature_size,
        )?;

        // Regression targets; no gradient flows through these.
        let estimates = self.double_q_values(&next_states.view())?;
        let targets = bootstrap(&rewards, &dones, &estimates, self.config.gamma);

        // Per-example prediction: taken-action value averaged over assets
        let q = self.value_net.forward(&states.view())?;
        let (batch, universe, action_size) = q.dim();
        let mut predictions = Array1::zeros(batch);
        for i in 0..batch {
            let mut acc = 0.0_f32;
            for j in 0..universe {
                acc += q[[i, j, actions[[i, j]]]];
            }
            predictions[i] = acc / universe as f32;
        }

        let loss = targets
            .iter()
            .zip(predictions.iter())
            .map(|(&t, &p)| {
                let r = f64::from(t) - f64::from(p);
                r * r
            })
            .sum::<f64>();
        if !loss.is_finite() {
            warn!(loss, "non-finite training loss");
            return Err(AgentError::Numerical(format!("non-finite loss: {loss}")));
        }

        // dL/dQ is non-zero only at taken-action entries
        let mut grad_q = Array3::zeros((batch, universe, action_size));
        for i in 0..batch {
            let g = 2.0 * (predictions[i] - targets[i]) / universe as f32;
            for j in 0..universe {
                grad_q[[i, j, actions[[i, j]]]] = g;
            }
        }

        let mut grads = self.value_net.backprop(&states.view(), &grad_q.view())?;
        let grad_norm = clip_global_norm(&mut grads, self.config.max_grad_norm);
        if !grad_norm.is_finite() {
            warn!(grad_norm, "non-finite gradient norm");
            return Err(AgentError::Numerical(format!(
                "non-finite gradient norm: {grad_norm}"
            )));
        }

        let mut params = self.value_net.parameters();
        self.optimizer.step(&mut params, &grads)?;
        self.value_net.load_parameters(&params)?;

        debug!(loss, grad_norm, "value network updated");
        Ok(loss)
    }

    /// Copy every value-network parameter onto the target network.
    ///
    /// Whole-set copy matched by position; idempotent. The call cadence is
    /// the driver's decision.
    pub fn update_target_net(&mut self) -> Result<()> {
        let params = self.value_net.parameters();
        self.target_net.load_parameters(&params)?;
        debug!(parameters = params.len(), "target network synchronized");
        Ok(())
    }

    /// Write the full estimator state (both parameter sets, optimizer
    /// moments, configuration) as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let checkpoint = Checkpoint {
            config: self.config.clone(),
            parameter_names: self.value_net.parameter_names(),
            value_parameters: self.value_net.parameters(),
            target_parameters: self.target_net.parameters(),
            optimizer: self.optimizer.clone(),
        };
        let json = serde_json::to_string_pretty(&checkpoint)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore state written by [`ValueEstimator::save`].
    ///
    /// The checkpoint must carry the same configuration; replay contents are
    /// not checkpointed and stay as they are.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&json)?;
        if checkpoint.config != self.config {
            return Err(AgentError::Config(
                "checkpoint configuration does not match this estimator".into(),
            ));
        }
        self.value_net.load_parameters(&checkpoint.value_parameters)?;
        self.target_net
            .load_parameters(&checkpoint.target_parameters)?;
        self.optimizer = checkpoint.optimizer;
        Ok(())
    }

    /// Select with the value network, evaluate with the target network,
    /// average over assets.
    fn double_q_values(&self, next_states: &ArrayView3<f32>) -> Result<Array1<f32>> {
        let selection = self.value_net.forward(next_states)?;
        let evaluation = self.target_net.forward(next_states)?;
        let (batch, universe, _) = selection.dim();
        let mut out = Array1::zeros(batch);
        for i in 0..batch {
            let mut acc = 0.0_f32;
            for j in 0..universe {
                let best = argmax(selection.slice(s![i, j, ..]));
                acc += evaluation[[i, j, best]];
            }
            out[i] = acc / universe as f32;
        }
        Ok(out)
    }
}

/// Stack observations into a `[batch, universe, features]` tensor.
fn stack_observations<'a, I>(observations: I, universe: usize, features: usize) -> Result<Array3<f32>>
where
    I: ExactSizeIterator<Item = &'a Observation>,
{
    let batch = observations.len();
    let mut out = Array3::zeros((batch, universe, features));
    for (i, obs) in observations.enumerate() {
        if obs.shape() != [universe, features] {
            return Err(AgentError::ShapeMismatch {
                expected: vec![universe, features],
                actual: obs.shape().to_vec(),
            });
        }
        out.index_axis_mut(Axis(0), i).assign(&obs.data);
    }
    Ok(out)
}

/// Terminal transitions take the raw reward; the rest bootstrap.
fn bootstrap(rewards: &[f32], dones: &[bool], estimates: &Array1<f32>, gamma: f64) -> Array1<f32> {
    let gamma = gamma as f32;
    rewards
        .iter()
        .zip(dones.iter())
        .zip(estimates.iter())
        .map(|((&reward, &done), &estimate)| {
            if done {
                reward
            } else {
                reward + gamma * estimate
            }
        })
        .collect()
}

/// Split sampled transitions into the tensors one update consumes.
fn batch_tensors(
    samples: &[Transition],
    universe: usize,
    features: usize,
) -> Result<(Array3<f32>, Array2<usize>, Vec<f32>, Array3<f32>, Vec<bool>)> {
    let states = stack_observations(samples.iter().map(|t| &t.state), universe, features)?;
    let next_states =
        stack_observations(samples.iter().map(|t| &t.next_state), universe, features)?;

    let batch = samples.len();
    let mut actions = Array2::zeros((batch, universe));
    let mut rewards = Vec::with_capacity(batch);
    let mut dones = Vec::with_capacity(batch);
    for (i, transition) in samples.iter().enumerate() {
        if transition.action.len() != universe {
            return Err(AgentError::ShapeMismatch {
                expected: vec![universe],
                actual: vec![transition.action.len()],
            });
        }
        for (j, &action) in transition.action.as_slice().iter().enumerate() {
            actions[[i, j]] = action;
        }
        rewards.push(transition.reward);
        dones.push(transition.done);
    }
    Ok((states, actions, rewards, next_states, dones))
}
