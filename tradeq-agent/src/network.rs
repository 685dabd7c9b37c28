//! Q-value networks
//!
//! The value estimator consumes networks through the [`QNetwork`] trait; two
//! instances with identical architecture but separate parameters play the
//! online ("value") and lagged ("target") roles. [`DenseQNetwork`] is the
//! reference implementation: a multi-layer perceptron shared across assets,
//! applied to each asset's feature row independently.

use ndarray::{Array1, Array2, Array3, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use tradeq_core::{AgentConfig, AgentError, Result};

/// Activation applied after each hidden layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// max(0, x)
    Relu,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic function
    Sigmoid,
}

impl Activation {
    fn apply(self, x: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => x.mapv(|v| v.max(0.0)),
            Activation::Tanh => x.mapv(f32::tanh),
            Activation::Sigmoid => x.mapv(|v| 1.0 / (1.0 + (-v).exp())),
        }
    }

    /// Derivative expressed in terms of the activation output.
    fn grad_from_output(self, a: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Relu => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Tanh => a.mapv(|v| 1.0 - v * v),
            Activation::Sigmoid => a.mapv(|v| v * (1.0 - v)),
        }
    }
}

/// Architecture of a [`DenseQNetwork`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hidden layer widths, applied in order
    pub hidden: Vec<usize>,
    /// Activation after each hidden layer
    pub activation: Activation,
}

/// Batched action-value predictor.
///
/// Maps `[batch, universe, features]` observations to `[batch, universe,
/// actions]` value estimates. Parameters are exposed as one flat `f32`
/// vector in a stable declaration order; the estimator copies value-network
/// parameters onto the target network by position, so both roles must be
/// instances with the same layout.
pub trait QNetwork: Send + Sync {
    /// Instance name ("value", "target"), used to scope parameter names.
    fn name(&self) -> &str;

    /// Assets covered per observation.
    fn universe_size(&self) -> usize;

    /// Features consumed per asset.
    fn feature_size(&self) -> usize;

    /// Discrete actions estimated per asset.
    fn action_size(&self) -> usize;

    /// Batched forward pass.
    fn forward(&self, observations: &ArrayView3<f32>) -> Result<Array3<f32>>;

    /// Trainable parameters, flattened in declaration order.
    fn parameters(&self) -> Vec<f32>;

    /// One name per parameter tensor, aligned with the flat layout.
    fn parameter_names(&self) -> Vec<String>;

    /// Overwrite all parameters from a flat vector in `parameters()` order.
    fn load_parameters(&mut self, params: &[f32]) -> Result<()>;

    /// Gradient of a scalar loss with respect to the parameters, given the
    /// loss gradient at the network output.
    ///
    /// Recomputes the forward pass internally; the returned vector matches
    /// the `parameters()` layout.
    fn backprop(
        &self,
        observations: &ArrayView3<f32>,
        output_grad: &ArrayView3<f32>,
    ) -> Result<Vec<f32>>;
}

/// Multi-layer perceptron applied to every asset independently.
///
/// One set of weights serves the whole universe: the batch and universe axes
/// are collapsed, the layers run once per asset row, and the output is
/// reshaped back to `[batch, universe, actions]`. Weights start from a
/// truncated normal (sigma `1/sqrt(fan_in)`, redrawn beyond two sigma),
/// biases from zero.
#[derive(Debug, Clone)]
pub struct DenseQNetwork {
    name: String,
    universe_size: usize,
    feature_size: usize,
    action_size: usize,
    activation: Activation,
    /// Weight matrices, `[fan_in, fan_out]` per layer
    weights: Vec<Array2<f32>>,
    /// Bias vectors per layer
    biases: Vec<Array1<f32>>,
}

impl DenseQNetwork {
    /// Build a network for the configured shapes with seeded initialization.
    ///
    /// Value and target instances are normally built from different seeds so
    /// they start from independent weights.
    pub fn new(
        name: &str,
        config: &AgentConfig,
        network: &NetworkConfig,
        seed: u64,
    ) -> Result<Self> {
        if config.universe_size == 0 || config.feature_size == 0 || config.action_size == 0 {
            return Err(AgentError::Config(
                "universe_size, feature_size and action_size must be positive".into(),
            ));
        }
        if network.hidden.iter().any(|&w| w == 0) {
            return Err(AgentError::Config("hidden layer widths must be positive".into()));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut weights = Vec::with_capacity(network.hidden.len() + 1);
        let mut biases = Vec::with_capacity(network.hidden.len() + 1);

        let mut fan_in = config.feature_size;
        for &width in &network.hidden {
            weights.push(truncated_normal(&mut rng, fan_in, width)?);
            biases.push(Array1::zeros(width));
            fan_in = width;
        }
        weights.push(truncated_normal(&mut rng, fan_in, config.action_size)?);
        biases.push(Array1::zeros(config.action_size));

        Ok(Self {
            name: name.to_owned(),
            universe_size: config.universe_size,
            feature_size: config.feature_size,
            action_size: config.action_size,
            activation: network.activation,
            weights,
            biases,
        })
    }

    /// Total number of trainable parameters.
    #[must_use]
    pub fn parameter_len(&self) -> usize {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(w, b)| w.len() + b.len())
            .sum()
    }

    /// Collapse the batch and universe axes so the layers run once per asset.
    fn flatten(&self, observations: &ArrayView3<f32>) -> Result<Array2<f32>> {
        let (batch, universe, features) = observations.dim();
        if batch == 0 || universe != self.universe_size || features != self.feature_size {
            return Err(AgentError::ShapeMismatch {
                expected: vec![batch.max(1), self.universe_size, self.feature_size],
                actual: observations.shape().to_vec(),
            });
        }
        observations
            .to_owned()
            .into_shape((batch * universe, features))
            .map_err(|_| AgentError::ShapeMismatch {
                expected: vec![batch * universe, features],
                actual: observations.shape().to_vec(),
            })
    }

    /// Run the layers over `[rows, features]` input.
    fn forward_flat(&self, input: Array2<f32>) -> Array2<f32> {
        let depth = self.weights.len();
        let mut x = input;
        for i in 0..depth {
            let z = x.dot(&self.weights[i]) + &self.biases[i];
            x = if i + 1 < depth {
                self.activation.apply(&z)
            } else {
                z
            };
        }
        x
    }

    /// Forward pass retaining every layer output for backpropagation.
    ///
    /// `outs[0]` is the input; `outs[i + 1]` is layer `i`'s output, post
    /// activation for hidden layers and linear for the head.
    fn activations(&self, input: Array2<f32>) -> Vec<Array2<f32>> {
        let depth = self.weights.len();
        let mut outs = Vec::with_capacity(depth + 1);
        outs.push(input);
        for i in 0..depth {
            let z = outs[i].dot(&self.weights[i]) + &self.biases[i];
            let a = if i + 1 < depth {
                self.activation.apply(&z)
            } else {
                z
            };
            outs.push(a);
        }
        outs
    }
}

impl QNetwork for DenseQNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    fn universe_size(&self) -> usize {
        self.universe_size
    }

    fn feature_size(&self) -> usize {
        self.feature_size
    }

    fn action_size(&self) -> usize {
        self.action_size
    }

    fn forward(&self, observations: &ArrayView3<f32>) -> Result<Array3<f32>> {
        let (batch, universe, _) = observations.dim();
        let flat = self.flatten(observations)?;
        let out = self.forward_flat(flat);
        out.into_shape((batch, universe, self.action_size))
            .map_err(|_| AgentError::ShapeMismatch {
                expected: vec![batch, universe, self.action_size],
                actual: observations.shape().to_vec(),
            })
    }

    fn parameters(&self) -> Vec<f32> {
        let mut params = Vec::with_capacity(self.parameter_len());
        for (w, b) in self.weights.iter().zip(&self.biases) {
            params.extend(w.iter().copied());
            params.extend(b.iter().copied());
        }
        params
    }

    fn parameter_names(&self) -> Vec<String> {
        let depth = self.weights.len();
        let mut names = Vec::with_capacity(depth * 2);
        for i in 0..depth {
            let scope = if i + 1 == depth {
                format!("{}/head", self.name)
            } else {
                format!("{}/fc{i}", self.name)
            };
            names.push(format!("{scope}/weight"));
            names.push(format!("{scope}/bias"));
        }
        names
    }

    fn load_parameters(&mut self, params: &[f32]) -> Result<()> {
        let expected = self.parameter_len();
        if params.len() != expected {
            return Err(AgentError::ShapeMismatch {
                expected: vec![expected],
                actual: vec![params.len()],
            });
        }
        let mut offset = 0;
        for (w, b) in self.weights.iter_mut().zip(self.biases.iter_mut()) {
            for dst in w.iter_mut() {
                *dst = params[offset];
                offset += 1;
            }
            for dst in b.iter_mut() {
                *dst = params[offset];
                offset += 1;
            }
        }
        Ok(())
    }

    fn backprop(
        &self,
        observations: &ArrayView3<f32>,
        output_grad: &ArrayView3<f32>,
    ) -> Result<Vec<f32>> {
        let (batch, universe, _) = observations.dim();
        if output_grad.dim() != (batch, universe, self.action_size) {
            return Err(AgentError::ShapeMismatch {
                expected: vec![batch, universe, self.action_size],
                actual: output_grad.shape().to_vec(),
            });
        }

        let flat = self.flatten(observations)?;
        let outs = self.activations(flat);
        let depth = self.weights.len();

        // Gradient at the linear head output
        let mut grad_z = output_grad
            .to_owned()
            .into_shape((batch * universe, self.action_size))
            .map_err(|_| AgentError::ShapeMismatch {
                expected: vec![batch * universe, self.action_size],
                actual: output_grad.shape().to_vec(),
            })?;

        let mut weight_grads = Vec::with_capacity(depth);
        let mut bias_grads = Vec::with_capacity(depth);

        // Walk layers back to front; entering iteration i, grad_z holds the
        // loss gradient at layer i's pre-activation.
        for i in (0..depth).rev() {
            let input = &outs[i];
            weight_grads.push(input.t().dot(&grad_z));
            bias_grads.push(grad_z.sum_axis(Axis(0)));
            if i > 0 {
                let upstream = grad_z.dot(&self.weights[i].t());
                let deriv = self.activation.grad_from_output(&outs[i]);
                grad_z = upstream * &deriv;
            }
        }
        weight_grads.reverse();
        bias_grads.reverse();

        let mut grads = Vec::with_capacity(self.parameter_len());
        for (dw, db) in weight_grads.iter().zip(&bias_grads) {
            grads.extend(dw.iter().copied());
            grads.extend(db.iter().copied());
        }
        Ok(grads)
    }
}

/// Truncated-normal weights: sigma `1/sqrt(fan_in)`, redrawn beyond two sigma.
fn truncated_normal(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> Result<Array2<f32>> {
    let stddev = 1.0 / (fan_in as f32).sqrt();
    let dist = Normal::new(0.0_f32, stddev)
        .map_err(|e| AgentError::Config(format!("weight initializer: {e}")))?;
    let bound = 2.0 * stddev;
    Ok(Array2::from_shape_fn((fan_in, fan_out), |_| loop {
        let x = dist.sample(rng);
        if x.abs() <= bound {
            return x;
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn config() -> AgentConfig {
        AgentConfig {
            universe_size: 3,
            feature_size: 4,
            action_size: 2,
            memory_size: 16,
            batch_size: 4,
            gamma: 0.9,
            max_grad_norm: 5.0,
            learning_rate: 1e-3,
        }
    }

    fn network() -> NetworkConfig {
        NetworkConfig {
            hidden: vec![8],
            activation: Activation::Tanh,
        }
    }

    #[test]
    fn forward_produces_batched_action_values() {
        let net = DenseQNetwork::new("value", &config(), &network(), 1).unwrap();
        let obs = Array3::from_shape_fn((5, 3, 4), |(i, j, k)| (i + j + k) as f32 * 0.1);
        let q = net.forward(&obs.view()).unwrap();
        assert_eq!(q.dim(), (5, 3, 2));
        assert!(q.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn assets_with_identical_features_get_identical_values() {
        let net = DenseQNetwork::new("value", &config(), &network(), 2).unwrap();
        let mut obs = Array3::zeros((1, 3, 4));
        for k in 0..4 {
            obs[[0, 0, k]] = 0.3 * k as f32;
            obs[[0, 2, k]] = 0.3 * k as f32;
            obs[[0, 1, k]] = -1.0;
        }
        let q = net.forward(&obs.view()).unwrap();
        for a in 0..2 {
            assert_eq!(q[[0, 0, a]], q[[0, 2, a]]);
        }
    }

    #[test]
    fn forward_rejects_wrong_feature_count() {
        let net = DenseQNetwork::new("value", &config(), &network(), 3).unwrap();
        let obs = Array3::<f32>::zeros((2, 3, 5));
        assert!(matches!(
            net.forward(&obs.view()),
            Err(AgentError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn forward_rejects_empty_batch() {
        let net = DenseQNetwork::new("value", &config(), &network(), 3).unwrap();
        let obs = Array3::<f32>::zeros((0, 3, 4));
        assert!(net.forward(&obs.view()).is_err());
    }

    #[test]
    fn parameters_round_trip_through_load() {
        let source = DenseQNetwork::new("value", &config(), &network(), 4).unwrap();
        let mut sink = DenseQNetwork::new("target", &config(), &network(), 5).unwrap();
        sink.load_parameters(&source.parameters()).unwrap();

        let obs = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 12 + j * 4 + k) as f32 * 0.05);
        let a = source.forward(&obs.view()).unwrap();
        let b = sink.forward(&obs.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn load_rejects_wrong_parameter_count() {
        let mut net = DenseQNetwork::new("value", &config(), &network(), 6).unwrap();
        let short = vec![0.0_f32; net.parameter_len() - 1];
        assert!(matches!(
            net.load_parameters(&short),
            Err(AgentError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn parameter_names_scope_by_instance_and_layer() {
        let net = DenseQNetwork::new(
            "target",
            &config(),
            &NetworkConfig {
                hidden: vec![8, 6],
                activation: Activation::Relu,
            },
            7,
        )
        .unwrap();
        let names = net.parameter_names();
        assert_eq!(
            names,
            vec![
                "target/fc0/weight",
                "target/fc0/bias",
                "target/fc1/weight",
                "target/fc1/bias",
                "target/head/weight",
                "target/head/bias",
            ]
        );
    }

    #[test]
    fn initial_weights_stay_within_two_sigma() {
        let net = DenseQNetwork::new("value", &config(), &network(), 8).unwrap();
        // First layer: fan_in = 4, sigma = 0.5
        assert!(net.weights[0].iter().all(|w| w.abs() <= 1.0));
        assert!(net.biases.iter().all(|b| b.iter().all(|&v| v == 0.0)));
    }

    #[test]
    fn seeded_networks_initialize_identically() {
        let a = DenseQNetwork::new("value", &config(), &network(), 9).unwrap();
        let b = DenseQNetwork::new("value", &config(), &network(), 9).unwrap();
        assert_eq!(a.parameters(), b.parameters());
        let c = DenseQNetwork::new("value", &config(), &network(), 10).unwrap();
        assert_ne!(a.parameters(), c.parameters());
    }

    #[test]
    fn backprop_matches_finite_differences() {
        let config = AgentConfig {
            universe_size: 2,
            feature_size: 3,
            action_size: 2,
            memory_size: 16,
            batch_size: 4,
            gamma: 0.9,
            max_grad_norm: 5.0,
            learning_rate: 1e-3,
        };
        let network = NetworkConfig {
            hidden: vec![4],
            activation: Activation::Tanh,
        };
        let mut net = DenseQNetwork::new("value", &config, &network, 11).unwrap();

        let x = Array3::from_shape_fn((2, 2, 3), |(i, j, k)| {
            0.1 + 0.2 * (i as f32) - 0.3 * (j as f32) + 0.15 * (k as f32)
        });
        let g = Array3::from_shape_fn((2, 2, 2), |(i, j, k)| {
            0.5 - 0.4 * (i as f32) + 0.3 * (j as f32) - 0.2 * (k as f32)
        });

        let analytic = net.backprop(&x.view(), &g.view()).unwrap();
        let theta = net.parameters();
        assert_eq!(analytic.len(), theta.len());

        let loss = |net: &DenseQNetwork| -> f32 {
            (net.forward(&x.view()).unwrap() * &g).sum()
        };

        let h = 1e-3_f32;
        let probes = [0, 3, theta.len() / 2, theta.len() - 1];
        for &idx in &probes {
            let mut plus = theta.clone();
            plus[idx] += h;
            net.load_parameters(&plus).unwrap();
            let lp = loss(&net);

            let mut minus = theta.clone();
            minus[idx] -= h;
            net.load_parameters(&minus).unwrap();
            let lm = loss(&net);

            let numeric = (lp - lm) / (2.0 * h);
            assert_relative_eq!(analytic[idx], numeric, epsilon = 2e-2, max_relative = 0.1);
        }
    }

    #[test]
    fn backprop_rejects_mismatched_gradient_shape() {
        let net = DenseQNetwork::new("value", &config(), &network(), 12).unwrap();
        let x = Array3::<f32>::zeros((2, 3, 4));
        let g = Array3::<f32>::zeros((2, 3, 5));
        assert!(net.backprop(&x.view(), &g.view()).is_err());
    }

    #[test]
    fn zero_width_layers_rejected() {
        let bad = NetworkConfig {
            hidden: vec![8, 0],
            activation: Activation::Relu,
        };
        assert!(DenseQNetwork::new("value", &config(), &bad, 0).is_err());
    }
}
