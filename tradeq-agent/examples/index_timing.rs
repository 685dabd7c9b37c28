//! Example: D3QN timing agent on a synthetic two-asset market
//!
//! Prices follow phase-shifted sine waves with noise, so a learnable timing
//! signal exists. Actions per asset are short / flat / long; the reward is
//! the position-weighted next-step return averaged over the universe.

use anyhow::Result;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tradeq_agent::{
    Activation, DenseQNetwork, EpsilonSchedule, NetworkConfig, PolicySelector, ValueEstimator,
};
use tradeq_core::{AgentConfig, JointAction, Observation, Transition};

const EPISODES: usize = 20;
const STEPS_PER_EPISODE: usize = 240;
const WARMUP: usize = 64;
const TARGET_UPDATE_PERIOD: usize = 50;

/// Two sine-wave assets observed through a window of recent returns.
struct SineMarket {
    rng: StdRng,
    step: usize,
    horizon: usize,
    lookback: usize,
}

impl SineMarket {
    fn new(seed: u64, horizon: usize, lookback: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            step: 0,
            horizon,
            lookback,
        }
    }

    fn price(&self, asset: usize, t: usize) -> f32 {
        let phase = asset as f32 * std::f32::consts::FRAC_PI_2;
        (t as f32 * 0.13 + phase).sin()
    }

    fn observe(&mut self) -> Observation {
        let mut data = Array2::zeros((2, self.lookback));
        for asset in 0..2 {
            for k in 0..self.lookback {
                let t = self.step + k;
                let ret = self.price(asset, t + 1) - self.price(asset, t);
                data[[asset, k]] = ret + self.rng.gen_range(-0.01..0.01);
            }
        }
        Observation::new(data)
    }

    /// Apply the joint action, advance one step.
    fn advance(&mut self, action: &JointAction) -> (f32, Observation, bool) {
        let t = self.step + self.lookback;
        let mut reward = 0.0_f32;
        for (asset, &a) in action.as_slice().iter().enumerate() {
            let position = a as f32 - 1.0;
            reward += position * (self.price(asset, t + 1) - self.price(asset, t));
        }
        reward /= 2.0;

        self.step += 1;
        let done = self.step >= self.horizon;
        (reward, self.observe(), done)
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = AgentConfig {
        universe_size: 2,
        feature_size: 8,
        action_size: 3,
        memory_size: 2048,
        batch_size: 32,
        gamma: 0.9,
        max_grad_norm: 5.0,
        learning_rate: 1e-3,
    };
    let network = NetworkConfig {
        hidden: vec![32, 32],
        activation: Activation::Tanh,
    };

    let value = DenseQNetwork::new("value", &config, &network, 1)?;
    let target = DenseQNetwork::new("target", &config, &network, 2)?;
    let mut estimator = ValueEstimator::seeded(config.clone(), Box::new(value), Box::new(target), 3)?;
    // Start training against a coherent target
    estimator.update_target_net()?;

    let mut selector = PolicySelector::seeded(config.action_size, 4);
    // Exploitation probability anneals UP: explore early, exploit late
    let epsilon = EpsilonSchedule::Linear {
        start: 0.5,
        end: 0.95,
        steps: EPISODES * STEPS_PER_EPISODE / 2,
    };

    let mut global_step = 0;
    let mut updates = 0;

    for episode in 0..EPISODES {
        let mut market = SineMarket::new(episode as u64, STEPS_PER_EPISODE, config.feature_size);
        let mut observation = market.observe();
        let mut total_reward = 0.0_f32;
        let mut losses = Vec::new();

        loop {
            let values = estimator.step_values(&observation)?;
            let action = selector.stochastic(&values.view(), epsilon.value(global_step))?;
            let (reward, next_observation, done) = market.advance(&action);
            total_reward += reward;

            estimator.record(Transition::new(
                observation,
                action,
                reward,
                next_observation.clone(),
                done,
            ))?;
            observation = next_observation;
            global_step += 1;

            if estimator.memory().len() >= WARMUP {
                losses.push(estimator.update_value_net()?);
                updates += 1;
                if updates % TARGET_UPDATE_PERIOD == 0 {
                    estimator.update_target_net()?;
                }
            }

            if done {
                break;
            }
        }

        let avg_loss = if losses.is_empty() {
            0.0
        } else {
            losses.iter().sum::<f64>() / losses.len() as f64
        };
        println!(
            "Episode {}: Total Reward = {:.3}, Avg Loss = {:.5}, Epsilon = {:.2}",
            episode + 1,
            total_reward,
            avg_loss,
            epsilon.value(global_step)
        );
    }

    let path = std::path::Path::new("tradeq-checkpoint.json");
    estimator.save(path)?;
    println!("\nSaved estimator state to {}", path.display());

    Ok(())
}
