//! Double deep Q-network (D3QN) agent for market timing
//!
//! This crate provides the trainable core of the TradeQ framework:
//! - [`ValueEstimator`]: double-Q targets, clipped Nadam updates, explicit
//!   target-network synchronization
//! - [`ReplayBuffer`]: bounded FIFO experience replay with uniform sampling
//! - [`PolicySelector`]: greedy and epsilon-greedy action selection, where
//!   epsilon is the probability of exploiting
//! - [`QNetwork`] and [`DenseQNetwork`]: the value-predictor seam and its
//!   per-asset MLP reference implementation
//! - [`Nadam`] and [`EpsilonSchedule`]: optimizer state and exploration
//!   annealing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod estimator;
pub mod network;
pub mod optimizer;
pub mod policy;
pub mod schedule;

// Re-export the agent surface
pub use buffer::ReplayBuffer;
pub use estimator::ValueEstimator;
pub use network::{Activation, DenseQNetwork, NetworkConfig, QNetwork};
pub use optimizer::{clip_global_norm, Nadam};
pub use policy::PolicySelector;
pub use schedule::EpsilonSchedule;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Activation, DenseQNetwork, EpsilonSchedule, NetworkConfig, PolicySelector, QNetwork,
        ReplayBuffer, ValueEstimator,
    };
    pub use tradeq_core::prelude::*;
}
