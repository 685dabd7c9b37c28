//! Core types for the TradeQ market timing framework
//!
//! This crate provides the data model shared by the TradeQ crates:
//! observations over an asset universe, joint actions, transition records,
//! the agent configuration and the common error type.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod config;
pub mod error;
pub mod observation;
pub mod transition;

// Re-export core types
pub use action::JointAction;
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use observation::Observation;
pub use transition::Transition;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{AgentConfig, AgentError, JointAction, Observation, Result, Transition};
}
