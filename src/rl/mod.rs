//! Reinforcement Learning Module
//!
//! Double DQN for discrete retail price adjustment, built on the Burn
//! framework.
//!
//! # Features
//!
//! - **State Representation**: retail rows encoded as 9 continuous features
//!   or a discrete bin tuple
//! - **Action Space**: discrete multipliers of the base price
//! - **Environment**: historical replay with a synthetic coverage path
//! - **Memory**: prioritized experience replay
//! - **Algorithm**: Double DQN with soft target updates

pub mod config;
pub mod core;
pub mod environment;
pub mod memory;
pub mod networks;
pub mod training;

// Config exports
pub use config::{DqnConfig, TrainingConfig};

// Core exports
pub use core::{
    BinLayout, BlendedRewardFunction, ContinuousState, DiscreteState, PriceActionSpace,
    QuantileStateEncoder, RetailRow, RewardFunction, RewardSignal, StateEncoder, STATE_DIM,
};

// Memory exports
pub use memory::{ReplayBuffer, Transition};

// Environment exports
pub use environment::{PricingEnvironment, StepResult};

// Network exports
pub use networks::{QNetwork, QNetworkConfig, QValueModel};

// Training exports
pub use training::{dqn_trainer, DqnTrainer, TrainingReport};
