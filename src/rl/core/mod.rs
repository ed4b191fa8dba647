//! Core RL abstractions
//!
//! Fundamental types for state representation, actions, and rewards.

pub mod action;
pub mod reward;
pub mod state;

pub use action::PriceActionSpace;
pub use reward::{
    compute_price_change_penalty, compute_reward, volume_credit, BlendedRewardFunction,
    RewardFunction, RewardRanges, RewardSignal, RewardWeights, SaleOutcome,
    VOLUME_CREDIT_THRESHOLD,
};
pub use state::{
    season_of_month, BaseStats, BinLayout, ContinuousState, DiscreteState, NormRange,
    QuantileStateEncoder, RetailRow, StateEncoder, SEASON_BINS, STATE_DIM,
};
