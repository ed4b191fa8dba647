//! Simulated Pricing Environment for RL Training
//!
//! This module provides a gym-like environment for training pricing agents
//! on historical retail data, with a synthetic path for state coverage.

mod demand;
mod pricing;

pub use demand::{DemandModel, BASE_ELASTICITY, ELASTICITY_BOUNDS, MIN_QUANTITY, SYNTHETIC_NOISE};
pub use pricing::{PricingEnvironment, StepResult};
