//! Retail pricing environment
//!
//! Gym-like environment over historical retail rows. Each step prices the
//! product at `base_price * multiplier[action]`, predicts demand with a
//! state-dependent elasticity model, and scores the sale.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::demand::{DemandModel, SYNTHETIC_NOISE};
use crate::error::{PricingError, Result};
use crate::rl::config::{DiscretizationConfig, DqnConfig, EnvironmentConfig};
use crate::rl::core::{
    BaseStats, BlendedRewardFunction, ContinuousState, DiscreteState, PriceActionSpace,
    QuantileStateEncoder, RetailRow, RewardFunction, RewardRanges, RewardSignal, SaleOutcome,
    StateEncoder,
};

/// Result of taking a step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Observation after the action
    pub next_state: ContinuousState,
    /// Scalar reward (blend minus stability penalty)
    pub reward: f64,
    /// Always false; episode length is controlled by the caller
    pub done: bool,
    /// Revenue, margin, volume and price of the step
    pub info: SaleOutcome,
    /// Reward breakdown
    pub signal: RewardSignal,
    /// Whether the synthetic path produced this step
    pub synthetic: bool,
}

/// Pricing environment for RL training
///
/// Two states: awaiting reset (no cursor) and active. `reset` moves into
/// the active state from either; `step` fails until the first reset.
pub struct PricingEnvironment {
    rows: Vec<RetailRow>,
    encoder: QuantileStateEncoder,
    actions: PriceActionSpace,
    reward_fn: BlendedRewardFunction,
    demand: DemandModel,
    cursor: Option<usize>,
    last_action: Option<usize>,
    rng: StdRng,
}

impl PricingEnvironment {
    /// Create a new environment seeded from entropy
    pub fn new(
        rows: Vec<RetailRow>,
        config: &EnvironmentConfig,
        actions: PriceActionSpace,
        bins: DiscretizationConfig,
    ) -> Result<Self> {
        let encoder = QuantileStateEncoder::new(&rows, bins)?;
        let base = *encoder.base_stats();
        let ranges = RewardRanges::from_base(&base);
        let reward_fn =
            BlendedRewardFunction::new(config.reward_weights, ranges, config.price_change_penalty);
        let demand = DemandModel::new(*encoder.layout(), base.price);

        debug!(
            "Pricing environment: {} rows, {} actions, extended={}, base_price={:.2}",
            rows.len(),
            actions.len(),
            encoder.is_extended(),
            base.price
        );

        Ok(Self {
            rows,
            encoder,
            actions,
            reward_fn,
            demand,
            cursor: None,
            last_action: None,
            rng: StdRng::from_entropy(),
        })
    }

    /// Create from the full DQN configuration, seeding from `training.seed`
    pub fn from_config(rows: Vec<RetailRow>, config: &DqnConfig) -> Result<Self> {
        let actions = PriceActionSpace::new(config.actions.multipliers.clone())?;
        let env = Self::new(rows, &config.environment, actions, config.discretization)?;
        Ok(match config.training.seed {
            Some(seed) => env.with_seed(seed),
            None => env,
        })
    }

    /// Reseed the environment's random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Reset to a uniformly random row and clear the last action
    pub fn reset(&mut self) -> ContinuousState {
        let idx = self.rng.gen_range(0..self.rows.len());
        self.cursor = Some(idx);
        self.last_action = None;
        self.encoder.encode_continuous(&self.rows[idx])
    }

    /// Take a step on the real-data or synthetic path
    pub fn step(&mut self, action: usize, use_synthetic: bool) -> Result<StepResult> {
        let cursor = self.cursor.ok_or(PricingError::EnvironmentNotReset)?;
        let multiplier = self.actions.multiplier(action)?;

        if use_synthetic {
            self.synthetic_step(multiplier)
        } else {
            self.real_step(cursor, action, multiplier)
        }
    }

    fn real_step(&mut self, cursor: usize, action: usize, multiplier: f64) -> Result<StepResult> {
        let row = &self.rows[cursor];
        let discrete = self.encoder.encode_discrete(row);
        let price = self.base_stats().price * multiplier;

        let base_quantity = if self.encoder.is_extended() && row.demand_forecast > 0.0 {
            row.demand_forecast
        } else {
            row.quantity
        };
        let quantity = self.demand.predict(base_quantity, price, &discrete);

        let info = self.outcome(price, quantity);
        let signal = self
            .reward_fn
            .compute(&info, self.previous_multiplier(), multiplier);
        self.last_action = Some(action);

        let next = (cursor + 1) % self.rows.len();
        self.cursor = Some(next);

        Ok(StepResult {
            next_state: self.encoder.encode_continuous(&self.rows[next]),
            reward: signal.total,
            done: false,
            info,
            signal,
            synthetic: false,
        })
    }

    fn synthetic_step(&mut self, multiplier: f64) -> Result<StepResult> {
        let discrete: DiscreteState = self.encoder.layout().sample(&mut self.rng);
        let next_state = self.encoder.discrete_to_continuous(&discrete);
        let price = self.base_stats().price * multiplier;

        let base_quantity =
            self.base_stats().quantity * self.demand.synthetic_demand_scale(discrete.demand);
        let noise = self
            .rng
            .gen_range((1.0 - SYNTHETIC_NOISE)..(1.0 + SYNTHETIC_NOISE));
        let quantity = self
            .demand
            .predict_scaled(base_quantity, price, &discrete, noise);

        let info = self.outcome(price, quantity);
        let signal = self
            .reward_fn
            .compute(&info, self.previous_multiplier(), multiplier);
        // last_action is left untouched so switching between the real and
        // synthetic regimes is not charged as a price change

        Ok(StepResult {
            next_state,
            reward: signal.total,
            done: false,
            info,
            signal,
            synthetic: true,
        })
    }

    fn outcome(&self, price: f64, quantity: f64) -> SaleOutcome {
        SaleOutcome {
            revenue: price * quantity,
            margin: (price - self.base_stats().cost) * quantity,
            volume: quantity,
            price,
        }
    }

    fn previous_multiplier(&self) -> Option<f64> {
        self.last_action
            .and_then(|a| self.actions.multipliers().get(a).copied())
    }

    /// Current row index, if active
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Last real-data action, if any since reset
    pub fn last_action(&self) -> Option<usize> {
        self.last_action
    }

    pub fn encoder(&self) -> &QuantileStateEncoder {
        &self.encoder
    }

    pub fn action_space(&self) -> &PriceActionSpace {
        &self.actions
    }

    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn state_dim(&self) -> usize {
        self.encoder.state_dim()
    }

    pub fn base_stats(&self) -> &BaseStats {
        self.encoder.base_stats()
    }

    pub fn reward_ranges(&self) -> &RewardRanges {
        self.reward_fn.ranges()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}
