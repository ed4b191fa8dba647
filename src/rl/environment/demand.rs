//! Demand response model
//!
//! Exponential price elasticity modulated by market conditions.

use crate::rl::core::state::{BinLayout, DiscreteState};

/// Elasticity before state modulation
pub const BASE_ELASTICITY: f64 = 0.7;

/// Effective elasticity is clamped to this range
pub const ELASTICITY_BOUNDS: (f64, f64) = (0.05, 4.0);

/// Predicted demand never falls below one unit
pub const MIN_QUANTITY: f64 = 1.0;

/// Multiplicative noise half-width on synthetic steps
pub const SYNTHETIC_NOISE: f64 = 0.1;

/// Position of a bin within its range, in [0, 1]; 0 for single-bin features
fn bin_ratio(bin: usize, bins: usize) -> f64 {
    if bins <= 1 {
        0.0
    } else {
        bin as f64 / (bins - 1) as f64
    }
}

/// State-dependent exponential demand model
#[derive(Debug, Clone)]
pub struct DemandModel {
    layout: BinLayout,
    base_price: f64,
}

impl DemandModel {
    pub fn new(layout: BinLayout, base_price: f64) -> Self {
        Self { layout, base_price }
    }

    /// Elasticity for a discrete market state
    ///
    /// Higher demand, higher competitor prices and summer make customers
    /// less price sensitive; winter makes them more. In extended mode low
    /// inventory (scarcity) and a high forecast also reduce sensitivity.
    pub fn effective_elasticity(&self, state: &DiscreteState) -> f64 {
        let demand_factor = 1.8 - bin_ratio(state.demand, self.layout.demand_bins) * 1.2;
        let competitor_factor =
            1.6 - bin_ratio(state.competitor, self.layout.competitor_bins) * 0.8;
        let season_factor = match state.season {
            2 => 0.7,
            0 => 1.3,
            _ => 1.0,
        };

        let mut elasticity = BASE_ELASTICITY * demand_factor * competitor_factor * season_factor;

        if self.layout.extended {
            let inventory_factor =
                0.7 + bin_ratio(state.inventory, self.layout.inventory_bins) * 0.6;
            let forecast_factor = 1.2 - bin_ratio(state.forecast, self.layout.forecast_bins) * 0.4;
            elasticity *= inventory_factor * forecast_factor;
        }

        elasticity.clamp(ELASTICITY_BOUNDS.0, ELASTICITY_BOUNDS.1)
    }

    /// Relative deviation of `price` from the base price
    pub fn price_change_ratio(&self, price: f64) -> f64 {
        let base = if self.base_price == 0.0 {
            1.0
        } else {
            self.base_price
        };
        (price - self.base_price) / base
    }

    /// Quantity sold at `price`, starting from `base_quantity`
    pub fn predict(&self, base_quantity: f64, price: f64, state: &DiscreteState) -> f64 {
        self.predict_scaled(base_quantity, price, state, 1.0)
    }

    /// Like [`predict`](Self::predict) with an extra multiplicative factor
    /// applied before the one-unit floor
    pub fn predict_scaled(
        &self,
        base_quantity: f64,
        price: f64,
        state: &DiscreteState,
        factor: f64,
    ) -> f64 {
        let elasticity = self.effective_elasticity(state);
        let response = (-elasticity * self.price_change_ratio(price)).exp();
        (base_quantity * response * factor).max(MIN_QUANTITY)
    }

    /// Base quantity multiplier for a synthetic demand bin, in [0.6, 1.1]
    pub fn synthetic_demand_scale(&self, demand_bin: usize) -> f64 {
        0.6 + bin_ratio(demand_bin, self.layout.demand_bins) * 0.5
    }
}
