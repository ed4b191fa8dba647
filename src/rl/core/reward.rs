//! Reward Functions
//!
//! Defines reward signals and functions for RL training.
//!
//! The reward blends min-max normalized revenue and margin with a
//! threshold-shaped volume credit, minus a price-stability penalty.

use serde::{Deserialize, Serialize};

pub use crate::rl::config::RewardWeights;
use crate::rl::core::state::{BaseStats, NormRange};

/// Normalized volume at or above which volume earns full credit
pub const VOLUME_CREDIT_THRESHOLD: f64 = 0.35;

/// Outcome of selling at a given price for one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleOutcome {
    /// price * quantity
    pub revenue: f64,
    /// (price - cost) * quantity
    pub margin: f64,
    /// Quantity sold
    pub volume: f64,
    /// Price charged
    pub price: f64,
}

/// Reward signal components
///
/// Breaking the reward into components makes it easy to see which term
/// is driving the agent's behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardSignal {
    /// Normalized revenue
    pub revenue: f64,
    /// Normalized margin
    pub margin: f64,
    /// Threshold-shaped volume credit
    pub volume_credit: f64,
    /// Price stability penalty (already weighted)
    pub stability_penalty: f64,
    /// Weighted blend minus penalty
    pub total: f64,
}

/// Normalization ranges for the reward terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardRanges {
    pub revenue: NormRange,
    pub margin: NormRange,
    pub volume: NormRange,
}

impl RewardRanges {
    /// Ranges scaled around the dataset baseline
    ///
    /// Prices span 0.95-1.30x base and quantities 0.6-1.1x base for revenue
    /// and margin; volume spans 0.3-1.2x base quantity.
    pub fn from_base(base: &BaseStats) -> Self {
        let (bp, bc, bq) = (base.price, base.cost, base.quantity);
        Self {
            revenue: NormRange::new(bp * 0.95 * bq * 0.6, bp * 1.30 * bq * 1.1),
            margin: NormRange::new((bp * 0.95 - bc) * bq * 0.6, (bp * 1.30 - bc) * bq * 1.1),
            volume: NormRange::new(bq * 0.3, bq * 1.2),
        }
    }
}

/// Full credit once normalized volume reaches the threshold, linear ramp below
pub fn volume_credit(normalized_volume: f64) -> f64 {
    if normalized_volume >= VOLUME_CREDIT_THRESHOLD {
        1.0
    } else {
        normalized_volume / VOLUME_CREDIT_THRESHOLD
    }
}

/// Weighted blend of normalized revenue, margin and volume credit
pub fn compute_reward(
    revenue: f64,
    margin: f64,
    volume: f64,
    weights: &RewardWeights,
    ranges: &RewardRanges,
) -> f64 {
    let norm_revenue = ranges.revenue.normalize(revenue);
    let norm_margin = ranges.margin.normalize(margin);
    let credit = volume_credit(ranges.volume.normalize(volume));

    weights.revenue * norm_revenue + weights.margin * norm_margin + weights.volume * credit
}

/// Penalty for moving the price multiplier
///
/// `weight * |current - previous| / previous`; zero on the first step or
/// when the previous multiplier is not positive.
pub fn compute_price_change_penalty(previous: Option<f64>, current: f64, weight: f64) -> f64 {
    match previous {
        Some(prev) if prev > 0.0 => weight * (current - prev).abs() / prev,
        _ => 0.0,
    }
}

/// Trait for computing rewards
pub trait RewardFunction: Send + Sync {
    /// Score one step given the sale outcome and the multiplier change
    fn compute(
        &self,
        outcome: &SaleOutcome,
        previous_multiplier: Option<f64>,
        multiplier: f64,
    ) -> RewardSignal;
}

/// Revenue/margin/volume blend with a price-stability penalty
#[derive(Debug, Clone)]
pub struct BlendedRewardFunction {
    weights: RewardWeights,
    ranges: RewardRanges,
    penalty_weight: f64,
}

impl BlendedRewardFunction {
    pub fn new(weights: RewardWeights, ranges: RewardRanges, penalty_weight: f64) -> Self {
        Self {
            weights,
            ranges,
            penalty_weight,
        }
    }

    pub fn ranges(&self) -> &RewardRanges {
        &self.ranges
    }

    pub fn weights(&self) -> &RewardWeights {
        &self.weights
    }
}

impl RewardFunction for BlendedRewardFunction {
    fn compute(
        &self,
        outcome: &SaleOutcome,
        previous_multiplier: Option<f64>,
        multiplier: f64,
    ) -> RewardSignal {
        let revenue = self.ranges.revenue.normalize(outcome.revenue);
        let margin = self.ranges.margin.normalize(outcome.margin);
        let credit = volume_credit(self.ranges.volume.normalize(outcome.volume));
        let stability_penalty =
            compute_price_change_penalty(previous_multiplier, multiplier, self.penalty_weight);

        let blended = compute_reward(
            outcome.revenue,
            outcome.margin,
            outcome.volume,
            &self.weights,
            &self.ranges,
        );

        RewardSignal {
            revenue,
            margin,
            volume_credit: credit,
            stability_penalty,
            total: blended - stability_penalty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges() -> RewardRanges {
        RewardRanges {
            revenue: NormRange::new(50.0, 150.0),
            margin: NormRange::new(20.0, 80.0),
            volume: NormRange::new(5.0, 15.0),
        }
    }

    #[test]
    fn test_reward_blend() {
        let weights = RewardWeights::default();
        // rev 0.5, margin 0.5, volume 0.5 >= threshold -> credit 1.0
        let reward = compute_reward(100.0, 50.0, 10.0, &weights, &ranges());
        assert!((reward - (0.4 * 0.5 + 0.4 * 0.5 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_reward_monotonic_in_revenue_and_margin() {
        let weights = RewardWeights::default();
        let r = ranges();
        let mut last = f64::NEG_INFINITY;
        for revenue in (0..30).map(|i| 40.0 + i as f64 * 5.0) {
            let reward = compute_reward(revenue, 50.0, 10.0, &weights, &r);
            assert!(reward >= last);
            last = reward;
        }
        let mut last = f64::NEG_INFINITY;
        for margin in (0..30).map(|i| 10.0 + i as f64 * 3.0) {
            let reward = compute_reward(100.0, margin, 10.0, &weights, &r);
            assert!(reward >= last);
            last = reward;
        }
    }

    #[test]
    fn test_volume_credit_threshold() {
        assert_eq!(volume_credit(0.35), 1.0);
        assert_eq!(volume_credit(0.9), 1.0);
        assert!((volume_credit(0.175) - 0.5).abs() < 1e-12);

        let mut last = volume_credit(-0.1);
        for i in 0..35 {
            let credit = volume_credit(i as f64 / 100.0);
            assert!(credit > last);
            last = credit;
        }
    }

    #[test]
    fn test_degenerate_ranges() {
        let flat = RewardRanges {
            revenue: NormRange::new(1.0, 1.0),
            margin: NormRange::new(1.0, 1.0),
            volume: NormRange::new(1.0, 1.0),
        };
        let reward = compute_reward(5.0, 5.0, 5.0, &RewardWeights::default(), &flat);
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn test_price_change_penalty() {
        for m in [0.5, 1.0, 1.6] {
            assert_eq!(compute_price_change_penalty(Some(m), m, 0.15), 0.0);
        }
        assert_eq!(compute_price_change_penalty(None, 1.4, 0.15), 0.0);
        assert_eq!(compute_price_change_penalty(Some(0.0), 1.4, 0.15), 0.0);

        let small = compute_price_change_penalty(Some(1.0), 1.1, 0.15);
        let large = compute_price_change_penalty(Some(1.0), 1.2, 0.15);
        assert!((small - 0.015).abs() < 1e-12);
        assert!((large - 2.0 * small).abs() < 1e-12);
    }

    #[test]
    fn test_blended_reward_subtracts_penalty() {
        let function = BlendedRewardFunction::new(RewardWeights::default(), ranges(), 0.15);
        let outcome = SaleOutcome {
            revenue: 100.0,
            margin: 50.0,
            volume: 10.0,
            price: 10.0,
        };
        let steady = function.compute(&outcome, Some(1.0), 1.0);
        let swing = function.compute(&outcome, Some(0.8), 1.2);

        assert_eq!(steady.stability_penalty, 0.0);
        assert!((swing.stability_penalty - 0.15 * 0.5).abs() < 1e-12);
        assert!((steady.total - swing.total - swing.stability_penalty).abs() < 1e-12);
    }

    #[test]
    fn test_ranges_from_base() {
        let base = BaseStats {
            price: 100.0,
            cost: 10.0,
            quantity: 10.0,
        };
        let r = RewardRanges::from_base(&base);
        assert!((r.revenue.min - 570.0).abs() < 1e-9);
        assert!((r.revenue.max - 1430.0).abs() < 1e-9);
        assert!((r.margin.min - 510.0).abs() < 1e-9);
        assert!((r.volume.max - 12.0).abs() < 1e-9);
    }
}
