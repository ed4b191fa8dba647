//! State Representation
//!
//! Defines the observation/state space for the pricing agent.
//! Raw retail rows are encoded either into discrete bins (used for
//! synthetic sampling, elasticity and policy export) or into a fixed
//! 9-dimensional continuous vector consumed by the Q-network.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{PricingError, Result};
use crate::rl::config::DiscretizationConfig;

/// Total number of features in the continuous state
pub const STATE_DIM: usize = 9;

/// Season is always split into four quarters
pub const SEASON_BINS: usize = 4;

/// Representative month for each season bin
pub const SEASON_MONTHS: [u32; SEASON_BINS] = [1, 4, 7, 10];

/// Neutral feature value used when a field cannot be observed
pub const NEUTRAL_FEATURE: f32 = 0.5;

/// Fraction of rows that must carry a non-zero inventory and forecast
/// for the encoder to switch to extended mode
pub const EXTENDED_MODE_MIN_FRACTION: f64 = 0.1;

/// Continuous state vector
///
/// Layout: `[demand, competitor, season_sin, season_cos, lag_price,
/// inventory, forecast, margin_potential, price_ratio]`
pub type ContinuousState = [f32; STATE_DIM];

/// One historical retail observation
///
/// Optional columns are stored as 0.0 when absent; the encoder treats an
/// exact zero as "missing" for competitor, lag, inventory and forecast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetailRow {
    /// Units sold
    pub quantity: f64,
    /// Unit selling price
    pub unit_price: f64,
    /// Per-unit freight cost, used as the cost basis
    pub freight_cost: f64,
    /// Calendar month (1-12)
    pub month: u32,
    /// Competitor price (0 when missing)
    pub competitor_price: f64,
    /// Previous period price (0 when missing)
    pub lag_price: f64,
    /// Inventory on hand (0 when missing)
    pub inventory_level: f64,
    /// Forecast demand (0 when missing)
    pub demand_forecast: f64,
}

impl RetailRow {
    /// Create a row with only the required fields set
    pub fn new(quantity: f64, unit_price: f64, freight_cost: f64, month: u32) -> Self {
        Self {
            quantity,
            unit_price,
            freight_cost,
            month,
            ..Default::default()
        }
    }
}

/// Discretized state: one bin index per feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscreteState {
    pub demand: usize,
    pub competitor: usize,
    pub season: usize,
    pub lag_price: usize,
    pub inventory: usize,
    pub forecast: usize,
}

/// Map a calendar month to its season bin
///
/// Dec-Feb = 0 (winter), Mar-May = 1, Jun-Aug = 2 (summer), Sep-Nov = 3.
pub fn season_of_month(month: u32) -> usize {
    match month {
        12 | 0..=2 => 0,
        3..=5 => 1,
        6..=8 => 2,
        _ => 3,
    }
}

/// Cyclical (sin, cos) encoding of a month
pub fn season_features(month: u32) -> (f32, f32) {
    let angle = 2.0 * PI * month as f64 / 12.0;
    (angle.sin() as f32, angle.cos() as f32)
}

/// Closed interval used for min-max scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormRange {
    pub min: f64,
    pub max: f64,
}

impl NormRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range spanning the given values, or `fallback` when there are none
    fn of(values: &[f64], fallback: NormRange) -> Self {
        if values.is_empty() {
            return fallback;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { min, max }
    }

    /// Width of the range
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Min-max scale `value`; a zero-width range maps everything to 0
    pub fn normalize(&self, value: f64) -> f64 {
        let width = self.width();
        if width == 0.0 || !width.is_finite() {
            return 0.0;
        }
        (value - self.min) / width
    }

    /// Min-max scale and clamp to [0, 1]
    pub fn normalize_clamped(&self, value: f64) -> f64 {
        self.normalize(value).clamp(0.0, 1.0)
    }
}

impl Default for NormRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Dataset means used as the pricing baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseStats {
    /// Mean unit price
    pub price: f64,
    /// Mean freight cost
    pub cost: f64,
    /// Mean quantity
    pub quantity: f64,
}

impl BaseStats {
    fn from_rows(rows: &[RetailRow]) -> Self {
        let n = rows.len() as f64;
        let mean = |f: fn(&RetailRow) -> f64| rows.iter().map(f).sum::<f64>() / n;
        Self {
            price: mean(|r| r.unit_price),
            cost: mean(|r| r.freight_cost),
            quantity: mean(|r| r.quantity),
        }
    }
}

/// Shape of the discrete state space
///
/// Carries everything needed to map bins back to continuous features, so a
/// trained policy can be exported without the original dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinLayout {
    pub demand_bins: usize,
    pub competitor_bins: usize,
    pub lag_price_bins: usize,
    pub inventory_bins: usize,
    pub forecast_bins: usize,
    /// Whether inventory and forecast take part in the state
    pub extended: bool,
}

impl BinLayout {
    pub fn new(bins: DiscretizationConfig, extended: bool) -> Self {
        Self {
            demand_bins: bins.demand_bins,
            competitor_bins: bins.competitor_bins,
            lag_price_bins: bins.lag_price_bins,
            inventory_bins: bins.inventory_bins,
            forecast_bins: bins.forecast_bins,
            extended,
        }
    }

    /// Number of points in the discrete state space
    pub fn total_states(&self) -> usize {
        let base = self.demand_bins * self.competitor_bins * SEASON_BINS * self.lag_price_bins;
        if self.extended {
            base * self.inventory_bins * self.forecast_bins
        } else {
            base
        }
    }

    /// Every discrete state, in nested order
    /// demand x competitor x season x lag x (inventory x forecast)
    pub fn states(&self) -> Vec<DiscreteState> {
        let (inv_bins, fcst_bins) = if self.extended {
            (self.inventory_bins, self.forecast_bins)
        } else {
            (1, 1)
        };

        let mut states = Vec::with_capacity(self.total_states());
        for demand in 0..self.demand_bins {
            for competitor in 0..self.competitor_bins {
                for season in 0..SEASON_BINS {
                    for lag_price in 0..self.lag_price_bins {
                        for inventory in 0..inv_bins {
                            for forecast in 0..fcst_bins {
                                states.push(DiscreteState {
                                    demand,
                                    competitor,
                                    season,
                                    lag_price,
                                    inventory,
                                    forecast,
                                });
                            }
                        }
                    }
                }
            }
        }
        states
    }

    /// Draw a uniformly random discrete state
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DiscreteState {
        let demand = rng.gen_range(0..self.demand_bins);
        let competitor = rng.gen_range(0..self.competitor_bins);
        let season = rng.gen_range(0..SEASON_BINS);
        let lag_price = rng.gen_range(0..self.lag_price_bins);
        let (inventory, forecast) = if self.extended {
            (
                rng.gen_range(0..self.inventory_bins),
                rng.gen_range(0..self.forecast_bins),
            )
        } else {
            (0, 0)
        };

        DiscreteState {
            demand,
            competitor,
            season,
            lag_price,
            inventory,
            forecast,
        }
    }

    /// Approximate continuous features for a discrete state
    ///
    /// This is lossy and not a true inverse of the encoder: each bin maps to
    /// its interval midpoint `(b + 0.5) / n`, season maps to a representative
    /// month, and the derived margin and price-ratio features are fixed at the
    /// neutral value.
    pub fn discrete_to_continuous(&self, state: &DiscreteState) -> ContinuousState {
        let midpoint = |bin: usize, bins: usize| (bin as f32 + 0.5) / bins.max(1) as f32;

        let month = SEASON_MONTHS[state.season.min(SEASON_BINS - 1)];
        let (season_sin, season_cos) = season_features(month);

        let (inventory, forecast) = if self.extended {
            (
                midpoint(state.inventory, self.inventory_bins),
                midpoint(state.forecast, self.forecast_bins),
            )
        } else {
            (NEUTRAL_FEATURE, NEUTRAL_FEATURE)
        };

        [
            midpoint(state.demand, self.demand_bins),
            midpoint(state.competitor, self.competitor_bins),
            season_sin,
            season_cos,
            midpoint(state.lag_price, self.lag_price_bins),
            inventory,
            forecast,
            NEUTRAL_FEATURE,
            NEUTRAL_FEATURE,
        ]
    }
}

/// Trait for encoding retail rows into agent states
pub trait StateEncoder: Send + Sync {
    /// Bin a row into a discrete state
    fn encode_discrete(&self, row: &RetailRow) -> DiscreteState;

    /// Encode a row into the continuous feature vector
    fn encode_continuous(&self, row: &RetailRow) -> ContinuousState;

    /// Get the output dimension
    fn state_dim(&self) -> usize {
        STATE_DIM
    }
}

/// Quantile-binned state encoder
///
/// Thresholds, normalization ranges and base statistics are fit once over
/// the full dataset at construction and never change afterwards.
#[derive(Debug, Clone)]
pub struct QuantileStateEncoder {
    layout: BinLayout,
    base: BaseStats,

    demand_thresholds: Vec<f64>,
    competitor_thresholds: Vec<f64>,
    lag_thresholds: Vec<f64>,
    inventory_thresholds: Vec<f64>,
    forecast_thresholds: Vec<f64>,

    quantity_range: NormRange,
    price_range: NormRange,
    competitor_range: NormRange,
    lag_range: NormRange,
    inventory_range: NormRange,
    forecast_range: NormRange,
}

impl QuantileStateEncoder {
    /// Fit an encoder over the full row set
    pub fn new(rows: &[RetailRow], bins: DiscretizationConfig) -> Result<Self> {
        if rows.is_empty() {
            return Err(PricingError::EmptyDataset);
        }
        if let Some(name) = bins.first_empty_dimension() {
            return Err(PricingError::InvalidConfig(format!(
                "discretization.{} must be positive",
                name
            )));
        }

        let quantities: Vec<f64> = rows.iter().map(|r| r.quantity).collect();
        let prices: Vec<f64> = rows.iter().map(|r| r.unit_price).collect();
        let competitors = non_zero(rows, |r| r.competitor_price);
        let lags = non_zero(rows, |r| r.lag_price);
        let inventories = non_zero(rows, |r| r.inventory_level);
        let forecasts = non_zero(rows, |r| r.demand_forecast);

        let min_count = rows.len() as f64 * EXTENDED_MODE_MIN_FRACTION;
        let extended =
            inventories.len() as f64 > min_count && forecasts.len() as f64 > min_count;

        // Missing competitor/lag data falls back to a unit placeholder range
        let placeholder = [0.0, 1.0];
        let or_placeholder = |v: &[f64]| -> Vec<f64> {
            if v.is_empty() {
                placeholder.to_vec()
            } else {
                v.to_vec()
            }
        };

        let (inventory_thresholds, forecast_thresholds) = if extended {
            (
                quantile_thresholds(&inventories, bins.inventory_bins),
                quantile_thresholds(&forecasts, bins.forecast_bins),
            )
        } else {
            (vec![0.0], vec![0.0])
        };

        let (inventory_range, forecast_range) = if extended {
            (
                NormRange::of(&inventories, NormRange::default()),
                NormRange::of(&forecasts, NormRange::default()),
            )
        } else {
            (NormRange::default(), NormRange::default())
        };

        Ok(Self {
            layout: BinLayout::new(bins, extended),
            base: BaseStats::from_rows(rows),
            demand_thresholds: quantile_thresholds(&quantities, bins.demand_bins),
            competitor_thresholds: quantile_thresholds(
                &or_placeholder(&competitors),
                bins.competitor_bins,
            ),
            lag_thresholds: quantile_thresholds(&or_placeholder(&lags), bins.lag_price_bins),
            inventory_thresholds,
            forecast_thresholds,
            quantity_range: NormRange::of(&quantities, NormRange::default()),
            price_range: NormRange::of(&prices, NormRange::default()),
            competitor_range: NormRange::of(&competitors, NormRange::default()),
            lag_range: NormRange::of(&lags, NormRange::default()),
            inventory_range,
            forecast_range,
        })
    }

    /// Shape of the discrete state space
    pub fn layout(&self) -> &BinLayout {
        &self.layout
    }

    /// Dataset mean price, cost and quantity
    pub fn base_stats(&self) -> &BaseStats {
        &self.base
    }

    /// Whether inventory and forecast features are active
    pub fn is_extended(&self) -> bool {
        self.layout.extended
    }

    /// Number of points in the discrete state space
    pub fn total_discrete_states(&self) -> usize {
        self.layout.total_states()
    }

    /// Approximate continuous features for a discrete state (lossy)
    pub fn discrete_to_continuous(&self, state: &DiscreteState) -> ContinuousState {
        self.layout.discrete_to_continuous(state)
    }
}

impl StateEncoder for QuantileStateEncoder {
    fn encode_discrete(&self, row: &RetailRow) -> DiscreteState {
        let (inventory, forecast) = if self.layout.extended {
            (
                digitize(row.inventory_level, &self.inventory_thresholds),
                digitize(row.demand_forecast, &self.forecast_thresholds),
            )
        } else {
            (0, 0)
        };

        DiscreteState {
            demand: digitize(row.quantity, &self.demand_thresholds),
            competitor: digitize(row.competitor_price, &self.competitor_thresholds),
            season: season_of_month(row.month),
            lag_price: digitize(row.lag_price, &self.lag_thresholds),
            inventory,
            forecast,
        }
    }

    fn encode_continuous(&self, row: &RetailRow) -> ContinuousState {
        let (season_sin, season_cos) = season_features(row.month);

        let (inventory, forecast) = if self.layout.extended {
            (
                self.inventory_range.normalize_clamped(row.inventory_level) as f32,
                self.forecast_range.normalize_clamped(row.demand_forecast) as f32,
            )
        } else {
            (NEUTRAL_FEATURE, NEUTRAL_FEATURE)
        };

        let margin_potential = NormRange::new(0.0, self.base.price)
            .normalize_clamped(row.unit_price - row.freight_cost);

        [
            self.quantity_range.normalize_clamped(row.quantity) as f32,
            self.competitor_range.normalize_clamped(row.competitor_price) as f32,
            season_sin,
            season_cos,
            self.lag_range.normalize_clamped(row.lag_price) as f32,
            inventory,
            forecast,
            margin_potential as f32,
            self.price_range.normalize_clamped(row.unit_price) as f32,
        ]
    }
}

fn non_zero(rows: &[RetailRow], field: fn(&RetailRow) -> f64) -> Vec<f64> {
    rows.iter().map(field).filter(|v| *v > 0.0).collect()
}

/// `num_bins - 1` thresholds taken at the `floor(i / num_bins * N)`-th
/// position of the sorted values
pub fn quantile_thresholds(values: &[f64], num_bins: usize) -> Vec<f64> {
    if values.is_empty() || num_bins <= 1 {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    (1..num_bins)
        .map(|i| {
            let idx = ((i as f64 / num_bins as f64) * n as f64) as usize;
            sorted[idx.min(n - 1)]
        })
        .collect()
}

/// Index of the first threshold greater than `value`, else the last bin
pub fn digitize(value: f64, thresholds: &[f64]) -> usize {
    thresholds
        .iter()
        .position(|&t| value < t)
        .unwrap_or(thresholds.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rows(n: usize) -> Vec<RetailRow> {
        (0..n)
            .map(|i| RetailRow {
                quantity: 5.0 + (i % 10) as f64,
                unit_price: 90.0 + (i % 7) as f64 * 5.0,
                freight_cost: 10.0 + (i % 3) as f64,
                month: (i % 12) as u32 + 1,
                competitor_price: if i % 4 == 0 { 0.0 } else { 95.0 + (i % 5) as f64 },
                lag_price: 92.0 + (i % 6) as f64,
                ..Default::default()
            })
            .collect()
    }

    fn extended_rows(n: usize) -> Vec<RetailRow> {
        rows(n)
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.inventory_level = 50.0 + (i % 9) as f64 * 10.0;
                r.demand_forecast = 8.0 + (i % 5) as f64;
                r
            })
            .collect()
    }

    #[test]
    fn test_season_of_month() {
        assert_eq!(season_of_month(12), 0);
        assert_eq!(season_of_month(1), 0);
        assert_eq!(season_of_month(2), 0);
        assert_eq!(season_of_month(3), 1);
        assert_eq!(season_of_month(6), 2);
        assert_eq!(season_of_month(8), 2);
        assert_eq!(season_of_month(11), 3);
    }

    #[test]
    fn test_quantile_thresholds() {
        let values: Vec<f64> = (0..9).map(|v| v as f64).collect();
        assert_eq!(quantile_thresholds(&values, 3), vec![3.0, 6.0]);
        assert!(quantile_thresholds(&values, 1).is_empty());

        assert_eq!(digitize(2.9, &[3.0, 6.0]), 0);
        assert_eq!(digitize(3.0, &[3.0, 6.0]), 1);
        assert_eq!(digitize(100.0, &[3.0, 6.0]), 2);
    }

    #[test]
    fn test_degenerate_range_is_zero() {
        let range = NormRange::new(4.0, 4.0);
        assert_eq!(range.normalize(4.0), 0.0);
        assert_eq!(range.normalize(100.0), 0.0);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let result = QuantileStateEncoder::new(&[], DiscretizationConfig::default());
        assert!(matches!(result, Err(PricingError::EmptyDataset)));
    }

    #[test]
    fn test_zero_bins_rejected() {
        let bins = DiscretizationConfig {
            demand_bins: 0,
            ..Default::default()
        };
        let result = QuantileStateEncoder::new(&rows(20), bins);
        assert!(matches!(result, Err(PricingError::InvalidConfig(_))));

        let bins = DiscretizationConfig {
            forecast_bins: 0,
            ..Default::default()
        };
        assert!(QuantileStateEncoder::new(&rows(20), bins).is_err());
    }

    #[test]
    fn test_continuous_state_bounds() {
        let data = extended_rows(60);
        let encoder = QuantileStateEncoder::new(&data, DiscretizationConfig::default()).unwrap();

        for row in &data {
            let state = encoder.encode_continuous(row);
            assert_eq!(state.len(), STATE_DIM);
            for (i, v) in state.iter().enumerate() {
                if i == 2 || i == 3 {
                    assert!((-1.0..=1.0).contains(v));
                } else {
                    assert!((0.0..=1.0).contains(v), "feature {} = {}", i, v);
                }
            }
        }
    }

    #[test]
    fn test_extended_mode_detection() {
        let basic = QuantileStateEncoder::new(&rows(50), DiscretizationConfig::default()).unwrap();
        assert!(!basic.is_extended());
        assert_eq!(basic.total_discrete_states(), 3 * 3 * 4 * 3);

        let state = basic.encode_continuous(&rows(1)[0]);
        assert_eq!(state[5], NEUTRAL_FEATURE);
        assert_eq!(state[6], NEUTRAL_FEATURE);

        let extended =
            QuantileStateEncoder::new(&extended_rows(50), DiscretizationConfig::default())
                .unwrap();
        assert!(extended.is_extended());
        assert_eq!(extended.total_discrete_states(), 3 * 3 * 4 * 3 * 3 * 3);
    }

    #[test]
    fn test_extended_mode_needs_both_fields() {
        let data: Vec<RetailRow> = rows(50)
            .into_iter()
            .map(|mut r| {
                r.inventory_level = 100.0;
                r
            })
            .collect();
        let encoder = QuantileStateEncoder::new(&data, DiscretizationConfig::default()).unwrap();
        assert!(!encoder.is_extended());
    }

    #[test]
    fn test_discrete_roundtrip_keeps_season_quadrant() {
        let data = rows(48);
        let encoder = QuantileStateEncoder::new(&data, DiscretizationConfig::default()).unwrap();

        for row in data.iter().filter(|r| SEASON_MONTHS.contains(&r.month)) {
            let exact = encoder.encode_continuous(row);
            let approx = encoder.discrete_to_continuous(&encoder.encode_discrete(row));
            assert_eq!(exact[2].signum(), approx[2].signum());
            assert_eq!(exact[3].signum(), approx[3].signum());
        }
    }

    #[test]
    fn test_discrete_to_continuous_midpoints() {
        let layout = BinLayout::new(DiscretizationConfig::default(), false);
        let state = DiscreteState {
            demand: 2,
            competitor: 0,
            season: 2,
            lag_price: 1,
            ..Default::default()
        };
        let features = layout.discrete_to_continuous(&state);

        assert!((features[0] - 2.5 / 3.0).abs() < 1e-6);
        assert!((features[1] - 0.5 / 3.0).abs() < 1e-6);
        assert!((features[4] - 0.5).abs() < 1e-6);
        assert_eq!(features[7], NEUTRAL_FEATURE);
        assert_eq!(features[8], NEUTRAL_FEATURE);
        // July: sin(7π/6) < 0, cos(7π/6) < 0
        assert!(features[2] < 0.0 && features[3] < 0.0);
    }

    #[test]
    fn test_states_enumeration_order() {
        let layout = BinLayout::new(DiscretizationConfig::default(), false);
        let states = layout.states();

        assert_eq!(states.len(), layout.total_states());
        assert_eq!(states[0], DiscreteState::default());
        // Lag varies fastest, then season
        assert_eq!(states[1].lag_price, 1);
        assert_eq!(states[3].season, 1);
        assert_eq!(states.last().unwrap().demand, 2);
    }

    #[test]
    fn test_sample_within_layout() {
        let layout = BinLayout::new(DiscretizationConfig::default(), true);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let s = layout.sample(&mut rng);
            assert!(s.demand < 3 && s.competitor < 3 && s.season < 4);
            assert!(s.lag_price < 3 && s.inventory < 3 && s.forecast < 3);
        }
    }
}
