use pricing_dqn::config::{DiscretizationConfig, EnvironmentConfig, RewardWeights};
use pricing_dqn::rl::core::{PriceActionSpace, RetailRow, StateEncoder};
use pricing_dqn::rl::{PricingEnvironment, STATE_DIM};
use pricing_dqn::PricingError;

fn retail_rows() -> Vec<RetailRow> {
    (0..100)
        .map(|i| RetailRow::new(10.0, 100.0, 10.0, (i % 12) as u32 + 1))
        .collect()
}

fn environment(seed: u64) -> PricingEnvironment {
    let config = EnvironmentConfig {
        reward_weights: RewardWeights {
            revenue: 0.4,
            margin: 0.4,
            volume: 0.2,
        },
        ..Default::default()
    };
    let actions = PriceActionSpace::new(vec![0.8, 0.9, 1.0, 1.1, 1.2]).unwrap();
    PricingEnvironment::new(retail_rows(), &config, actions, DiscretizationConfig::default())
        .unwrap()
        .with_seed(seed)
}

/// The neutral multiplier sells the base quantity at the base price.
#[test]
fn neutral_multiplier_keeps_base_price_and_quantity() {
    let mut env = environment(11);
    env.reset();

    let step = env.step(2, false).unwrap();
    assert!((step.info.price - 100.0).abs() < 1e-9);
    assert!((step.info.volume - 10.0).abs() < 1e-9);
    assert!((step.info.revenue - 100.0 * step.info.volume).abs() < 1e-9);
    assert_eq!(step.signal.stability_penalty, 0.0);
    assert!(!step.done);
}

/// A large price swing scores below holding the price, from the same start.
#[test]
fn price_swing_scores_below_steady_price() {
    let mut swing = environment(5);
    let mut steady = environment(5);
    swing.reset();
    steady.reset();
    assert_eq!(swing.cursor(), steady.cursor());

    let swing_first = swing.step(0, false).unwrap();
    let swing_second = swing.step(4, false).unwrap();
    let steady_first = steady.step(2, false).unwrap();
    let steady_second = steady.step(2, false).unwrap();

    assert!(swing_second.signal.stability_penalty > 0.0);
    assert_eq!(steady_second.signal.stability_penalty, 0.0);
    assert!(
        swing_first.reward + swing_second.reward < steady_first.reward + steady_second.reward,
        "swing should be penalized"
    );
}

/// Continuous features stay in range for every row.
#[test]
fn encoded_features_are_bounded() {
    let env = environment(0);
    let rows = retail_rows();
    for row in &rows {
        let features = env.encoder().encode_continuous(row);
        assert_eq!(features.len(), STATE_DIM);
        for (i, value) in features.iter().enumerate() {
            if i == 2 || i == 3 {
                assert!((-1.0..=1.0).contains(value));
            } else {
                assert!((0.0..=1.0).contains(value), "feature {i} = {value}");
            }
        }
    }
}

/// The discrete midpoint mapping preserves the season quadrant signs.
#[test]
fn discrete_round_trip_keeps_season_signs() {
    let env = environment(0);
    for month in [1, 4, 7, 10] {
        let row = RetailRow::new(10.0, 100.0, 10.0, month);
        let direct = env.encoder().encode_continuous(&row);
        let approx = env
            .encoder()
            .discrete_to_continuous(&env.encoder().encode_discrete(&row));
        for i in [2, 3] {
            assert_eq!(
                direct[i].abs() < 1e-6,
                approx[i].abs() < 1e-6,
                "month {month} feature {i}"
            );
            if direct[i].abs() >= 1e-6 {
                assert_eq!(direct[i].signum(), approx[i].signum());
            }
        }
    }
}

/// Stepping before reset is rejected instead of reading a stale cursor.
#[test]
fn step_requires_reset() {
    let mut env = environment(0);
    assert!(matches!(
        env.step(0, false),
        Err(PricingError::EnvironmentNotReset)
    ));
    env.reset();
    assert!(matches!(
        env.step(9, false),
        Err(PricingError::InvalidAction { action: 9, .. })
    ));
}

/// A dimension with no bins cannot be sampled, so construction fails.
#[test]
fn zero_bin_dimension_is_rejected() {
    let actions = PriceActionSpace::new(vec![0.9, 1.0, 1.1]).unwrap();
    let bins = DiscretizationConfig {
        demand_bins: 0,
        ..Default::default()
    };
    let config = EnvironmentConfig::default();
    let result = PricingEnvironment::new(retail_rows(), &config, actions, bins);
    assert!(matches!(result, Err(PricingError::InvalidConfig(_))));
}

/// Synthetic steps neither advance the cursor nor count as a price change.
#[test]
fn synthetic_steps_leave_real_trajectory_untouched() {
    let mut env = environment(21);
    env.reset();
    env.step(2, false).unwrap();
    let cursor = env.cursor();

    let synthetic = env.step(4, true).unwrap();
    assert!(synthetic.synthetic);
    assert_eq!(env.cursor(), cursor);
    assert_eq!(env.last_action(), Some(2));

    let real = env.step(2, false).unwrap();
    assert_eq!(real.signal.stability_penalty, 0.0);
}
