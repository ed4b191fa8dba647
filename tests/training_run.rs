use pricing_dqn::config::DqnConfig;
use pricing_dqn::rl::core::RetailRow;
use pricing_dqn::rl::training::{
    export_policy, load_online_network, read_state, EarlyStopping, InferenceBackend,
    TrainingBackend, BEST_MODEL, FINAL_MODEL,
};
use pricing_dqn::rl::{dqn_trainer, PricingEnvironment};

fn retail_rows() -> Vec<RetailRow> {
    (0..60)
        .map(|i| {
            let mut row = RetailRow::new(
                8.0 + (i % 7) as f64,
                90.0 + (i % 5) as f64 * 5.0,
                10.0,
                (i % 12) as u32 + 1,
            );
            row.competitor_price = 95.0 + (i % 3) as f64;
            row.lag_price = 92.0 + (i % 4) as f64;
            row
        })
        .collect()
}

fn small_config(checkpoint_dir: &std::path::Path) -> DqnConfig {
    let mut config = DqnConfig::default();
    config.training.episodes = 4;
    config.training.steps_per_episode = 16;
    config.training.batch_size = 8;
    config.training.warmup_steps = 16;
    config.training.train_frequency = 2;
    config.training.seed = Some(1234);
    config.replay.buffer_size = 256;
    config.network.hidden_dims = vec![16, 16];
    config.early_stopping.window_size = 2;
    config.logging.checkpoint_dir = checkpoint_dir.display().to_string();
    config
}

/// A short run writes both bundles and a resumed run continues the counters.
#[test]
fn train_checkpoint_and_resume() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    let env = PricingEnvironment::from_config(retail_rows(), &config).unwrap();
    let mut trainer = dqn_trainer::<TrainingBackend>(env, config.clone(), Default::default()).unwrap();
    let report = trainer.train().unwrap();

    assert_eq!(report.episodes, 4);
    assert_eq!(report.total_steps, 64);
    assert!(!report.early_stopped);
    assert!(report.history.iter().any(|m| m.train_steps > 0));
    assert!(report.history.iter().all(|m| m.avg_loss.is_finite()));

    let final_state = read_state(&dir.path().join(FINAL_MODEL)).unwrap();
    assert_eq!(final_state.episode, 4);
    assert_eq!(final_state.total_steps, 64);
    assert!((final_state.epsilon - report.final_epsilon).abs() < 1e-12);
    assert!(dir.path().join(BEST_MODEL).join("state.json").exists());

    // Resume and extend the budget
    let mut resumed_config = config;
    resumed_config.training.episodes = 6;
    let env = PricingEnvironment::from_config(retail_rows(), &resumed_config).unwrap();
    let trainer = dqn_trainer::<TrainingBackend>(env, resumed_config, Default::default())
        .unwrap()
        .resume(FINAL_MODEL)
        .unwrap();
    assert_eq!(trainer.episodes_completed(), 4);
    assert_eq!(trainer.total_steps(), 64);
    assert!((trainer.epsilon() - final_state.epsilon).abs() < 1e-12);
    assert_eq!(trainer.best_avg_reward(), final_state.best_avg_reward);

    let mut trainer = trainer;
    let report = trainer.train().unwrap();
    assert_eq!(report.episodes, 6);
    assert_eq!(report.history.len(), 2);
    assert_eq!(report.total_steps, 96);
}

/// A checkpoint loads for inference and exports a complete policy table.
#[test]
fn exported_policy_covers_state_space() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.training.episodes = 2;

    let env = PricingEnvironment::from_config(retail_rows(), &config).unwrap();
    let mut trainer = dqn_trainer::<TrainingBackend>(env, config, Default::default()).unwrap();
    trainer.train().unwrap();

    let device = Default::default();
    let (network, state) =
        load_online_network::<InferenceBackend>(&dir.path().join(FINAL_MODEL), &device).unwrap();
    let table = export_policy(&network, &state.layout, &device).unwrap();

    assert_eq!(table.len(), state.layout.total_states());
    assert_eq!(table.len(), 3 * 3 * 4 * 3);
    assert!(table.actions.iter().all(|&a| a < state.num_actions()));
}

/// Identical rewards after a rise trigger early stopping before the budget.
#[test]
fn plateau_triggers_early_stop() {
    let config = pricing_dqn::config::EarlyStoppingConfig {
        patience: 10,
        min_delta: 0.001,
        window_size: 5,
    };
    let mut stopper = EarlyStopping::new(&config);
    let budget = 200;

    let stopped = (0..budget)
        .map(|episode| if episode < 20 { episode as f64 } else { 20.0 })
        .position(|reward| stopper.update(reward).should_stop);

    let stopped = stopped.expect("plateau should stop training");
    assert!(stopped < budget);
    assert!(stopped <= 20 + config.window_size + config.patience);
}
