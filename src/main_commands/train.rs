use pricing_dqn::cli::output::{print_items, print_success, OutputMode, SummaryRow};
use pricing_dqn::config::DqnConfig;
use pricing_dqn::data::RetailDataLoader;
use pricing_dqn::error::Result;
use pricing_dqn::rl::training::{dqn_trainer, TrainingBackend, FINAL_MODEL};
use pricing_dqn::rl::PricingEnvironment;
use tracing::info;

pub(super) fn run_train(
    config: DqnConfig,
    data: &str,
    product: Option<&str>,
    resume: Option<&str>,
    metrics_path: Option<&str>,
    mode: OutputMode,
) -> Result<()> {
    info!("Starting DQN training mode");
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Pricing DQN Training Mode                      ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Data:           {}", data);
    println!("║  Product:        {}", product.unwrap_or("(all)"));
    println!("║  Episodes:       {:>6}", config.training.episodes);
    println!("║  Steps/Episode:  {:>6}", config.training.steps_per_episode);
    println!("║  Learning Rate:  {:>10.6}", config.training.learning_rate);
    println!("║  Batch Size:     {:>6}", config.training.batch_size);
    println!("║  Actions:        {:?}", config.actions.multipliers);
    println!("║  Checkpoint:     {}", config.logging.checkpoint_dir);
    println!("╚══════════════════════════════════════════════════════════════╝");

    let mut loader = RetailDataLoader::new();
    if let Some(product) = product {
        loader = loader.with_product(product);
    }
    let rows = loader.load(data)?;

    let env = PricingEnvironment::from_config(rows, &config)?;
    info!(
        "Environment ready: {} rows, {} discrete states, extended={}",
        env.num_rows(),
        env.encoder().total_discrete_states(),
        env.encoder().is_extended()
    );

    let mut trainer = dqn_trainer::<TrainingBackend>(env, config, Default::default())?;
    if let Some(name) = resume {
        println!("Loading checkpoint: {}", name);
        trainer = trainer.resume(name)?;
    }

    let report = trainer.train()?;

    if let Some(path) = metrics_path {
        std::fs::write(path, serde_json::to_string_pretty(&report.history)?)?;
        info!("Wrote training metrics to {}", path);
    }

    let last = report.history.last();
    let rows = vec![
        SummaryRow::new("episodes", report.episodes),
        SummaryRow::new("total steps", report.total_steps),
        SummaryRow::new(
            "best avg reward",
            report
                .best_avg_reward
                .map(|r| format!("{r:.4}"))
                .unwrap_or_else(|| "-".to_string()),
        ),
        SummaryRow::new(
            "last reward",
            last.map(|m| format!("{:.4}", m.total_reward))
                .unwrap_or_else(|| "-".to_string()),
        ),
        SummaryRow::new("final epsilon", format!("{:.4}", report.final_epsilon)),
        SummaryRow::new("early stopped", report.early_stopped),
    ];
    print_items(&rows, mode)?;

    print_success(&format!(
        "Final checkpoint: {:?}",
        trainer.checkpointer().checkpoint_path(FINAL_MODEL)
    ));
    Ok(())
}
