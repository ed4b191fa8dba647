use pricing_dqn::cli::output::OutputMode;
use pricing_dqn::cli::{Cli, Commands};
use pricing_dqn::config::{DqnConfig, DEFAULT_CONFIG_PATH};
use pricing_dqn::error::Result;
use tracing::info;

mod evaluate;
mod export;
mod info;
mod train;

/// Dispatch a parsed command line
pub(crate) fn run_command(cli: &Cli) -> Result<()> {
    let mode = OutputMode::from_json_flag(cli.json);

    match &cli.command {
        Commands::Train {
            data,
            product,
            episodes,
            output,
            resume,
            seed,
            metrics,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(episodes) = episodes {
                config.training.episodes = *episodes;
            }
            if let Some(dir) = output {
                config.logging.checkpoint_dir = dir.clone();
            }
            if seed.is_some() {
                config.training.seed = *seed;
            }
            train::run_train(
                config,
                data,
                product.as_deref(),
                resume.as_deref(),
                metrics.as_deref(),
                mode,
            )
        }
        Commands::Evaluate {
            data,
            product,
            checkpoint,
            episodes,
            steps,
            epsilon,
            seed,
            output,
        } => evaluate::run_evaluate(
            data,
            product.as_deref(),
            checkpoint,
            *episodes,
            *steps,
            *epsilon,
            *seed,
            output,
            mode,
        ),
        Commands::Export { checkpoint, output } => export::run_export(checkpoint, output, mode),
        Commands::Info { checkpoint } => info::run_info(checkpoint, mode),
        Commands::Checkpoints { dir } => info::run_list(dir, mode),
    }
}

/// Load configuration; only an explicitly named file must exist
fn load_config(path: &str) -> Result<DqnConfig> {
    let required = path != DEFAULT_CONFIG_PATH;
    let config = DqnConfig::load_validated(path, required)?;
    info!("Loaded configuration from {}", path);
    Ok(config)
}
