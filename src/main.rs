use clap::Parser;
use pricing_dqn::cli::{Cli, Commands};
use pricing_dqn::error::Result;

mod main_commands;
mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Train { .. } | Commands::Evaluate { .. } => init_logging(),
        Commands::Export { .. } | Commands::Info { .. } | Commands::Checkpoints { .. } => {
            init_logging_simple()
        }
    }

    main_commands::run_command(&cli)
}
