//! Pricing DQN CLI
//!
//! Commands:
//! - `pricing-dqn train` - Train a Double DQN pricing policy
//! - `pricing-dqn evaluate` - Evaluate a checkpoint on historical data
//! - `pricing-dqn export` - Export the greedy policy as a lookup table
//! - `pricing-dqn info` - Show checkpoint metadata
//! - `pricing-dqn checkpoints` - List checkpoints in a directory

pub mod output;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(name = "pricing-dqn")]
#[command(author, version, about = "Double DQN trainer for retail price adjustment")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Output JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a pricing policy on a retail sales CSV
    Train {
        /// Retail sales CSV
        #[arg(short, long)]
        data: String,
        /// Product ID to train on (default: all products)
        #[arg(short, long)]
        product: Option<String>,
        /// Override the number of episodes
        #[arg(short, long)]
        episodes: Option<usize>,
        /// Override the checkpoint directory
        #[arg(short, long)]
        output: Option<String>,
        /// Resume from a checkpoint name in the checkpoint directory
        #[arg(long)]
        resume: Option<String>,
        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Write per-episode metrics as JSON
        #[arg(long)]
        metrics: Option<String>,
    },
    /// Evaluate a checkpoint with real-data steps only
    Evaluate {
        /// Retail sales CSV
        #[arg(short, long)]
        data: String,
        /// Product ID to evaluate on
        #[arg(short, long)]
        product: Option<String>,
        /// Checkpoint directory (e.g. checkpoints/best_model)
        #[arg(long)]
        checkpoint: String,
        /// Number of evaluation episodes
        #[arg(short, long, default_value = "100")]
        episodes: usize,
        /// Steps per evaluation episode
        #[arg(long, default_value = "200")]
        steps: usize,
        /// Exploration rate (0 = greedy)
        #[arg(long, default_value = "0.0")]
        epsilon: f64,
        /// Random seed for environment resets
        #[arg(long)]
        seed: Option<u64>,
        /// Results JSON file
        #[arg(short, long, default_value = "evaluation_results.json")]
        output: String,
    },
    /// Export the greedy action of every discrete state
    Export {
        /// Checkpoint directory (e.g. checkpoints/best_model)
        #[arg(long)]
        checkpoint: String,
        /// Output JSON file
        #[arg(short, long, default_value = "dqn_policy.json")]
        output: String,
    },
    /// Show checkpoint metadata
    Info {
        /// Checkpoint directory
        #[arg(long)]
        checkpoint: String,
    },
    /// List committed checkpoints
    Checkpoints {
        /// Checkpoint root directory
        #[arg(short, long, default_value = "./checkpoints")]
        dir: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train() {
        let cli = Cli::parse_from([
            "pricing-dqn",
            "train",
            "--data",
            "sales.csv",
            "--episodes",
            "5",
            "--json",
        ]);
        assert!(cli.json);
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        match cli.command {
            Commands::Train { data, episodes, .. } => {
                assert_eq!(data, "sales.csv");
                assert_eq!(episodes, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_evaluate_defaults() {
        let cli = Cli::parse_from([
            "pricing-dqn",
            "evaluate",
            "--data",
            "sales.csv",
            "--checkpoint",
            "checkpoints/best_model",
        ]);
        match cli.command {
            Commands::Evaluate {
                episodes,
                steps,
                epsilon,
                output,
                ..
            } => {
                assert_eq!(episodes, 100);
                assert_eq!(steps, 200);
                assert_eq!(epsilon, 0.0);
                assert_eq!(output, "evaluation_results.json");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
