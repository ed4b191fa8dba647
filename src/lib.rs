pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod rl;

pub use config::DqnConfig;
pub use data::RetailDataLoader;
pub use error::{PricingError, Result};
pub use rl::{dqn_trainer, DqnTrainer, PricingEnvironment, ReplayBuffer, TrainingReport};
