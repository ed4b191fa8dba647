use config::{Config, ConfigError, Environment, File};
use std::path::Path;

use crate::error::{PricingError, Result};
pub use crate::rl::config::*;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "PRICING_DQN";

impl DqnConfig {
    /// Load configuration from the default file and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH, false)
    }

    /// Load configuration from a specific file
    ///
    /// The format is inferred from the extension (toml, yaml, json).
    /// Every field not present falls back to its default.
    pub fn load_from<P: AsRef<Path>>(
        path: P,
        required: bool,
    ) -> std::result::Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()).required(required))
            // Override with environment variables (PRICING_DQN__TRAINING__EPISODES, etc.)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load and validate, folding validation failures into one error
    pub fn load_validated<P: AsRef<Path>>(path: P, required: bool) -> Result<Self> {
        let config = Self::load_from(path, required)?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Validate, returning a single error listing every problem
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()
            .map_err(|errors| PricingError::InvalidConfig(errors.join("; ")))
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let t = &self.training;

        if t.episodes == 0 {
            errors.push("training.episodes must be positive".to_string());
        }
        if t.steps_per_episode == 0 {
            errors.push("training.steps_per_episode must be positive".to_string());
        }
        if t.batch_size == 0 {
            errors.push("training.batch_size must be positive".to_string());
        }
        if self.network.use_batch_norm && t.batch_size < 2 {
            errors.push("training.batch_size must be at least 2 with batch norm".to_string());
        }
        if !(0.0..=1.0).contains(&t.gamma) {
            errors.push("training.gamma must be in [0, 1]".to_string());
        }
        if !(t.tau > 0.0 && t.tau <= 1.0) {
            errors.push("training.tau must be in (0, 1]".to_string());
        }
        if t.train_frequency == 0 {
            errors.push("training.train_frequency must be positive".to_string());
        }
        if t.gradient_clip_max_norm <= 0.0 {
            errors.push("training.gradient_clip_max_norm must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&t.epsilon_start) || !(0.0..=1.0).contains(&t.epsilon_end) {
            errors.push("training.epsilon_start and epsilon_end must be in [0, 1]".to_string());
        }
        if t.epsilon_end > t.epsilon_start {
            errors.push("training.epsilon_end must not exceed epsilon_start".to_string());
        }
        if !(t.epsilon_decay > 0.0 && t.epsilon_decay <= 1.0) {
            errors.push("training.epsilon_decay must be in (0, 1]".to_string());
        }
        if t.learning_rate <= 0.0 {
            errors.push("training.learning_rate must be positive".to_string());
        }

        if self.network.hidden_dims.iter().any(|&d| d == 0) {
            errors.push("network.hidden_dims entries must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.network.dropout_rate) {
            errors.push("network.dropout_rate must be in [0, 1)".to_string());
        }

        let r = &self.replay;
        if r.buffer_size == 0 {
            errors.push("replay.buffer_size must be positive".to_string());
        }
        if t.batch_size > r.buffer_size {
            errors.push("training.batch_size must not exceed replay.buffer_size".to_string());
        }
        if r.per_alpha < 0.0 {
            errors.push("replay.per_alpha must be non-negative".to_string());
        }
        if r.per_beta_start > r.per_beta_end {
            errors.push("replay.per_beta_start must not exceed per_beta_end".to_string());
        }

        let e = &self.environment;
        if !(0.0..=1.0).contains(&e.synthetic_ratio) {
            errors.push("environment.synthetic_ratio must be in [0, 1]".to_string());
        }
        if !(e.reward_weights.total() > 0.0) {
            errors.push("environment.reward_weights must sum to a positive value".to_string());
        }
        if e.price_change_penalty < 0.0 {
            errors.push("environment.price_change_penalty must be non-negative".to_string());
        }

        if let Some(name) = self.discretization.first_empty_dimension() {
            errors.push(format!("discretization.{} must be positive", name));
        }

        if self.actions.multipliers.is_empty() {
            errors.push("actions.multipliers must not be empty".to_string());
        }
        if self.actions.multipliers.iter().any(|m| !(*m > 0.0)) {
            errors.push("actions.multipliers must all be positive".to_string());
        }

        let d = &self.discretization;
        if [
            d.demand_bins,
            d.competitor_bins,
            d.lag_price_bins,
            d.inventory_bins,
            d.forecast_bins,
        ]
        .iter()
        .any(|&b| b == 0)
        {
            errors.push("discretization bin counts must be at least 1".to_string());
        }

        if self.early_stopping.window_size == 0 {
            errors.push("early_stopping.window_size must be positive".to_string());
        }
        if self.logging.log_interval == 0 {
            errors.push("logging.log_interval must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DqnConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = DqnConfig::default();
        config.training.tau = 0.0;
        config.actions.multipliers.clear();
        config.environment.synthetic_ratio = 1.5;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_zero_reward_weights_are_invalid() {
        let mut config = DqnConfig::default();
        config.environment.reward_weights.revenue = 0.0;
        config.environment.reward_weights.margin = 0.0;
        config.environment.reward_weights.volume = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_bin_dimension_is_invalid() {
        let mut config = DqnConfig::default();
        config.discretization.lag_price_bins = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors, vec!["discretization.lag_price_bins must be positive"]);
    }

    #[test]
    fn test_batch_norm_requires_batch_of_two() {
        let mut config = DqnConfig::default();
        config.training.batch_size = 1;
        assert!(config.validate().is_err());

        config.network.use_batch_norm = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dqn.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[training]\nepisodes = 12\n\n[actions]\nmultipliers = [0.9, 1.0, 1.1]"
        )
        .unwrap();

        let config = DqnConfig::load_validated(&path, true).unwrap();
        assert_eq!(config.training.episodes, 12);
        assert_eq!(config.actions.multipliers, vec![0.9, 1.0, 1.1]);
        assert_eq!(config.replay.buffer_size, 100_000);
    }

    #[test]
    fn test_missing_optional_file_yields_defaults() {
        let config = DqnConfig::load_from("does/not/exist.toml", false).unwrap();
        assert_eq!(config.training.steps_per_episode, 200);
    }
}
