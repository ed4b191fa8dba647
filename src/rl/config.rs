//! RL Configuration
//!
//! Configuration structs for the pricing environment, replay memory,
//! Q-network and Double DQN trainer.

use serde::{Deserialize, Serialize};

/// Main DQN configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    /// Training loop configuration
    pub training: TrainingConfig,
    /// Q-network architecture
    pub network: NetworkConfig,
    /// Replay buffer configuration
    pub replay: ReplayConfig,
    /// Environment configuration
    pub environment: EnvironmentConfig,
    /// Price action space
    pub actions: ActionConfig,
    /// State discretization
    pub discretization: DiscretizationConfig,
    /// Early stopping
    pub early_stopping: EarlyStoppingConfig,
    /// Logging and checkpoint output
    pub logging: LoggingConfig,
}

/// Training loop hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Maximum number of episodes
    pub episodes: usize,
    /// Environment steps per episode
    pub steps_per_episode: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Discount factor (gamma)
    pub gamma: f32,
    /// Soft update coefficient for the target network
    pub tau: f32,
    /// Minimum stored transitions before the first update
    pub warmup_steps: usize,
    /// Environment steps between gradient updates
    pub train_frequency: usize,
    /// Maximum global gradient norm
    pub gradient_clip_max_norm: f32,
    /// Initial exploration rate
    pub epsilon_start: f64,
    /// Minimum exploration rate
    pub epsilon_end: f64,
    /// Multiplicative exploration decay per episode
    pub epsilon_decay: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// AdamW weight decay
    pub weight_decay: f32,
    /// Seed for every random source (entropy when absent)
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 1000,
            steps_per_episode: 200,
            batch_size: 64,
            gamma: 0.99,
            tau: 0.005,
            warmup_steps: 1000,
            train_frequency: 4,
            gradient_clip_max_norm: 1.0,
            epsilon_start: 1.0,
            epsilon_end: 0.01,
            epsilon_decay: 0.995,
            learning_rate: 1e-3,
            weight_decay: 1e-4,
            seed: None,
        }
    }
}

/// Q-network architecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Hidden layer sizes
    pub hidden_dims: Vec<usize>,
    /// Batch normalization after each hidden layer
    pub use_batch_norm: bool,
    /// Dropout probability after each hidden layer
    pub dropout_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_dims: vec![128, 128, 64],
            use_batch_norm: true,
            dropout_rate: 0.0,
        }
    }
}

/// Replay buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Buffer capacity
    pub buffer_size: usize,
    /// Prioritized experience replay
    pub use_per: bool,
    /// Priority exponent
    pub per_alpha: f64,
    /// Initial importance sampling exponent
    pub per_beta_start: f64,
    /// Final importance sampling exponent
    pub per_beta_end: f64,
    /// Sampling calls over which beta is annealed
    pub per_beta_frames: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            buffer_size: 100_000,
            use_per: true,
            per_alpha: 0.6,
            per_beta_start: 0.4,
            per_beta_end: 1.0,
            per_beta_frames: 100_000,
        }
    }
}

/// Pricing environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Probability that a training step uses the synthetic path
    pub synthetic_ratio: f64,
    /// Weight of the price stability penalty
    pub price_change_penalty: f64,
    /// Reward blend weights
    pub reward_weights: RewardWeights,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            synthetic_ratio: 0.3,
            price_change_penalty: 0.15,
            reward_weights: RewardWeights::default(),
        }
    }
}

/// Reward blend weights (sum to 1.0 by convention)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    pub revenue: f64,
    pub margin: f64,
    pub volume: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            revenue: 0.4,
            margin: 0.4,
            volume: 0.2,
        }
    }
}

impl RewardWeights {
    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.revenue + self.margin + self.volume
    }
}

/// Price action space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Multipliers applied to the base price, one per action
    pub multipliers: Vec<f64>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            multipliers: vec![0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6],
        }
    }
}

/// State discretization bin counts (season is always 4 bins)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscretizationConfig {
    pub demand_bins: usize,
    pub competitor_bins: usize,
    pub lag_price_bins: usize,
    pub inventory_bins: usize,
    pub forecast_bins: usize,
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self {
            demand_bins: 3,
            competitor_bins: 3,
            lag_price_bins: 3,
            inventory_bins: 3,
            forecast_bins: 3,
        }
    }
}

impl DiscretizationConfig {
    /// Name of the first dimension configured with zero bins
    pub fn first_empty_dimension(&self) -> Option<&'static str> {
        [
            ("demand_bins", self.demand_bins),
            ("competitor_bins", self.competitor_bins),
            ("lag_price_bins", self.lag_price_bins),
            ("inventory_bins", self.inventory_bins),
            ("forecast_bins", self.forecast_bins),
        ]
        .into_iter()
        .find(|(_, bins)| *bins == 0)
        .map(|(name, _)| name)
    }
}

/// Early stopping on the rolling average episode reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStoppingConfig {
    /// Full windows without improvement before stopping
    pub patience: usize,
    /// Minimum improvement of the rolling mean
    pub min_delta: f64,
    /// Rolling window length in episodes
    pub window_size: usize,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            patience: 100,
            min_delta: 0.001,
            window_size: 50,
        }
    }
}

/// Logging and checkpoint output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Episodes between progress log lines
    pub log_interval: usize,
    /// Directory for checkpoint bundles
    pub checkpoint_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_interval: 10,
            checkpoint_dir: "./checkpoints".to_string(),
        }
    }
}
