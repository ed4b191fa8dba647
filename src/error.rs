use thiserror::Error;

/// Main error type for the pricing trainer
#[derive(Error, Debug)]
pub enum PricingError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Data errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    // Replay buffer errors
    #[error("Insufficient data: buffer holds {available} transitions, {requested} requested")]
    InsufficientData { available: usize, requested: usize },

    // Environment state machine errors
    #[error("Environment stepped before reset")]
    EnvironmentNotReset,

    #[error("Invalid action {action}: action space has {num_actions} actions")]
    InvalidAction { action: usize, num_actions: usize },

    // Model errors
    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for PricingError
pub type Result<T> = std::result::Result<T, PricingError>;

impl PricingError {
    /// Wrap a burn recorder failure
    pub fn checkpoint(err: impl std::fmt::Debug) -> Self {
        Self::Checkpoint(format!("{:?}", err))
    }

    /// Wrap a tensor data extraction failure
    pub fn tensor(err: impl std::fmt::Debug) -> Self {
        Self::Tensor(format!("{:?}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_message() {
        let err = PricingError::InsufficientData {
            available: 3,
            requested: 64,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data: buffer holds 3 transitions, 64 requested"
        );
    }

    #[test]
    fn test_invalid_action_message() {
        let err = PricingError::InvalidAction {
            action: 7,
            num_actions: 5,
        };
        assert!(err.to_string().contains("7"));
        assert!(err.to_string().contains("5 actions"));
    }
}
