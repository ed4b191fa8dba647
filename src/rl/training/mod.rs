//! Training Infrastructure
//!
//! Training loop, early stopping, checkpointing, evaluation and policy
//! export.

pub mod checkpointing;
pub mod early_stopping;
pub mod evaluation;
pub mod export;
pub mod trainer;

pub use checkpointing::{
    load_online_network, read_state, CheckpointState, Checkpointer, StagedCheckpoint, BEST_MODEL,
    FINAL_MODEL,
};
pub use early_stopping::{EarlyStopCheck, EarlyStopping};
pub use evaluation::{evaluate_policy, EvaluationReport, EvaluationSettings, SummaryStats};
pub use export::{export_policy, PolicyTable};
pub use trainer::{
    clip_grad_norm, dqn_trainer, DqnTrainer, EpisodeMetrics, InferenceBackend, TrainingBackend,
    TrainingReport,
};
