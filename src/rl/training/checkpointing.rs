//! Model Checkpointing
//!
//! A checkpoint is a directory bundle:
//!
//! ```text
//! <checkpoint_dir>/<name>/
//!     online.mpk      online network
//!     target.mpk      target network
//!     optimizer.mpk   optimizer state
//!     state.json      training bookkeeping
//! ```
//!
//! Bundles are written into `<name>.partial/` and renamed into place on
//! commit, so readers only ever see complete checkpoints.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PricingError, Result};
use crate::rl::config::DqnConfig;
use crate::rl::core::BinLayout;
use crate::rl::networks::{QNetwork, QNetworkConfig};

/// Checkpoint written whenever the rolling average reward improves
pub const BEST_MODEL: &str = "best_model";
/// Checkpoint written when training ends
pub const FINAL_MODEL: &str = "final_model";

pub const ONLINE_FILE: &str = "online";
pub const TARGET_FILE: &str = "target";
pub const OPTIMIZER_FILE: &str = "optimizer";
pub const STATE_FILE: &str = "state.json";

const PARTIAL_SUFFIX: &str = ".partial";
const STALE_SUFFIX: &str = ".old";

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Training bookkeeping stored next to the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Episodes completed
    pub episode: usize,
    /// Environment steps taken
    pub total_steps: usize,
    /// Exploration rate at save time
    pub epsilon: f64,
    /// Best rolling-average reward seen (None before the first full window)
    pub best_avg_reward: Option<f64>,
    /// Discrete state layout of the encoder the model was trained with
    pub layout: BinLayout,
    /// Full training configuration
    pub config: DqnConfig,
    /// When the checkpoint was written
    pub saved_at: DateTime<Utc>,
}

impl CheckpointState {
    /// Number of actions the checkpointed networks output
    pub fn num_actions(&self) -> usize {
        self.config.actions.multipliers.len()
    }
}

/// Checkpointer for saving and loading training bundles
#[derive(Debug, Clone)]
pub struct Checkpointer {
    /// Directory for checkpoints
    checkpoint_dir: PathBuf,
}

impl Checkpointer {
    /// Create a new checkpointer
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P) -> Self {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        if !checkpoint_dir.exists() {
            if let Err(e) = fs::create_dir_all(&checkpoint_dir) {
                warn!("Failed to create checkpoint directory: {}", e);
            }
        }

        Self { checkpoint_dir }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Get checkpoint path for a given name
    pub fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir.join(name)
    }

    /// Start writing a new bundle
    pub fn stage(&self, name: &str) -> Result<StagedCheckpoint> {
        fs::create_dir_all(&self.checkpoint_dir)?;

        let staging = self
            .checkpoint_dir
            .join(format!("{}{}", name, PARTIAL_SUFFIX));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        Ok(StagedCheckpoint {
            staging,
            target: self.checkpoint_path(name),
        })
    }

    /// Read the bookkeeping of a committed bundle
    pub fn load_state(&self, name: &str) -> Result<CheckpointState> {
        read_state(&self.checkpoint_path(name))
    }

    /// Load one network of a committed bundle into `module`
    pub fn load_module<B, M>(&self, name: &str, file: &str, module: M, device: &B::Device) -> Result<M>
    where
        B: Backend,
        M: Module<B>,
    {
        load_module(&self.checkpoint_path(name), file, module, device)
    }

    /// Load a raw record (optimizer state) of a committed bundle
    pub fn load_record<B, R>(&self, name: &str, file: &str, device: &B::Device) -> Result<R>
    where
        B: Backend,
        R: Record<B>,
    {
        let dir = self.require(name)?;
        Recorder::<B>::load(&recorder(), dir.join(file), device).map_err(PricingError::checkpoint)
    }

    fn require(&self, name: &str) -> Result<PathBuf> {
        let path = self.checkpoint_path(name);
        if path.join(STATE_FILE).exists() {
            Ok(path)
        } else {
            Err(PricingError::CheckpointNotFound(path.display().to_string()))
        }
    }

    /// List committed checkpoints
    pub fn list_checkpoints(&self) -> Vec<String> {
        let mut checkpoints = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.checkpoint_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.join(STATE_FILE).exists() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if !name.ends_with(PARTIAL_SUFFIX) && !name.ends_with(STALE_SUFFIX) {
                        checkpoints.push(name.to_string());
                    }
                }
            }
        }

        checkpoints.sort();
        checkpoints
    }

    /// Most recently written checkpoint
    pub fn latest_checkpoint(&self) -> Option<String> {
        self.list_checkpoints()
            .into_iter()
            .filter_map(|name| self.load_state(&name).ok().map(|s| (s.saved_at, name)))
            .max()
            .map(|(_, name)| name)
    }

    /// Check if a checkpoint exists
    pub fn exists(&self, name: &str) -> bool {
        self.checkpoint_path(name).join(STATE_FILE).exists()
    }
}

impl Default for Checkpointer {
    fn default() -> Self {
        Self::new("./checkpoints")
    }
}

/// A bundle being written; nothing is visible until [`commit`](Self::commit)
#[derive(Debug)]
pub struct StagedCheckpoint {
    staging: PathBuf,
    target: PathBuf,
}

impl StagedCheckpoint {
    /// Save a network
    pub fn save_module<B, M>(&self, file: &str, module: &M) -> Result<()>
    where
        B: Backend,
        M: Module<B>,
    {
        module
            .clone()
            .save_file(self.staging.join(file), &recorder())
            .map_err(PricingError::checkpoint)
    }

    /// Save a raw record (optimizer state)
    pub fn save_record<B, R>(&self, file: &str, record: R) -> Result<()>
    where
        B: Backend,
        R: Record<B>,
    {
        Recorder::<B>::record(&recorder(), record, self.staging.join(file))
            .map_err(PricingError::checkpoint)?;
        Ok(())
    }

    /// Write the bookkeeping file
    pub fn write_state(&self, state: &CheckpointState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        fs::write(self.staging.join(STATE_FILE), json)?;
        Ok(())
    }

    /// Swap the staged bundle into place
    pub fn commit(self) -> Result<PathBuf> {
        let stale = self.target.with_file_name(format!(
            "{}{}",
            self.target
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default(),
            STALE_SUFFIX
        ));

        if stale.exists() {
            fs::remove_dir_all(&stale)?;
        }
        if self.target.exists() {
            fs::rename(&self.target, &stale)?;
        }
        fs::rename(&self.staging, &self.target)?;
        if stale.exists() {
            if let Err(e) = fs::remove_dir_all(&stale) {
                warn!("Failed to remove stale checkpoint {:?}: {}", stale, e);
            }
        }

        info!("Saved checkpoint to {:?}", self.target);
        Ok(self.target)
    }
}

/// Read `state.json` from a bundle directory
pub fn read_state(dir: &Path) -> Result<CheckpointState> {
    let path = dir.join(STATE_FILE);
    if !path.exists() {
        return Err(PricingError::CheckpointNotFound(dir.display().to_string()));
    }
    let json = fs::read_to_string(&path)?;
    let state = serde_json::from_str(&json)?;
    debug!("Loaded checkpoint state from {:?}", path);
    Ok(state)
}

/// Load one network from a bundle directory into `module`
pub fn load_module<B, M>(dir: &Path, file: &str, module: M, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    if !dir.join(STATE_FILE).exists() {
        return Err(PricingError::CheckpointNotFound(dir.display().to_string()));
    }
    module
        .load_file(dir.join(file), &recorder(), device)
        .map_err(PricingError::checkpoint)
}

/// Rebuild the online network of a bundle for inference
pub fn load_online_network<B: Backend>(
    dir: &Path,
    device: &B::Device,
) -> Result<(QNetwork<B>, CheckpointState)> {
    let state = read_state(dir)?;
    let network = QNetworkConfig::from_network(&state.config.network, state.num_actions())
        .init::<B>(device);
    let network = load_module(dir, ONLINE_FILE, network, device)?;
    Ok((network, state))
}
