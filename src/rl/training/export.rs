//! Policy table export
//!
//! Queries a trained network at the midpoint of every discrete state and
//! records the greedy action. States are enumerated in the nested order of
//! [`BinLayout::states`], so the flat index of a state is stable for a
//! given layout.

use std::collections::BTreeMap;
use std::path::Path;

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::rl::core::{BinLayout, ContinuousState};
use crate::rl::networks::{greedy_actions, QValueModel};

const QUERY_CHUNK: usize = 1024;

/// Greedy action for every discrete state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    pub layout: BinLayout,
    pub num_actions: usize,
    /// `actions[i]` is the action for flat state index `i`
    pub actions: Vec<usize>,
}

impl PolicyTable {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action for a flat state index
    pub fn action(&self, state_index: usize) -> Option<usize> {
        self.actions.get(state_index).copied()
    }

    /// Flat state index -> action; integer keys serialize as JSON strings
    pub fn as_map(&self) -> BTreeMap<usize, usize> {
        self.actions.iter().copied().enumerate().collect()
    }

    /// Fraction of states mapped to each action
    pub fn action_distribution(&self) -> Vec<f64> {
        let mut counts = vec![0usize; self.num_actions];
        for &action in &self.actions {
            if let Some(count) = counts.get_mut(action) {
                *count += 1;
            }
        }
        let total = self.actions.len().max(1) as f64;
        counts.into_iter().map(|c| c as f64 / total).collect()
    }

    /// Write the index -> action map as pretty JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.as_map())?;
        std::fs::write(path.as_ref(), json)?;
        info!(
            "Exported policy for {} states to {:?}",
            self.len(),
            path.as_ref()
        );
        Ok(())
    }
}

/// Build the policy table for `layout`
pub fn export_policy<B: Backend, M: QValueModel<B>>(
    model: &M,
    layout: &BinLayout,
    device: &B::Device,
) -> Result<PolicyTable> {
    let states: Vec<ContinuousState> = layout
        .states()
        .iter()
        .map(|s| layout.discrete_to_continuous(s))
        .collect();

    let mut actions = Vec::with_capacity(states.len());
    for chunk in states.chunks(QUERY_CHUNK) {
        actions.extend(greedy_actions(model, chunk, device)?);
    }

    Ok(PolicyTable {
        layout: *layout,
        num_actions: model.num_actions(),
        actions,
    })
}
