//! Policy evaluation on the real-data path

use std::path::Path;

use burn::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PricingError, Result};
use crate::rl::environment::PricingEnvironment;
use crate::rl::networks::{select_action, QValueModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSettings {
    pub episodes: usize,
    pub steps_per_episode: usize,
    /// Exploration during evaluation (0 is greedy)
    pub epsilon: f64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            episodes: 100,
            steps_per_episode: 200,
            epsilon: 0.0,
        }
    }
}

/// Mean and population standard deviation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub std: f64,
}

impl SummaryStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: var.sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub episodes: usize,
    /// Total reward per episode
    pub reward: SummaryStats,
    /// Per-step means, one sample per episode
    pub revenue: SummaryStats,
    pub margin: SummaryStats,
    pub volume: SummaryStats,
    /// Fraction of steps that chose each action
    pub action_distribution: Vec<f64>,
    pub episode_rewards: Vec<f64>,
}

impl EvaluationReport {
    /// Write the report as pretty JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!("Saved evaluation results to {:?}", path.as_ref());
        Ok(())
    }
}

/// Roll out `model` for `settings.episodes` episodes without synthetic steps
pub fn evaluate_policy<B, M, R>(
    env: &mut PricingEnvironment,
    model: &M,
    settings: &EvaluationSettings,
    rng: &mut R,
    device: &B::Device,
) -> Result<EvaluationReport>
where
    B: Backend,
    M: QValueModel<B>,
    R: Rng + ?Sized,
{
    if settings.steps_per_episode == 0 {
        return Err(PricingError::InvalidConfig(
            "evaluation needs at least one step per episode".to_string(),
        ));
    }
    if model.num_actions() != env.num_actions() {
        return Err(PricingError::InvalidConfig(format!(
            "network outputs {} actions but the environment has {}",
            model.num_actions(),
            env.num_actions()
        )));
    }

    let mut rewards = Vec::with_capacity(settings.episodes);
    let mut revenues = Vec::with_capacity(settings.episodes);
    let mut margins = Vec::with_capacity(settings.episodes);
    let mut volumes = Vec::with_capacity(settings.episodes);
    let mut action_counts = vec![0usize; env.num_actions()];

    for episode in 0..settings.episodes {
        let mut state = env.reset();
        let (mut reward, mut revenue, mut margin, mut volume) = (0.0, 0.0, 0.0, 0.0);

        for _ in 0..settings.steps_per_episode {
            let action = select_action(model, &state, settings.epsilon, rng, device)?;
            let step = env.step(action, false)?;

            reward += step.reward;
            revenue += step.info.revenue;
            margin += step.info.margin;
            volume += step.info.volume;
            action_counts[action] += 1;
            state = step.next_state;
        }

        let steps = settings.steps_per_episode as f64;
        rewards.push(reward);
        revenues.push(revenue / steps);
        margins.push(margin / steps);
        volumes.push(volume / steps);

        if (episode + 1) % 10 == 0 {
            info!(
                "Eval episode {}/{}: reward={:.4}, avg_revenue={:.2}",
                episode + 1,
                settings.episodes,
                reward,
                revenue / steps
            );
        }
    }

    let total: usize = action_counts.iter().sum();
    let action_distribution = action_counts
        .iter()
        .map(|&c| if total > 0 { c as f64 / total as f64 } else { 0.0 })
        .collect();

    Ok(EvaluationReport {
        episodes: settings.episodes,
        reward: SummaryStats::from_samples(&rewards),
        revenue: SummaryStats::from_samples(&revenues),
        margin: SummaryStats::from_samples(&margins),
        volume: SummaryStats::from_samples(&volumes),
        action_distribution,
        episode_rewards: rewards,
    })
}
