//! Early stopping on the rolling average episode reward

use std::collections::VecDeque;

use crate::rl::config::EarlyStoppingConfig;

/// Outcome of feeding one episode reward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarlyStopCheck {
    /// Mean of the window, once it is full
    pub rolling_mean: Option<f64>,
    /// The rolling mean beat the best by more than `min_delta`
    pub improved: bool,
    /// Patience exhausted
    pub should_stop: bool,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    window_size: usize,
    window: VecDeque<f64>,
    best: Option<f64>,
    stagnant: usize,
}

impl EarlyStopping {
    pub fn new(config: &EarlyStoppingConfig) -> Self {
        let window_size = config.window_size.max(1);
        Self {
            patience: config.patience,
            min_delta: config.min_delta,
            window_size,
            window: VecDeque::with_capacity(window_size),
            best: None,
            stagnant: 0,
        }
    }

    /// Record an episode reward
    ///
    /// Nothing is judged until the window is full. After that every episode
    /// either improves on the best mean (resetting the counter) or counts
    /// one towards `patience`.
    pub fn update(&mut self, episode_reward: f64) -> EarlyStopCheck {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(episode_reward);

        if self.window.len() < self.window_size {
            return EarlyStopCheck {
                rolling_mean: None,
                improved: false,
                should_stop: false,
            };
        }

        let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;
        let improved = match self.best {
            None => true,
            Some(best) => mean > best + self.min_delta,
        };

        if improved {
            self.best = Some(mean);
            self.stagnant = 0;
        } else {
            self.stagnant += 1;
        }

        EarlyStopCheck {
            rolling_mean: Some(mean),
            improved,
            should_stop: self.stagnant >= self.patience,
        }
    }

    /// Best rolling mean seen so far
    pub fn best(&self) -> Option<f64> {
        self.best
    }

    /// Episodes since the last improvement
    pub fn stagnant_episodes(&self) -> usize {
        self.stagnant
    }

    /// Restore the best mean from a checkpoint; the window starts empty
    pub fn restore_best(&mut self, best: Option<f64>) {
        self.best = best;
        self.stagnant = 0;
        self.window.clear();
    }
}
