//! Replay Buffer
//!
//! Fixed-capacity experience replay with optional prioritized sampling.
//!
//! Storage is a struct-of-arrays ring: every field lives in its own
//! preallocated vector indexed by slot, so `add` never allocates.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, Result};
use crate::rl::config::ReplayConfig;
use crate::rl::core::{ContinuousState, STATE_DIM};

/// Keeps every priority strictly positive
pub const PRIORITY_EPSILON: f64 = 1e-6;

/// A single transition in the environment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// State features before action
    pub state: ContinuousState,
    /// Action index taken
    pub action: usize,
    /// Reward received
    pub reward: f32,
    /// Next state features
    pub next_state: ContinuousState,
    /// Whether episode terminated
    pub done: bool,
}

impl Transition {
    /// Create a new transition
    pub fn new(
        state: ContinuousState,
        action: usize,
        reward: f32,
        next_state: ContinuousState,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// A sampled mini-batch, laid out for direct tensor construction
#[derive(Debug, Clone)]
pub struct SampledBatch {
    /// Row-major `[batch, STATE_DIM]`
    pub states: Vec<f32>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f32>,
    /// Row-major `[batch, STATE_DIM]`
    pub next_states: Vec<f32>,
    /// 1.0 for terminal transitions, else 0.0
    pub dones: Vec<f32>,
    /// Buffer slots, for priority updates
    pub indices: Vec<usize>,
    /// Importance sampling weights, max-normalized to 1.0
    pub weights: Vec<f32>,
}

impl SampledBatch {
    /// Number of transitions in the batch
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Replay buffer for experience storage
#[derive(Debug)]
pub struct ReplayBuffer {
    states: Vec<f32>,
    actions: Vec<usize>,
    rewards: Vec<f32>,
    next_states: Vec<f32>,
    dones: Vec<bool>,
    priorities: Vec<f64>,

    capacity: usize,
    position: usize,
    size: usize,

    use_per: bool,
    alpha: f64,
    max_priority: f64,

    beta: f64,
    beta_start: f64,
    beta_end: f64,
    beta_frames: usize,
    frame_count: usize,

    rng: StdRng,
}

impl ReplayBuffer {
    /// Create a new replay buffer seeded from entropy
    pub fn new(capacity: usize, config: &ReplayConfig) -> Self {
        let capacity = capacity.max(1);
        Self {
            states: vec![0.0; capacity * STATE_DIM],
            actions: vec![0; capacity],
            rewards: vec![0.0; capacity],
            next_states: vec![0.0; capacity * STATE_DIM],
            dones: vec![false; capacity],
            priorities: vec![1.0; capacity],
            capacity,
            position: 0,
            size: 0,
            use_per: config.use_per,
            alpha: config.per_alpha,
            max_priority: 1.0,
            beta: config.per_beta_start,
            beta_start: config.per_beta_start,
            beta_end: config.per_beta_end,
            beta_frames: config.per_beta_frames,
            frame_count: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create from the replay configuration section
    pub fn from_config(config: &ReplayConfig) -> Self {
        Self::new(config.buffer_size, config)
    }

    /// Reseed the sampling random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Add a transition, overwriting the oldest once full
    ///
    /// New transitions get the highest priority seen so far.
    pub fn add(&mut self, transition: Transition) {
        let slot = self.position;
        let range = slot * STATE_DIM..(slot + 1) * STATE_DIM;

        self.states[range.clone()].copy_from_slice(&transition.state);
        self.next_states[range].copy_from_slice(&transition.next_state);
        self.actions[slot] = transition.action;
        self.rewards[slot] = transition.reward;
        self.dones[slot] = transition.done;
        if self.use_per {
            self.priorities[slot] = self.max_priority;
        }

        self.position = (self.position + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);
    }

    /// Sample a batch without replacement
    ///
    /// Fails with [`PricingError::InsufficientData`] when fewer than
    /// `batch_size` transitions are stored. Each call advances the beta
    /// schedule by one frame.
    pub fn sample(&mut self, batch_size: usize) -> Result<SampledBatch> {
        if self.size < batch_size {
            return Err(PricingError::InsufficientData {
                available: self.size,
                requested: batch_size,
            });
        }

        let (indices, weights) = if self.use_per {
            self.sample_prioritized(batch_size)?
        } else {
            let indices = index::sample(&mut self.rng, self.size, batch_size).into_vec();
            (indices, vec![1.0; batch_size])
        };

        self.frame_count += 1;
        self.beta = self.beta_at(self.frame_count);

        Ok(self.gather(indices, weights))
    }

    fn sample_prioritized(&mut self, batch_size: usize) -> Result<(Vec<usize>, Vec<f32>)> {
        let scaled: Vec<f64> = self.priorities[..self.size]
            .iter()
            .map(|p| p.powf(self.alpha))
            .collect();
        let total: f64 = scaled.iter().sum();

        let indices = index::sample_weighted(&mut self.rng, self.size, |i| scaled[i], batch_size)
            .map_err(|e| anyhow::anyhow!("prioritized sampling failed: {}", e))?
            .into_vec();

        let n = self.size as f64;
        let raw: Vec<f64> = indices
            .iter()
            .map(|&i| (n * scaled[i] / total).powf(-self.beta))
            .collect();
        let max = raw.iter().copied().fold(f64::MIN_POSITIVE, f64::max);
        let weights = raw.iter().map(|w| (w / max) as f32).collect();

        Ok((indices, weights))
    }

    fn gather(&self, indices: Vec<usize>, weights: Vec<f32>) -> SampledBatch {
        let n = indices.len();
        let mut states = Vec::with_capacity(n * STATE_DIM);
        let mut next_states = Vec::with_capacity(n * STATE_DIM);
        let mut actions = Vec::with_capacity(n);
        let mut rewards = Vec::with_capacity(n);
        let mut dones = Vec::with_capacity(n);

        for &i in &indices {
            let range = i * STATE_DIM..(i + 1) * STATE_DIM;
            states.extend_from_slice(&self.states[range.clone()]);
            next_states.extend_from_slice(&self.next_states[range]);
            actions.push(self.actions[i]);
            rewards.push(self.rewards[i]);
            dones.push(if self.dones[i] { 1.0 } else { 0.0 });
        }

        SampledBatch {
            states,
            actions,
            rewards,
            next_states,
            dones,
            indices,
            weights,
        }
    }

    /// Store `(|td| + eps)^alpha` for each sampled slot
    ///
    /// No-op when prioritization is disabled.
    pub fn update_priorities(&mut self, indices: &[usize], td_errors: &[f32]) {
        if !self.use_per {
            return;
        }
        for (&i, &td) in indices.iter().zip(td_errors) {
            if i >= self.size {
                continue;
            }
            let priority = (td.abs() as f64 + PRIORITY_EPSILON).powf(self.alpha);
            self.priorities[i] = priority;
            self.max_priority = self.max_priority.max(priority);
        }
    }

    fn beta_at(&self, frame: usize) -> f64 {
        let progress = if self.beta_frames == 0 {
            1.0
        } else {
            (frame as f64 / self.beta_frames as f64).min(1.0)
        };
        self.beta_start + (self.beta_end - self.beta_start) * progress
    }

    /// Get current number of transitions
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Check if buffer has enough samples for training
    pub fn is_ready(&self, min_size: usize) -> bool {
        self.size >= min_size
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current importance sampling exponent
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Highest priority assigned so far
    pub fn max_priority(&self) -> f64 {
        self.max_priority
    }

    /// Raw stored priority of a slot
    pub fn priority(&self, index: usize) -> Option<f64> {
        (index < self.size).then(|| self.priorities[index])
    }

    /// Copy of the transition stored in a slot
    pub fn get(&self, index: usize) -> Option<Transition> {
        if index >= self.size {
            return None;
        }
        let mut state = [0.0; STATE_DIM];
        let mut next_state = [0.0; STATE_DIM];
        let range = index * STATE_DIM..(index + 1) * STATE_DIM;
        state.copy_from_slice(&self.states[range.clone()]);
        next_state.copy_from_slice(&self.next_states[range]);

        Some(Transition {
            state,
            action: self.actions[index],
            reward: self.rewards[index],
            next_state,
            done: self.dones[index],
        })
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::from_config(&ReplayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_transition(reward: f32, done: bool) -> Transition {
        Transition::new([reward; STATE_DIM], 0, reward, [reward; STATE_DIM], done)
    }

    fn config(use_per: bool) -> ReplayConfig {
        ReplayConfig {
            use_per,
            per_beta_frames: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_replay_buffer_ring() {
        let mut buffer = ReplayBuffer::new(10, &config(true)).with_seed(1);

        for i in 0..15 {
            buffer.add(make_transition(i as f32, false));
        }

        // Should only keep last 10
        assert_eq!(buffer.len(), 10);
        let rewards: Vec<f32> = (0..10).map(|i| buffer.get(i).unwrap().reward).collect();
        assert!(rewards.iter().all(|r| *r >= 5.0));
        assert_eq!(buffer.get(0).unwrap().reward, 10.0);
    }

    #[test]
    fn test_sample_insufficient_data() {
        let mut buffer = ReplayBuffer::new(10, &config(false));
        buffer.add(make_transition(1.0, false));

        let err = buffer.sample(4).unwrap_err();
        assert!(matches!(
            err,
            PricingError::InsufficientData {
                available: 1,
                requested: 4
            }
        ));
    }

    #[test]
    fn test_uniform_sample() {
        let mut buffer = ReplayBuffer::new(100, &config(false)).with_seed(3);
        for i in 0..50 {
            buffer.add(make_transition(i as f32, i % 7 == 0));
        }

        let batch = buffer.sample(10).unwrap();
        assert_eq!(batch.len(), 10);
        assert_eq!(batch.states.len(), 10 * STATE_DIM);
        assert!(batch.weights.iter().all(|w| *w == 1.0));
        assert!(batch.indices.iter().all(|i| *i < 50));

        let mut unique = batch.indices.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 10);

        for (k, &i) in batch.indices.iter().enumerate() {
            assert_eq!(batch.rewards[k], i as f32);
            assert_eq!(batch.dones[k], if i % 7 == 0 { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn test_prioritized_weights_normalized() {
        let mut buffer = ReplayBuffer::new(64, &config(true)).with_seed(5);
        for i in 0..64 {
            buffer.add(make_transition(i as f32, false));
        }
        let indices: Vec<usize> = (0..64).collect();
        let errors: Vec<f32> = (0..64).map(|i| i as f32 * 0.1).collect();
        buffer.update_priorities(&indices, &errors);

        let batch = buffer.sample(16).unwrap();
        let max = batch.weights.iter().copied().fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(batch.weights.iter().all(|w| *w > 0.0 && *w <= 1.0 + 1e-6));
    }

    #[test]
    fn test_priority_update_and_max_priority() {
        let mut buffer = ReplayBuffer::new(8, &config(true));
        for i in 0..4 {
            buffer.add(make_transition(i as f32, false));
        }
        assert_eq!(buffer.priority(0), Some(1.0));

        buffer.update_priorities(&[1], &[-4.0]);
        let expected = (4.0 + PRIORITY_EPSILON).powf(0.6);
        assert!((buffer.priority(1).unwrap() - expected).abs() < 1e-9);
        assert!((buffer.max_priority() - expected).abs() < 1e-9);

        // New entries inherit the running maximum
        buffer.add(make_transition(9.0, false));
        assert!((buffer.priority(4).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_priorities_ignored_without_per() {
        let mut buffer = ReplayBuffer::new(8, &config(false));
        buffer.add(make_transition(0.0, false));
        buffer.update_priorities(&[0], &[10.0]);
        assert_eq!(buffer.priority(0), Some(1.0));
        assert_eq!(buffer.max_priority(), 1.0);
    }

    #[test]
    fn test_beta_annealing() {
        let mut buffer = ReplayBuffer::new(32, &config(true)).with_seed(9);
        for i in 0..32 {
            buffer.add(make_transition(i as f32, false));
        }

        let mut last = buffer.beta();
        assert!((last - 0.4).abs() < 1e-12);
        for _ in 0..20 {
            buffer.sample(4).unwrap();
            assert!(buffer.beta() >= last);
            last = buffer.beta();
        }
        assert!((buffer.beta() - 1.0).abs() < 1e-12);
    }
}
