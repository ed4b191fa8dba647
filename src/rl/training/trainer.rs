//! Training Loop
//!
//! Double DQN over the pricing environment. The online network picks the
//! next action, the target network values it, and the target tracks the
//! online network by soft updates after every gradient step.

use burn::backend::Autodiff;
use burn::module::{AutodiffModule, ModuleVisitor, ParamId};
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, TensorData};
use burn_ndarray::NdArray;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PricingError, Result};
use crate::rl::config::DqnConfig;
use crate::rl::core::ContinuousState;
use crate::rl::environment::PricingEnvironment;
use crate::rl::memory::{ReplayBuffer, Transition};
use crate::rl::networks::{
    hard_update, select_action, soft_update, states_tensor, to_vec, QNetwork, QNetworkConfig,
    QValueModel,
};
use crate::rl::training::checkpointing::{
    CheckpointState, Checkpointer, BEST_MODEL, FINAL_MODEL, ONLINE_FILE, OPTIMIZER_FILE,
    TARGET_FILE,
};
use crate::rl::training::early_stopping::EarlyStopping;

/// CPU backend used for training
pub type TrainingBackend = Autodiff<NdArray<f32>>;
/// CPU backend used for evaluation, export and the target network
pub type InferenceBackend = NdArray<f32>;

/// Per-episode training metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    /// 1-based episode number
    pub episode: usize,
    pub total_reward: f64,
    /// Per-step means
    pub avg_revenue: f64,
    pub avg_margin: f64,
    pub avg_volume: f64,
    /// Mean loss over the episode's gradient steps (0 when none ran)
    pub avg_loss: f64,
    /// Gradient steps taken during the episode
    pub train_steps: usize,
    /// Steps that used the synthetic path
    pub synthetic_steps: usize,
    /// Exploration rate after decay
    pub epsilon: f64,
    pub buffer_len: usize,
    /// Rolling average reward once the early stopping window is full
    pub rolling_avg_reward: Option<f64>,
}

/// Summary of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Episodes completed, including any before a resume
    pub episodes: usize,
    pub total_steps: usize,
    pub best_avg_reward: Option<f64>,
    pub early_stopped: bool,
    pub final_epsilon: f64,
    /// Metrics of the episodes run by this call
    pub history: Vec<EpisodeMetrics>,
}

/// Double DQN trainer
pub struct DqnTrainer<B: AutodiffBackend, M: AutodiffModule<B>, O> {
    env: PricingEnvironment,
    buffer: ReplayBuffer,
    online: M,
    target: M::InnerModule,
    optimizer: O,
    config: DqnConfig,
    device: B::Device,
    rng: StdRng,
    epsilon: f64,
    total_steps: usize,
    episodes_completed: usize,
    early_stopping: EarlyStopping,
    checkpointer: Checkpointer,
}

/// Trainer over the default [`QNetwork`] with an AdamW optimizer
///
/// Seeds the backend so weight initialization is reproducible when
/// `training.seed` is set.
pub fn dqn_trainer<B: AutodiffBackend>(
    env: PricingEnvironment,
    config: DqnConfig,
    device: B::Device,
) -> Result<DqnTrainer<B, QNetwork<B>, impl Optimizer<QNetwork<B>, B>>> {
    if let Some(seed) = config.training.seed {
        B::seed(seed);
    }

    let online = QNetworkConfig::from_network(&config.network, env.num_actions()).init::<B>(&device);
    let optimizer = AdamWConfig::new()
        .with_weight_decay(config.training.weight_decay)
        .init::<B, QNetwork<B>>();

    DqnTrainer::new(env, config, online, optimizer, device)
}

impl<B, M, O> DqnTrainer<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + QValueModel<B>,
    M::InnerModule: QValueModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    /// Create a trainer; the target network starts as a copy of `online`
    pub fn new(
        env: PricingEnvironment,
        config: DqnConfig,
        online: M,
        optimizer: O,
        device: B::Device,
    ) -> Result<Self> {
        config.ensure_valid()?;

        if online.num_actions() != env.num_actions() {
            return Err(PricingError::InvalidConfig(format!(
                "network outputs {} actions but the environment has {}",
                online.num_actions(),
                env.num_actions()
            )));
        }

        let buffer = ReplayBuffer::from_config(&config.replay);
        let (buffer, rng) = match config.training.seed {
            Some(seed) => (
                buffer.with_seed(seed.wrapping_add(1)),
                StdRng::seed_from_u64(seed.wrapping_add(2)),
            ),
            None => (buffer, StdRng::from_entropy()),
        };

        let target = hard_update(&online);

        Ok(Self {
            env,
            buffer,
            target,
            online,
            optimizer,
            epsilon: config.training.epsilon_start,
            early_stopping: EarlyStopping::new(&config.early_stopping),
            checkpointer: Checkpointer::new(&config.logging.checkpoint_dir),
            config,
            device,
            rng,
            total_steps: 0,
            episodes_completed: 0,
        })
    }

    /// Run episodes until the budget is spent or early stopping fires
    ///
    /// A final checkpoint is always written.
    pub fn train(&mut self) -> Result<TrainingReport> {
        let episodes = self.config.training.episodes;
        let log_interval = self.config.logging.log_interval.max(1);
        let mut history = Vec::new();
        let mut early_stopped = false;

        info!(
            "Starting training: episodes {}..{}, {} steps each, {} actions",
            self.episodes_completed + 1,
            episodes,
            self.config.training.steps_per_episode,
            self.env.num_actions()
        );

        while self.episodes_completed < episodes {
            let mut metrics = self.run_episode()?;

            let check = self.early_stopping.update(metrics.total_reward);
            metrics.rolling_avg_reward = check.rolling_mean;

            if check.improved {
                if let Some(avg) = check.rolling_mean {
                    info!("New best average reward: {:.4}", avg);
                }
                self.save_checkpoint(BEST_MODEL)?;
            }

            if metrics.episode % log_interval == 0 {
                info!(
                    "Episode {}/{}: reward={:.4}, avg={:.4}, loss={:.4}, eps={:.3}, buffer={}",
                    metrics.episode,
                    episodes,
                    metrics.total_reward,
                    check.rolling_mean.unwrap_or(metrics.total_reward),
                    metrics.avg_loss,
                    metrics.epsilon,
                    metrics.buffer_len
                );
            }

            history.push(metrics);

            if check.should_stop {
                info!(
                    "Early stopping at episode {} (best average reward {:.4})",
                    self.episodes_completed,
                    self.early_stopping.best().unwrap_or(f64::NAN)
                );
                early_stopped = true;
                break;
            }
        }

        self.save_checkpoint(FINAL_MODEL)?;

        info!(
            "Training complete: {} episodes, {} steps",
            self.episodes_completed, self.total_steps
        );

        Ok(TrainingReport {
            episodes: self.episodes_completed,
            total_steps: self.total_steps,
            best_avg_reward: self.early_stopping.best(),
            early_stopped,
            final_epsilon: self.epsilon,
            history,
        })
    }

    /// Run a single episode and decay epsilon
    pub fn run_episode(&mut self) -> Result<EpisodeMetrics> {
        let steps = self.config.training.steps_per_episode;
        let warmup = self
            .config
            .training
            .warmup_steps
            .max(self.config.training.batch_size);
        let train_frequency = self.config.training.train_frequency.max(1);
        let synthetic_ratio = self.config.environment.synthetic_ratio;

        let mut state = self.env.reset();
        let mut total_reward = 0.0;
        let (mut revenue, mut margin, mut volume) = (0.0, 0.0, 0.0);
        let mut loss_sum = 0.0;
        let mut train_steps = 0;
        let mut synthetic_steps = 0;

        for _ in 0..steps {
            let action = self.act(&state)?;
            let use_synthetic = self.rng.gen::<f64>() < synthetic_ratio;
            let step = self.env.step(action, use_synthetic)?;

            self.buffer.add(Transition::new(
                state,
                action,
                step.reward as f32,
                step.next_state,
                step.done,
            ));

            total_reward += step.reward;
            revenue += step.info.revenue;
            margin += step.info.margin;
            volume += step.info.volume;
            if step.synthetic {
                synthetic_steps += 1;
            }
            state = step.next_state;
            self.total_steps += 1;

            if self.buffer.is_ready(warmup) && self.total_steps % train_frequency == 0 {
                loss_sum += f64::from(self.train_step()?);
                train_steps += 1;
            }
        }

        self.epsilon = (self.epsilon * self.config.training.epsilon_decay)
            .max(self.config.training.epsilon_end);
        self.episodes_completed += 1;

        let per_step = steps.max(1) as f64;
        Ok(EpisodeMetrics {
            episode: self.episodes_completed,
            total_reward,
            avg_revenue: revenue / per_step,
            avg_margin: margin / per_step,
            avg_volume: volume / per_step,
            avg_loss: if train_steps > 0 {
                loss_sum / train_steps as f64
            } else {
                0.0
            },
            train_steps,
            synthetic_steps,
            epsilon: self.epsilon,
            buffer_len: self.buffer.len(),
            rolling_avg_reward: None,
        })
    }

    /// Epsilon-greedy action from the online network
    fn act(&mut self, state: &ContinuousState) -> Result<usize> {
        let model = self.online.valid();
        select_action(&model, state, self.epsilon, &mut self.rng, &self.device)
    }

    /// One gradient step on a sampled mini-batch, returning the loss
    pub fn train_step(&mut self) -> Result<f32> {
        let training = &self.config.training;
        let batch = self.buffer.sample(training.batch_size)?;
        let n = batch.len();
        let device = &self.device;

        let actions: Vec<i64> = batch.actions.iter().map(|&a| a as i64).collect();
        let actions = Tensor::<B, 1, Int>::from_data(TensorData::new(actions, [n]), device)
            .reshape([n, 1]);

        // Q(s, a) for the taken actions
        let states = states_tensor::<B>(batch.states, device);
        let q_pred = self.online.q_values(states).gather(1, actions).reshape([n]);

        let target_q = double_dqn_targets::<B, _, _>(
            &self.online,
            &self.target,
            batch.next_states,
            batch.rewards,
            batch.dones,
            training.gamma,
            device,
        );

        let td = q_pred - Tensor::<B, 1>::from_inner(target_q);
        let td_errors = to_vec(td.clone().inner())?;

        let weights = Tensor::<B, 1>::from_data(TensorData::new(batch.weights, [n]), device);
        let loss = (huber(td) * weights).mean();
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = loss.backward();
        let mut grads = GradientsParams::from_grads(grads, &self.online);
        let grad_norm = clip_grad_norm(&self.online, &mut grads, training.gradient_clip_max_norm);

        self.online = self
            .optimizer
            .step(training.learning_rate, self.online.clone(), grads);
        self.target = soft_update(self.target.clone(), &self.online.valid(), training.tau);

        self.buffer.update_priorities(&batch.indices, &td_errors);

        debug!(
            "Train step {}: loss={:.6}, grad_norm={:.4}",
            self.total_steps, loss_value, grad_norm
        );

        Ok(loss_value)
    }

    /// Write online, target and optimizer state plus bookkeeping
    pub fn save_checkpoint(&self, name: &str) -> Result<()> {
        let staged = self.checkpointer.stage(name)?;
        staged.save_module::<B, _>(ONLINE_FILE, &self.online)?;
        staged.save_module::<B::InnerBackend, _>(TARGET_FILE, &self.target)?;
        staged.save_record::<B, _>(OPTIMIZER_FILE, self.optimizer.to_record())?;
        staged.write_state(&self.checkpoint_state())?;
        staged.commit()?;
        Ok(())
    }

    /// Restore networks, optimizer and bookkeeping from a checkpoint
    ///
    /// Epsilon, step and episode counts and the best average reward are
    /// restored exactly. The early stopping window starts empty.
    pub fn resume(mut self, name: &str) -> Result<Self> {
        let state = self.checkpointer.load_state(name)?;

        if state.num_actions() != self.env.num_actions() {
            return Err(PricingError::Checkpoint(format!(
                "checkpoint has {} actions but the environment has {}",
                state.num_actions(),
                self.env.num_actions()
            )));
        }

        self.online = self
            .checkpointer
            .load_module::<B, _>(name, ONLINE_FILE, self.online, &self.device)?;
        self.target = self.checkpointer.load_module::<B::InnerBackend, _>(
            name,
            TARGET_FILE,
            self.target,
            &self.device,
        )?;
        let record = self
            .checkpointer
            .load_record::<B, O::Record>(name, OPTIMIZER_FILE, &self.device)?;
        self.optimizer = self.optimizer.load_record(record);

        self.epsilon = state.epsilon;
        self.total_steps = state.total_steps;
        self.episodes_completed = state.episode;
        self.early_stopping.restore_best(state.best_avg_reward);

        info!(
            "Resumed from {} at episode {} ({} steps, eps={:.3})",
            name, state.episode, state.total_steps, state.epsilon
        );

        Ok(self)
    }

    fn checkpoint_state(&self) -> CheckpointState {
        CheckpointState {
            episode: self.episodes_completed,
            total_steps: self.total_steps,
            epsilon: self.epsilon,
            best_avg_reward: self.early_stopping.best(),
            layout: *self.env.encoder().layout(),
            config: self.config.clone(),
            saved_at: Utc::now(),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn episodes_completed(&self) -> usize {
        self.episodes_completed
    }

    pub fn best_avg_reward(&self) -> Option<f64> {
        self.early_stopping.best()
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn environment(&self) -> &PricingEnvironment {
        &self.env
    }

    pub fn checkpointer(&self) -> &Checkpointer {
        &self.checkpointer
    }

    /// Online network
    pub fn online(&self) -> &M {
        &self.online
    }

    /// Target network
    pub fn target(&self) -> &M::InnerModule {
        &self.target
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }
}

/// Elementwise Huber loss with delta 1
fn huber<B: Backend>(td: Tensor<B, 1>) -> Tensor<B, 1> {
    let abs = td.abs();
    let quadratic = abs.clone().clamp_max(1.0);
    let linear = abs - quadratic.clone();
    quadratic.powf_scalar(2.0).mul_scalar(0.5) + linear
}

/// `r + gamma * (1 - done) * Q_target(s', argmax_a Q_online(s', a))`
fn double_dqn_targets<B, M, T>(
    online: &M,
    target: &T,
    next_states: Vec<f32>,
    rewards: Vec<f32>,
    dones: Vec<f32>,
    gamma: f32,
    device: &B::Device,
) -> Tensor<B::InnerBackend, 1>
where
    B: AutodiffBackend,
    M: QValueModel<B>,
    T: QValueModel<B::InnerBackend>,
{
    let n = rewards.len();

    let next_online = states_tensor::<B>(next_states.clone(), device);
    let next_actions = online.q_values(next_online).inner().argmax(1);

    let next_q = target
        .q_values(states_tensor::<B::InnerBackend>(next_states, device))
        .gather(1, next_actions)
        .reshape([n]);

    let rewards = Tensor::<B::InnerBackend, 1>::from_data(TensorData::new(rewards, [n]), device);
    let not_done = Tensor::<B::InnerBackend, 1>::from_data(TensorData::new(dones, [n]), device)
        .mul_scalar(-1.0)
        .add_scalar(1.0);

    rewards + not_done * next_q.mul_scalar(gamma)
}

/// Sums squared gradient entries across all parameters
struct GradNormAccumulator<'a> {
    grads: &'a GradientsParams,
    sum_sq: f32,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradNormAccumulator<'_> {
    fn visit_float<const D: usize>(&mut self, id: &ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.sum_sq += grad.powf_scalar(2.0).sum().into_scalar().elem::<f32>();
        }
    }
}

/// Rescales every gradient by a common factor
struct GradScaler<'a> {
    grads: &'a mut GradientsParams,
    scale: f32,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradScaler<'_> {
    fn visit_float<const D: usize>(&mut self, id: &ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id.clone(), grad.mul_scalar(self.scale));
        }
    }
}

/// Clip gradients to a maximum global L2 norm, returning the norm before clipping
pub fn clip_grad_norm<B: AutodiffBackend, M: AutodiffModule<B>>(
    module: &M,
    grads: &mut GradientsParams,
    max_norm: f32,
) -> f32 {
    let mut accumulator = GradNormAccumulator {
        grads: &*grads,
        sum_sq: 0.0,
    };
    module.visit(&mut accumulator);
    let norm = accumulator.sum_sq.sqrt();

    if norm > max_norm {
        let mut scaler = GradScaler {
            grads,
            scale: max_norm / (norm + 1e-6),
        };
        module.visit(&mut scaler);
    }

    norm
}
