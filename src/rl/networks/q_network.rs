//! Q-Network (action-value function)
//!
//! The trainer only relies on the [`QValueModel`] contract: a batch of
//! states in, one value per action out. [`QNetwork`] is the default MLP
//! implementation.

use burn::module::{AutodiffModule, Module, ModuleMapper, ModuleVisitor, ParamId};
use burn::nn::{
    BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, Linear, LinearConfig, Relu,
};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::TensorData;
use rand::Rng;

// `derive(Config)` expands to code naming the two-argument `Result`
use crate::error::PricingError;
use crate::rl::config::NetworkConfig;
use crate::rl::core::{ContinuousState, STATE_DIM};

/// Action-value function approximator
pub trait QValueModel<B: Backend> {
    /// Q-values `[batch, num_actions]` for states `[batch, STATE_DIM]`
    fn q_values(&self, states: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Size of the action space
    fn num_actions(&self) -> usize;
}

/// Q-network configuration
#[derive(Config, Debug)]
pub struct QNetworkConfig {
    /// Number of discrete actions
    pub num_actions: usize,
    /// Input dimension
    #[config(default = "STATE_DIM")]
    pub input_dim: usize,
    /// Hidden layer sizes
    #[config(default = "vec![128, 128, 64]")]
    pub hidden_dims: Vec<usize>,
    /// Batch normalization after each hidden linear layer
    #[config(default = "true")]
    pub use_batch_norm: bool,
    /// Dropout after each hidden activation (0 disables)
    #[config(default = "0.0")]
    pub dropout_rate: f64,
}

impl QNetworkConfig {
    /// Build from the `network` config section
    pub fn from_network(network: &NetworkConfig, num_actions: usize) -> Self {
        Self::new(num_actions)
            .with_hidden_dims(network.hidden_dims.clone())
            .with_use_batch_norm(network.use_batch_norm)
            .with_dropout_rate(network.dropout_rate)
    }

    /// Initialize the Q-network with Xavier-uniform weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        let mut hidden = Vec::with_capacity(self.hidden_dims.len());
        let mut input = self.input_dim;

        for &size in &self.hidden_dims {
            hidden.push(HiddenLayer {
                linear: xavier_linear(input, size, device),
                norm: self
                    .use_batch_norm
                    .then(|| BatchNormConfig::new(size).init(device)),
                dropout: (self.dropout_rate > 0.0)
                    .then(|| DropoutConfig::new(self.dropout_rate).init()),
                activation: Relu::new(),
            });
            input = size;
        }

        QNetwork {
            hidden,
            output: xavier_linear(input, self.num_actions, device),
        }
    }
}

fn xavier_linear<B: Backend>(input: usize, output: usize, device: &B::Device) -> Linear<B> {
    LinearConfig::new(input, output)
        .with_initializer(Initializer::XavierUniform { gain: 1.0 })
        .init(device)
}

/// Linear -> (BatchNorm) -> ReLU -> (Dropout)
#[derive(Module, Debug)]
pub struct HiddenLayer<B: Backend> {
    linear: Linear<B>,
    norm: Option<BatchNorm<B, 0>>,
    dropout: Option<Dropout>,
    activation: Relu,
}

impl<B: Backend> HiddenLayer<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        let x = self.activation.forward(x);
        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        }
    }
}

/// Multi-layer perceptron over the 9-feature pricing state
///
/// Batch norm uses batch statistics on an autodiff backend and running
/// statistics otherwise, so single-state inference should go through the
/// inner (validation) module.
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    hidden: Vec<HiddenLayer<B>>,
    output: Linear<B>,
}

impl<B: Backend> QNetwork<B> {
    /// Forward pass returning Q-values for all actions
    pub fn forward(&self, states: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self
            .hidden
            .iter()
            .fold(states, |x, layer| layer.forward(x));
        self.output.forward(x)
    }
}

impl<B: Backend> QValueModel<B> for QNetwork<B> {
    fn q_values(&self, states: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(states)
    }

    fn num_actions(&self) -> usize {
        self.output.weight.val().dims()[1]
    }
}

/// Build a `[n, STATE_DIM]` tensor from row-major features
pub fn states_tensor<B: Backend>(features: Vec<f32>, device: &B::Device) -> Tensor<B, 2> {
    let n = features.len() / STATE_DIM;
    Tensor::from_data(TensorData::new(features, [n, STATE_DIM]), device)
}

/// Flatten states into a `[n, STATE_DIM]` tensor
pub fn batch_states<B: Backend>(states: &[ContinuousState], device: &B::Device) -> Tensor<B, 2> {
    let features: Vec<f32> = states.iter().flat_map(|s| s.iter().copied()).collect();
    states_tensor(features, device)
}

/// Extract a float tensor into a flat vector
pub fn to_vec<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
) -> crate::error::Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(PricingError::tensor)
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}

/// Greedy action for each state
pub fn greedy_actions<B: Backend, M: QValueModel<B>>(
    model: &M,
    states: &[ContinuousState],
    device: &B::Device,
) -> crate::error::Result<Vec<usize>> {
    if states.is_empty() {
        return Ok(Vec::new());
    }
    let num_actions = model.num_actions();
    let q = to_vec(model.q_values(batch_states(states, device)))?;
    Ok(q.chunks(num_actions).map(argmax).collect())
}

/// Epsilon-greedy action selection
///
/// Uniformly random with probability `epsilon`, otherwise the arg-max
/// action of `model`.
pub fn select_action<B: Backend, M: QValueModel<B>, R: Rng + ?Sized>(
    model: &M,
    state: &ContinuousState,
    epsilon: f64,
    rng: &mut R,
    device: &B::Device,
) -> crate::error::Result<usize> {
    let num_actions = model.num_actions();
    if rng.gen::<f64>() < epsilon {
        return Ok(rng.gen_range(0..num_actions));
    }
    let q = to_vec(model.q_values(batch_states(std::slice::from_ref(state), device)))?;
    Ok(argmax(&q))
}

/// Collects every float tensor of a module, flattened, in traversal order
struct ParamCollector<B: Backend> {
    tensors: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector<B> {
    fn visit_float<const D: usize>(&mut self, _id: &ParamId, tensor: &Tensor<B, D>) {
        let n = tensor.shape().num_elements();
        self.tensors.push(tensor.clone().reshape([n]));
    }
}

/// Blends each float tensor toward the collected source tensor
struct SoftBlend<B: Backend> {
    source: std::vec::IntoIter<Tensor<B, 1>>,
    tau: f32,
}

impl<B: Backend> ModuleMapper<B> for SoftBlend<B> {
    fn map_float<const D: usize>(&mut self, _id: &ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        match self.source.next() {
            Some(source) => {
                let shape = tensor.shape();
                tensor.mul_scalar(1.0 - self.tau) + source.reshape(shape).mul_scalar(self.tau)
            }
            None => tensor,
        }
    }
}

/// `target <- tau * source + (1 - tau) * target` for every float tensor
///
/// Tensors are matched by traversal order, so both modules must share the
/// same structure. Batch-norm running statistics are blended as well.
pub fn soft_update<B: Backend, M: Module<B>>(target: M, source: &M, tau: f32) -> M {
    let mut collector = ParamCollector {
        tensors: Vec::new(),
    };
    source.visit(&mut collector);

    let mut blend = SoftBlend {
        source: collector.tensors.into_iter(),
        tau,
    };
    target.map(&mut blend)
}

/// Detached copy of the online network (hard update)
pub fn hard_update<B: AutodiffBackend, M: AutodiffModule<B>>(online: &M) -> M::InnerModule {
    online.valid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type TestBackend = NdArray<f32>;

    fn small_config() -> QNetworkConfig {
        QNetworkConfig::new(5).with_hidden_dims(vec![16, 8])
    }

    fn params(model: &QNetwork<TestBackend>) -> Vec<f32> {
        let mut collector = ParamCollector {
            tensors: Vec::new(),
        };
        model.visit(&mut collector);
        collector
            .tensors
            .into_iter()
            .flat_map(|t| to_vec(t).unwrap())
            .collect()
    }

    #[test]
    fn test_q_network_forward() {
        let device = Default::default();
        let network = small_config().init::<TestBackend>(&device);

        // Batch of 4 states
        let input = Tensor::<TestBackend, 2>::zeros([4, STATE_DIM], &device);
        let output = network.forward(input);

        assert_eq!(output.dims(), [4, 5]);
        assert_eq!(network.num_actions(), 5);
    }

    #[test]
    fn test_q_network_without_batch_norm() {
        let device = Default::default();
        let network = small_config()
            .with_use_batch_norm(false)
            .with_dropout_rate(0.2)
            .init::<TestBackend>(&device);
        let output = network.forward(Tensor::zeros([1, STATE_DIM], &device));
        assert_eq!(output.dims(), [1, 5]);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax(&[0.0]), 0);
        assert_eq!(argmax(&[-5.0, -1.0]), 1);
    }

    #[test]
    fn test_select_action_greedy_and_random() {
        let device = Default::default();
        let network = small_config().init::<TestBackend>(&device);
        let state = [0.5; STATE_DIM];
        let mut rng = StdRng::seed_from_u64(0);

        let greedy = greedy_actions(&network, &[state], &device).unwrap()[0];
        for _ in 0..10 {
            assert_eq!(
                select_action(&network, &state, 0.0, &mut rng, &device).unwrap(),
                greedy
            );
        }

        let mut seen = [false; 5];
        for _ in 0..200 {
            seen[select_action(&network, &state, 1.0, &mut rng, &device).unwrap()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_soft_update_blends_parameters() {
        let device = Default::default();
        let online = small_config().init::<TestBackend>(&device);
        let target = small_config().init::<TestBackend>(&device);

        let before = params(&target);
        let source = params(&online);
        let blended = params(&soft_update(target, &online, 0.25));

        assert_eq!(blended.len(), before.len());
        for ((b, s), t) in blended.iter().zip(&source).zip(&before) {
            assert!((b - (0.25 * s + 0.75 * t)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_hard_update_copies_parameters() {
        let device = Default::default();
        let online = small_config().init::<Autodiff<TestBackend>>(&device);
        let copy = hard_update(&online);
        let expected = params(&online.valid());
        assert_eq!(params(&copy), expected);

        let online = copy;

        let full = soft_update(small_config().init::<TestBackend>(&device), &online, 1.0);
        for (a, b) in params(&full).iter().zip(params(&online).iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
