//! Neural Network Architectures
//!
//! Q-value function approximator for Double DQN.

pub mod q_network;

pub use q_network::{
    argmax, batch_states, greedy_actions, hard_update, select_action, soft_update,
    states_tensor, to_vec, QNetwork, QNetworkConfig, QValueModel,
};
