//! Replay buffer of flattened transitions for off-policy critic fitting.
//!
//! Key characteristics:
//! - Stores individual transitions, flattened out of whole trajectories
//! - Keeps the discounted return alongside each transition as the
//!   regression target for the action-value estimator
//! - Optional capacity with oldest-first eviction
//! - Uniform sampling without replacement

use std::collections::VecDeque;

use rand::Rng;

use crate::core::Trajectory;

/// One stored transition.
#[derive(Debug, Clone)]
pub struct StoredTransition {
    /// Observation the action was taken from
    pub observation: Vec<f64>,
    /// Action taken
    pub action: Vec<f64>,
    /// Step index within its episode
    pub time: f64,
    /// Immediate reward
    pub reward: f64,
    /// Discounted return from this step onward
    pub discounted_return: f64,
}

/// Columnar batch drawn from the buffer.
#[derive(Debug, Clone)]
pub struct ReplayBatch {
    /// Observations, [len * obs_dim]
    pub observations: Vec<f64>,
    /// Actions, [len * act_dim]
    pub actions: Vec<f64>,
    /// Step indices, [len]
    pub times: Vec<f64>,
    /// Immediate rewards, [len]
    pub rewards: Vec<f64>,
    /// Discounted returns, [len]
    pub returns: Vec<f64>,
    /// Observation dimension
    pub obs_dim: usize,
    /// Action dimension
    pub act_dim: usize,
}

impl ReplayBatch {
    /// Number of transitions in the batch.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Check if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// FIFO transition store feeding the estimator and the replay advantage
/// source.
///
/// Insertion order is preserved; when a capacity is set, pushing past it
/// evicts the oldest transitions first.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    storage: VecDeque<StoredTransition>,
    capacity: Option<usize>,
    obs_dim: usize,
    act_dim: usize,
}

impl ReplayBuffer {
    /// Create an unbounded buffer.
    pub fn new() -> Self {
        Self {
            storage: VecDeque::new(),
            capacity: None,
            obs_dim: 0,
            act_dim: 0,
        }
    }

    /// Create a buffer that evicts oldest transitions past `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
            obs_dim: 0,
            act_dim: 0,
        }
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Configured capacity, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Observation dimension, 0 until the first push.
    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    /// Action dimension, 0 until the first push.
    pub fn act_dim(&self) -> usize {
        self.act_dim
    }

    /// Flatten trajectories into the buffer, oldest trajectory first.
    ///
    /// Trajectories must have their `returns` column filled in; dimensions
    /// must agree with previously stored transitions.
    pub fn push_paths(&mut self, paths: &[Trajectory]) {
        for path in paths {
            assert_eq!(
                path.returns.len(),
                path.len(),
                "trajectory pushed before compute_returns"
            );
            if path.is_empty() {
                continue;
            }

            if self.storage.is_empty() && self.obs_dim == 0 {
                self.obs_dim = path.obs_dim();
                self.act_dim = path.act_dim();
            }
            assert_eq!(path.obs_dim(), self.obs_dim);
            assert_eq!(path.act_dim(), self.act_dim);

            for (step, &ret) in path.iter().zip(path.returns.iter()) {
                self.storage.push_back(StoredTransition {
                    observation: step.observation.clone(),
                    action: step.action.clone(),
                    time: step.time,
                    reward: step.reward,
                    discounted_return: ret,
                });
            }
        }

        if let Some(cap) = self.capacity {
            while self.storage.len() > cap {
                self.storage.pop_front();
            }
        }
    }

    /// Draw `min(k, len)` distinct transitions uniformly at random.
    pub fn sample_batch<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> ReplayBatch {
        let amount = k.min(self.storage.len());
        let indices = rand::seq::index::sample(rng, self.storage.len(), amount);

        let mut observations = Vec::with_capacity(amount * self.obs_dim);
        let mut actions = Vec::with_capacity(amount * self.act_dim);
        let mut times = Vec::with_capacity(amount);
        let mut rewards = Vec::with_capacity(amount);
        let mut returns = Vec::with_capacity(amount);

        for idx in indices.iter() {
            let t = &self.storage[idx];
            observations.extend_from_slice(&t.observation);
            actions.extend_from_slice(&t.action);
            times.push(t.time);
            rewards.push(t.reward);
            returns.push(t.discounted_return);
        }

        ReplayBatch {
            observations,
            actions,
            times,
            rewards,
            returns,
            obs_dim: self.obs_dim,
            act_dim: self.act_dim,
        }
    }

    /// Iterate over stored transitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &StoredTransition> {
        self.storage.iter()
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}
