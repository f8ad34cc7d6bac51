//! Trajectory collection for the training loop.
//!
//! The trainer only needs a [`Sampler`]: something that turns a policy and
//! a [`SampleRequest`] into trajectories. [`EnvSampler`] is the bundled
//! implementation rolling out [`Environment`] instances, serially or
//! across a rayon pool.

pub mod env_sampler;

pub use env_sampler::EnvSampler;

use serde::{Deserialize, Serialize};

use crate::core::Trajectory;
use crate::policy::ActionSampler;

/// Result of one environment step.
#[derive(Debug, Clone)]
pub struct EnvStep {
    /// Observation after the step
    pub observation: Vec<f64>,
    /// Reward received
    pub reward: f64,
    /// Episode over (terminal or truncated)
    pub done: bool,
}

/// Single environment instance the bundled sampler can roll out.
pub trait Environment {
    /// Observation dimension.
    fn obs_dim(&self) -> usize;

    /// Action dimension.
    fn act_dim(&self) -> usize;

    /// Start a new episode, seeding any internal randomness.
    fn reset(&mut self, seed: u64) -> Vec<f64>;

    /// Advance one step.
    fn step(&mut self, action: &[f64]) -> EnvStep;
}

/// What `count` in a [`SampleRequest`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleMode {
    /// Collect exactly `count` trajectories
    Trajectories,
    /// Collect trajectories until at least `count` transitions exist
    Transitions,
}

/// One collection request.
#[derive(Debug, Clone)]
pub struct SampleRequest {
    /// Number of trajectories or transitions, per `mode`
    pub count: usize,
    /// Interpretation of `count`
    pub mode: SampleMode,
    /// Maximum steps per rollout
    pub horizon: usize,
    /// Seed base; rollout `i` derives its seed as `base_seed + i`
    pub base_seed: u64,
}

/// Trajectory source for the trainer.
pub trait Sampler<P: ActionSampler> {
    /// Collect trajectories under the current snapshot of `policy`.
    fn sample(&mut self, policy: &P, request: &SampleRequest) -> Vec<Trajectory>;
}
