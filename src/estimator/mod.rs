//! Action-value estimator contract.
//!
//! The trainer fits the estimator incrementally from the replay buffer and
//! queries it for advantage weights. Internals are the estimator's own
//! business; [`LinearQEstimator`] is the bundled reference implementation.

pub mod linear_q;

pub use linear_q::{LinearQConfig, LinearQEstimator};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::buffers::ReplayBuffer;
use crate::policy::ActionSampler;

/// Loss breakdown from one incremental fit, one entry per minibatch step.
///
/// `total` is the weighted objective actually descended; the remaining
/// columns are its components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BellmanReport {
    /// Combined objective per step
    pub total_losses: Vec<f64>,
    /// Q regression loss per step
    pub bellman_losses: Vec<f64>,
    /// Observation reconstruction loss per step
    pub reconstruction_losses: Vec<f64>,
    /// Reward prediction loss per step
    pub reward_losses: Vec<f64>,
    /// Wall-clock seconds spent fitting
    pub elapsed_secs: f64,
}

/// How the state value V(s) is derived from Q.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineMode {
    /// V(s) = Q(s, mode action)
    Simple,
    /// V(s) = mean of Q(s, a_i) over actions sampled from the policy
    Averaged {
        /// Number of sampled actions per state
        num_value_actions: usize,
    },
}

/// Action-value estimator fitted from replayed transitions.
pub trait ValueEstimator {
    /// Run one incremental fit against the buffer's stored returns.
    fn bellman_update(&mut self, buffer: &ReplayBuffer, rng: &mut dyn RngCore) -> BellmanReport;

    /// Q(s, a, t) for each row.
    fn predict(&self, observations: &[f64], actions: &[f64], times: &[f64]) -> Vec<f64>;

    /// State value V(s, t) for each row, derived from Q under the given
    /// policy.
    fn average_value(
        &self,
        policy: &dyn ActionSampler,
        observations: &[f64],
        times: &[f64],
        rng: &mut dyn RngCore,
    ) -> Vec<f64>;
}
