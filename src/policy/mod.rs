//! Policy abstractions for natural-gradient training.
//!
//! The engine never looks inside a policy. It works against two seams:
//! - [`ActionSampler`]: batched action selection, enough for samplers and
//!   value baselines
//! - [`NaturalGradientPolicy`]: flat-parameter access, likelihood-ratio
//!   surrogate, KL to a frozen reference snapshot, and Fisher-vector
//!   products for the curvature solve
//!
//! Policies hold two explicit parameter snapshots. "Current" is what acts
//! and gets updated; "reference" is the frozen comparison point for ratios
//! and KL. The reference moves only through [`NaturalGradientPolicy::sync_reference`]
//! or a [`SnapshotUpdate::Both`] write.

pub mod linear_gaussian;

pub use linear_gaussian::LinearGaussianPolicy;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Which parameter snapshots a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotUpdate {
    /// Overwrite the acting parameters, leave the reference frozen
    CurrentOnly,
    /// Overwrite both snapshots
    Both,
}

/// Batched action selection under the current snapshot.
pub trait ActionSampler {
    /// Observation dimension.
    fn obs_dim(&self) -> usize;

    /// Action dimension.
    fn act_dim(&self) -> usize;

    /// Sample one stochastic action per observation row.
    ///
    /// `observations` is [n * obs_dim] flat; the result is [n * act_dim].
    fn sample_actions(&self, observations: &[f64], rng: &mut dyn RngCore) -> Vec<f64>;

    /// Most likely action per observation row.
    fn mode_actions(&self, observations: &[f64]) -> Vec<f64>;
}

/// Everything the policy-update engine needs from a policy.
///
/// All batch arguments are flat row-major: observations [n * obs_dim],
/// actions [n * act_dim], weights [n].
pub trait NaturalGradientPolicy: ActionSampler {
    /// Length of the flat parameter vector.
    fn num_params(&self) -> usize;

    /// Current (acting) parameters.
    fn params(&self) -> Vec<f64>;

    /// Frozen reference parameters.
    fn reference_params(&self) -> Vec<f64>;

    /// Overwrite the selected snapshots with `params`.
    fn set_params(&mut self, params: &[f64], which: SnapshotUpdate);

    /// Advance the reference snapshot to the current parameters.
    fn sync_reference(&mut self);

    /// Log-likelihood of each (observation, action) row under the current
    /// snapshot.
    fn log_likelihood(&self, observations: &[f64], actions: &[f64]) -> Vec<f64>;

    /// CPI surrogate: mean over rows of the current/reference likelihood
    /// ratio times the weight.
    fn surrogate(&self, observations: &[f64], actions: &[f64], weights: &[f64]) -> f64;

    /// Gradient of [`Self::surrogate`] with respect to the current
    /// parameters.
    fn surrogate_grad(&self, observations: &[f64], actions: &[f64], weights: &[f64]) -> Vec<f64>;

    /// Mean KL divergence from the reference snapshot to the current one
    /// over the given observations.
    fn kl_to_reference(&self, observations: &[f64]) -> f64;

    /// Fisher-vector product of the mean-KL curvature at the current
    /// snapshot, averaged over the given observations.
    fn fisher_vector_product(&self, observations: &[f64], v: &[f64]) -> Vec<f64>;

    /// Per-dimension exploration noise scale, for diagnostics.
    fn exploration_std(&self) -> Vec<f64>;
}
