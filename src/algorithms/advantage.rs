//! Advantage-weight construction for the policy update.
//!
//! Two interchangeable sources produce the same batch shape:
//! - on-policy: the freshly sampled trajectories with their recorded
//!   actions
//! - replay: states drawn from the buffer with actions resampled from the
//!   current policy
//!
//! Either way the weight is Q(s, a, t) - V(s, t). Sub-iterations past the
//! first always use replay, so mixed sources meet the engine on the same
//! normalized scale.

use rand::RngCore;

use crate::buffers::ReplayBuffer;
use crate::core::{Trajectory, UpdateBatch};
use crate::estimator::ValueEstimator;
use crate::policy::ActionSampler;

/// Normalize weights in place to mean 0 and unit scale.
///
/// The epsilon sits outside the standard deviation, so a constant vector
/// maps to all zeros instead of NaN.
pub fn normalize_weights(weights: &mut [f64]) {
    if weights.is_empty() {
        return;
    }

    let n = weights.len() as f64;
    let mean = weights.iter().sum::<f64>() / n;
    let variance = weights.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    if std == 0.0 {
        log::debug!("constant advantage weights, normalization yields zeros");
    }

    for w in weights.iter_mut() {
        *w = (*w - mean) / (std + 1e-6);
    }
}

/// Build the update batch from freshly collected trajectories.
///
/// Weights are raw Q - V; the engine normalizes.
pub fn on_policy_batch<V: ValueEstimator>(
    paths: &[Trajectory],
    estimator: &V,
    policy: &dyn ActionSampler,
    rng: &mut dyn RngCore,
) -> UpdateBatch {
    let obs_dim = paths.first().map_or(0, |p| p.obs_dim());
    let act_dim = paths.first().map_or(0, |p| p.act_dim());

    let mut observations = Vec::new();
    let mut actions = Vec::new();
    let mut times = Vec::new();
    for path in paths {
        observations.extend(path.observations_flat());
        actions.extend(path.actions_flat());
        times.extend(path.times());
    }

    let qs = estimator.predict(&observations, &actions, &times);
    let vs = estimator.average_value(policy, &observations, &times, rng);
    let weights: Vec<f64> = qs.iter().zip(vs.iter()).map(|(q, v)| q - v).collect();

    UpdateBatch::new(observations, actions, weights, obs_dim, act_dim)
}

/// Build the update batch from replayed states.
///
/// Stored actions are ignored; fresh actions come from the current policy
/// so the weights reflect the distribution being optimized.
pub fn replay_batch<V: ValueEstimator>(
    buffer: &ReplayBuffer,
    num_states: usize,
    estimator: &V,
    policy: &dyn ActionSampler,
    rng: &mut dyn RngCore,
) -> UpdateBatch {
    let sample = buffer.sample_batch(num_states, rng);
    let observations = sample.observations;
    let times = sample.times;

    let actions = policy.sample_actions(&observations, rng);
    let qs = estimator.predict(&observations, &actions, &times);
    let vs = estimator.average_value(policy, &observations, &times, rng);
    let weights: Vec<f64> = qs.iter().zip(vs.iter()).map(|(q, v)| q - v).collect();

    UpdateBatch::new(
        observations,
        actions,
        weights,
        sample.obs_dim,
        sample.act_dim,
    )
}
