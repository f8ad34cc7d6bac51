//! Linear action-value estimator with auxiliary heads.
//!
//! Q(s, a, t) is a linear function of the feature vector
//! [s, a, t * time_scale, 1]. Two auxiliary linear heads share the same
//! features: one reconstructs the observation, one predicts the immediate
//! reward. Their losses are diagnostics for how informative the features
//! are; only their configured weights pull on the shared objective.
//!
//! Fitting is plain minibatch SGD toward the stored discounted returns.
//! The heads are independent, so each minibatch step is a closed-form
//! gradient on three least-squares objectives.

use std::time::Instant;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{BaselineMode, BellmanReport, ValueEstimator};
use crate::buffers::{ReplayBatch, ReplayBuffer};
use crate::policy::ActionSampler;

/// Configuration for [`LinearQEstimator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearQConfig {
    /// SGD step size
    pub learning_rate: f64,
    /// Transitions per minibatch
    pub minibatch_size: usize,
    /// Minibatch steps per `bellman_update` call
    pub fit_iters: usize,
    /// Weight of the reconstruction loss in the shared objective
    pub reconstruction_weight: f64,
    /// Weight of the reward loss in the shared objective
    pub reward_weight: f64,
    /// Scale applied to the raw time index before it enters the features
    pub time_scale: f64,
    /// How V(s) is derived from Q
    pub baseline_mode: BaselineMode,
}

impl Default for LinearQConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            minibatch_size: 64,
            fit_iters: 10,
            reconstruction_weight: 1.0,
            reward_weight: 1.0,
            time_scale: 1e-2,
            baseline_mode: BaselineMode::Simple,
        }
    }
}

impl LinearQConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SGD step size.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the minibatch size.
    pub fn with_minibatch_size(mut self, minibatch_size: usize) -> Self {
        self.minibatch_size = minibatch_size;
        self
    }

    /// Set the number of minibatch steps per fit call.
    pub fn with_fit_iters(mut self, fit_iters: usize) -> Self {
        self.fit_iters = fit_iters;
        self
    }

    /// Set the baseline mode.
    pub fn with_baseline_mode(mut self, baseline_mode: BaselineMode) -> Self {
        self.baseline_mode = baseline_mode;
        self
    }

    /// Check parameter sanity.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.learning_rate <= 0.0 {
            return Err("learning_rate must be > 0");
        }
        if self.minibatch_size == 0 {
            return Err("minibatch_size must be > 0");
        }
        if self.fit_iters == 0 {
            return Err("fit_iters must be > 0");
        }
        if let BaselineMode::Averaged { num_value_actions } = self.baseline_mode {
            if num_value_actions == 0 {
                return Err("num_value_actions must be > 0");
            }
        }
        Ok(())
    }
}

/// Linear Q estimator with reconstruction and reward heads.
#[derive(Debug, Clone)]
pub struct LinearQEstimator {
    config: LinearQConfig,
    obs_dim: usize,
    act_dim: usize,
    /// Q head, [feat_dim]
    q_head: Vec<f64>,
    /// Reconstruction head, [obs_dim * feat_dim] row-major
    recon_head: Vec<f64>,
    /// Reward head, [feat_dim]
    reward_head: Vec<f64>,
}

impl LinearQEstimator {
    /// Create a zero-initialized estimator for the given dimensions.
    pub fn new(obs_dim: usize, act_dim: usize, config: LinearQConfig) -> Self {
        let feat_dim = obs_dim + act_dim + 2;
        Self {
            config,
            obs_dim,
            act_dim,
            q_head: vec![0.0; feat_dim],
            recon_head: vec![0.0; obs_dim * feat_dim],
            reward_head: vec![0.0; feat_dim],
        }
    }

    /// Feature dimension: observation, action, scaled time, bias.
    pub fn feat_dim(&self) -> usize {
        self.obs_dim + self.act_dim + 2
    }

    /// Configuration in use.
    pub fn config(&self) -> &LinearQConfig {
        &self.config
    }

    fn features_into(&self, obs: &[f64], act: &[f64], time: f64, out: &mut [f64]) {
        out[..self.obs_dim].copy_from_slice(obs);
        out[self.obs_dim..self.obs_dim + self.act_dim].copy_from_slice(act);
        out[self.obs_dim + self.act_dim] = time * self.config.time_scale;
        out[self.obs_dim + self.act_dim + 1] = 1.0;
    }

    /// One SGD step on a minibatch; returns (total, bellman, recon, reward)
    /// losses evaluated before the step.
    fn sgd_step(&mut self, batch: &ReplayBatch) -> (f64, f64, f64, f64) {
        let m = batch.len();
        let feat_dim = self.feat_dim();
        let lr = self.config.learning_rate;
        let rw = self.config.reconstruction_weight;
        let ww = self.config.reward_weight;

        let mut q_grad = vec![0.0; feat_dim];
        let mut recon_grad = vec![0.0; self.obs_dim * feat_dim];
        let mut reward_grad = vec![0.0; feat_dim];
        let mut bellman_loss = 0.0;
        let mut recon_loss = 0.0;
        let mut reward_loss = 0.0;

        let mut x = vec![0.0; feat_dim];
        for i in 0..m {
            let obs = &batch.observations[i * self.obs_dim..(i + 1) * self.obs_dim];
            let act = &batch.actions[i * self.act_dim..(i + 1) * self.act_dim];
            self.features_into(obs, act, batch.times[i], &mut x);

            // Q toward the stored discounted return
            let q_err = dot(&self.q_head, &x) - batch.returns[i];
            bellman_loss += q_err * q_err / m as f64;
            for f in 0..feat_dim {
                q_grad[f] += 2.0 * q_err * x[f] / m as f64;
            }

            // Observation reconstruction
            for d in 0..self.obs_dim {
                let row = &self.recon_head[d * feat_dim..(d + 1) * feat_dim];
                let err = dot(row, &x) - obs[d];
                recon_loss += err * err / (m * self.obs_dim) as f64;
                for f in 0..feat_dim {
                    recon_grad[d * feat_dim + f] +=
                        2.0 * err * x[f] / (m * self.obs_dim) as f64;
                }
            }

            // Immediate reward
            let r_err = dot(&self.reward_head, &x) - batch.rewards[i];
            reward_loss += r_err * r_err / m as f64;
            for f in 0..feat_dim {
                reward_grad[f] += 2.0 * r_err * x[f] / m as f64;
            }
        }

        for f in 0..feat_dim {
            self.q_head[f] -= lr * q_grad[f];
            self.reward_head[f] -= lr * ww * reward_grad[f];
        }
        for g in 0..self.recon_head.len() {
            self.recon_head[g] -= lr * rw * recon_grad[g];
        }

        let total = bellman_loss + rw * recon_loss + ww * reward_loss;
        (total, bellman_loss, recon_loss, reward_loss)
    }
}

impl ValueEstimator for LinearQEstimator {
    fn bellman_update(&mut self, buffer: &ReplayBuffer, rng: &mut dyn RngCore) -> BellmanReport {
        let start = Instant::now();
        let mut report = BellmanReport::default();

        if buffer.is_empty() {
            log::warn!("bellman_update called with empty buffer, skipping fit");
            report.elapsed_secs = start.elapsed().as_secs_f64();
            return report;
        }

        for _ in 0..self.config.fit_iters {
            let batch = buffer.sample_batch(self.config.minibatch_size, rng);
            let (total, bellman, recon, reward) = self.sgd_step(&batch);
            report.total_losses.push(total);
            report.bellman_losses.push(bellman);
            report.reconstruction_losses.push(recon);
            report.reward_losses.push(reward);
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        report
    }

    fn predict(&self, observations: &[f64], actions: &[f64], times: &[f64]) -> Vec<f64> {
        let n = times.len();
        assert_eq!(observations.len(), n * self.obs_dim);
        assert_eq!(actions.len(), n * self.act_dim);

        let mut x = vec![0.0; self.feat_dim()];
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let obs = &observations[i * self.obs_dim..(i + 1) * self.obs_dim];
            let act = &actions[i * self.act_dim..(i + 1) * self.act_dim];
            self.features_into(obs, act, times[i], &mut x);
            out.push(dot(&self.q_head, &x));
        }
        out
    }

    fn average_value(
        &self,
        policy: &dyn ActionSampler,
        observations: &[f64],
        times: &[f64],
        rng: &mut dyn RngCore,
    ) -> Vec<f64> {
        match self.config.baseline_mode {
            BaselineMode::Simple => {
                let actions = policy.mode_actions(observations);
                self.predict(observations, &actions, times)
            }
            BaselineMode::Averaged { num_value_actions } => {
                let n = times.len();
                let mut values = vec![0.0; n];
                for _ in 0..num_value_actions {
                    let actions = policy.sample_actions(observations, rng);
                    let qs = self.predict(observations, &actions, times);
                    for (v, q) in values.iter_mut().zip(qs.iter()) {
                        *v += q / num_value_actions as f64;
                    }
                }
                values
            }
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
