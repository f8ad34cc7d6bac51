//! Off-policy NPG training loop.
//!
//! One `train_step` call is:
//!
//! 1. collect fresh trajectories under the current policy
//! 2. compute discounted returns and push everything into replay
//! 3. `num_policy_updates` sub-iterations of estimator fit followed by a
//!    natural-gradient policy step
//!
//! Sub-iteration 0 can build its advantage batch from the fresh
//! trajectories (`fit_on_policy`); every later sub-iteration draws states
//! from replay with actions resampled from the current policy. The call
//! returns a [`TrainStepReport`]; feeding it to a metrics sink is the
//! caller's business.

use std::fmt;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use super::config::{TrainStepOptions, TrainerConfig};
use crate::algorithms::{
    mse, n_step_comparison, on_policy_batch, replay_batch, start_end_comparison,
    NaturalGradientEngine, UpdateError,
};
use crate::buffers::ReplayBuffer;
use crate::core::{compute_returns_many, ReturnSummary};
use crate::estimator::ValueEstimator;
use crate::metrics::{QFunctionCheck, SubIterationStats, TrainStepReport};
use crate::policy::NaturalGradientPolicy;
use crate::sampler::{SampleRequest, Sampler};

/// Fatal training-loop errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainError {
    /// `TrainStepOptions::iteration` was not set.
    MissingIteration,
    /// The policy update faulted.
    Update(UpdateError),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainError::MissingIteration => {
                write!(f, "train_step requires an iteration index for diagnostics")
            }
            TrainError::Update(e) => write!(f, "policy update failed: {}", e),
        }
    }
}

impl std::error::Error for TrainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrainError::Update(e) => Some(e),
            TrainError::MissingIteration => None,
        }
    }
}

impl From<UpdateError> for TrainError {
    fn from(e: UpdateError) -> Self {
        TrainError::Update(e)
    }
}

/// Off-policy natural policy gradient trainer.
///
/// Owns the policy, the action-value estimator, the sampler, the replay
/// buffer, and the update engine. All randomness downstream of the
/// configured seed is deterministic: rollout base seeds, replay draws,
/// and action resampling all come from one `Xoshiro256StarStar`.
pub struct OffPolicyTrainer<P, V, S> {
    policy: P,
    estimator: V,
    sampler: S,
    buffer: ReplayBuffer,
    engine: NaturalGradientEngine,
    config: TrainerConfig,
    rng: Xoshiro256StarStar,
}

impl<P, V, S> OffPolicyTrainer<P, V, S>
where
    P: NaturalGradientPolicy,
    V: ValueEstimator,
    S: Sampler<P>,
{
    /// Create a trainer.
    ///
    /// `config` should have passed [`TrainerConfig::build`]; the trainer
    /// trusts it.
    pub fn new(policy: P, estimator: V, sampler: S, config: TrainerConfig) -> Self {
        let buffer = match config.buffer_capacity {
            Some(cap) => ReplayBuffer::with_capacity(cap),
            None => ReplayBuffer::new(),
        };
        let engine = NaturalGradientEngine::new(config.engine);
        let rng = Xoshiro256StarStar::seed_from_u64(config.seed);
        Self {
            policy,
            estimator,
            sampler,
            buffer,
            engine,
            config,
            rng,
        }
    }

    /// The policy being trained.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Mutable policy access.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// The action-value estimator.
    pub fn estimator(&self) -> &V {
        &self.estimator
    }

    /// The replay buffer.
    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    /// Configuration in use.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run one training step: collect `n` trajectories (or at least `n`
    /// transitions, per `opts.sample_mode`), then fit and update.
    ///
    /// Fails fast when `opts.iteration` is unset or a policy update
    /// produces non-finite parameters; in the latter case the policy
    /// keeps the parameters it entered the sub-iteration with.
    pub fn train_step(
        &mut self,
        n: usize,
        opts: &TrainStepOptions,
    ) -> Result<TrainStepReport, TrainError> {
        let iteration = opts.iteration.ok_or(TrainError::MissingIteration)?;

        let request = SampleRequest {
            count: n,
            mode: opts.sample_mode,
            horizon: opts.horizon,
            base_seed: self.rng.gen(),
        };
        let mut paths = self.sampler.sample(&self.policy, &request);

        compute_returns_many(&mut paths, opts.gamma);
        self.buffer.push_paths(&paths);

        let mut sub_iterations = Vec::with_capacity(self.config.num_policy_updates);
        let mut bellman_time = 0.0;
        let mut policy_update_time = 0.0;
        for k in 0..self.config.num_policy_updates {
            let losses = self.estimator.bellman_update(&self.buffer, &mut self.rng);
            bellman_time += losses.elapsed_secs;

            let update_start = Instant::now();
            let batch = if self.config.fit_on_policy && k == 0 {
                on_policy_batch(&paths, &self.estimator, &self.policy, &mut self.rng)
            } else {
                replay_batch(
                    &self.buffer,
                    self.config.num_update_states,
                    &self.estimator,
                    &self.policy,
                    &mut self.rng,
                )
            };
            let diagnostics = self.engine.update(&mut self.policy, &batch, true)?;
            policy_update_time += update_start.elapsed().as_secs_f64();

            sub_iterations.push(SubIterationStats {
                diagnostics,
                losses,
            });
        }

        let q_check = if self.config.check_q_function {
            let (pred_1, mc_1) = n_step_comparison(1, opts.gamma, &paths, &self.estimator);
            let (pred_end, mc_end) = start_end_comparison(opts.gamma, &paths, &self.estimator);
            Some(QFunctionCheck {
                single_step_mse: mse(&pred_1, &mc_1),
                start_end_mse: mse(&pred_end, &mc_end),
            })
        } else {
            None
        };

        Ok(TrainStepReport {
            iteration,
            returns: ReturnSummary::from_paths(&paths),
            sub_iterations,
            buffer_size: self.buffer.len(),
            bellman_time,
            policy_update_time,
            exploration_std: self.policy.exploration_std(),
            q_check,
        })
    }
}
