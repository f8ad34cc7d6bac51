//! # Off-Policy Natural Policy Gradient Training
//!
//! Trainer for an off-policy natural policy gradient (NPG) algorithm:
//! a replay-fitted action-value critic supplies advantage weights for
//! trust-region policy steps whose Fisher curvature is inverted
//! implicitly with conjugate gradient.
//!
//! ## Training Step Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        train_step(N)                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Sampler ──► fresh trajectories ──► discounted returns       │
//! │                     │                                         │
//! │                     ▼                                         │
//! │              ┌──────────────┐                                 │
//! │              │ ReplayBuffer │                                 │
//! │              └──────┬───────┘                                 │
//! │                     │   × num_policy_updates                  │
//! │     ┌───────────────┼────────────────────┐                    │
//! │     ▼               ▼                    ▼                    │
//! │  bellman_update  advantage batch   NaturalGradientEngine      │
//! │  (estimator fit) (on-policy k=0,   (CG on Fisher-vector       │
//! │                   else replay)      products, trust region)   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Advantage weights are Q(s, a, t) - V(s, t) from the estimator,
//! normalized to zero mean and unit scale before every update. Replay
//! batches resample actions from the current policy, so stale stored
//! actions never enter the surrogate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use offpolicy_npg::{
//!     EnvSampler, LinearGaussianPolicy, LinearQConfig, LinearQEstimator,
//!     OffPolicyTrainer, TrainStepOptions, TrainerConfig,
//! };
//!
//! let config = TrainerConfig::new()
//!     .with_num_policy_updates(8)
//!     .with_num_update_states(512)
//!     .with_seed(42)
//!     .build()?;
//!
//! let mut trainer = OffPolicyTrainer::new(
//!     LinearGaussianPolicy::new(obs_dim, act_dim),
//!     LinearQEstimator::new(obs_dim, act_dim, LinearQConfig::default()),
//!     EnvSampler::new(env_factory).with_num_workers(4),
//!     config,
//! );
//!
//! for i in 0..100 {
//!     let report = trainer.train_step(20, &TrainStepOptions::new().with_iteration(i))?;
//!     println!("iter {}: mean return {:.2}", i, report.returns.mean);
//! }
//! ```
//!
//! Policies and estimators are pluggable through the
//! [`NaturalGradientPolicy`] and [`ValueEstimator`] traits; the bundled
//! [`LinearGaussianPolicy`] and [`LinearQEstimator`] keep the crate
//! self-contained.

pub mod algorithms;
pub mod buffers;
pub mod core;
pub mod estimator;
pub mod metrics;
pub mod policy;
pub mod runners;
pub mod sampler;

// Re-export commonly used types
pub use crate::core::batch::UpdateBatch;
pub use crate::core::trajectory::{
    compute_returns, compute_returns_many, total_steps, ReturnSummary, Trajectory, TrajectoryStep,
};

pub use buffers::replay_buffer::{ReplayBatch, ReplayBuffer, StoredTransition};

// Policy and estimator contracts plus the bundled implementations
pub use policy::{
    ActionSampler, LinearGaussianPolicy, NaturalGradientPolicy, SnapshotUpdate,
};
pub use estimator::{
    BaselineMode, BellmanReport, LinearQConfig, LinearQEstimator, ValueEstimator,
};

// Update engine and its building blocks
pub use algorithms::{
    cg_solve, mse, n_step_comparison, normalize_weights, on_policy_batch, replay_batch,
    start_end_comparison, DampedOperator, LinearOperator, NaturalGradientConfig,
    NaturalGradientEngine, StepMode, UpdateError,
};

// Sampling
pub use sampler::{EnvSampler, EnvStep, Environment, SampleMode, SampleRequest, Sampler};

// Training loop
pub use runners::{ConfigError, OffPolicyTrainer, TrainError, TrainStepOptions, TrainerConfig};

// Diagnostics and metric sinks
pub use metrics::{
    record_train_step, summarize, ConsoleSink, CsvSink, MemorySink, MetricsSink, MultiSink,
    QFunctionCheck, StatSummary, StepDiagnostics, SubIterationStats, TrainStepReport,
};
