//! Numeric kernels of the trainer: curvature solve, policy update,
//! advantage construction, estimator checks.

pub mod advantage;
pub mod cg;
pub mod natural_gradient;
pub mod q_diagnostics;

pub use advantage::{normalize_weights, on_policy_batch, replay_batch};
pub use cg::{cg_solve, DampedOperator, LinearOperator};
pub use natural_gradient::{
    NaturalGradientConfig, NaturalGradientEngine, StepMode, UpdateError,
};
pub use q_diagnostics::{mse, n_step_comparison, start_end_comparison};
