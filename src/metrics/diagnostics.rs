//! Training diagnostics as plain data.
//!
//! Everything here is produced by the trainer and engine, carried out to
//! the caller, and optionally fed to a [`crate::metrics::MetricsSink`].
//! Nothing in this module feeds back into control flow.

use serde::{Deserialize, Serialize};

use crate::core::ReturnSummary;
use crate::estimator::BellmanReport;

/// Diagnostics from one natural-gradient sub-iteration.
///
/// Times are wall-clock seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepDiagnostics {
    /// Realized step length along the natural direction
    pub alpha: f64,
    /// Trust-region size: the configured target, or alpha^2 (g . d) under
    /// a fixed alpha
    pub step_size: f64,
    /// Seconds spent on the vanilla gradient
    pub grad_time: f64,
    /// Seconds spent on the curvature solve
    pub natural_grad_time: f64,
    /// Surrogate value before the parameter write
    pub surr_before: f64,
    /// Surrogate value after the parameter write
    pub surr_after: f64,
    /// Mean KL from the frozen reference to the updated policy
    pub kl_divergence: f64,
}

impl StepDiagnostics {
    /// Surrogate improvement achieved by the step.
    pub fn surrogate_improvement(&self) -> f64 {
        self.surr_after - self.surr_before
    }
}

/// One sub-iteration of the training loop: the engine step plus the
/// estimator fit that preceded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubIterationStats {
    /// Engine diagnostics
    pub diagnostics: StepDiagnostics,
    /// Estimator loss breakdown
    pub losses: BellmanReport,
}

/// Q-function quality against Monte-Carlo rollouts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QFunctionCheck {
    /// MSE of Q against the 1-step bootstrapped target
    pub single_step_mse: f64,
    /// MSE of Q at episode starts against full discounted returns
    pub start_end_mse: f64,
}

/// Everything one `train_step` call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainStepReport {
    /// Iteration index the caller passed in
    pub iteration: usize,
    /// Episode return statistics over the fresh trajectories
    pub returns: ReturnSummary,
    /// Per-sub-iteration stats, in execution order
    pub sub_iterations: Vec<SubIterationStats>,
    /// Replay buffer size after insertion
    pub buffer_size: usize,
    /// Total seconds spent in estimator fits
    pub bellman_time: f64,
    /// Total seconds spent in policy updates
    pub policy_update_time: f64,
    /// Per-dimension exploration noise after the step
    pub exploration_std: Vec<f64>,
    /// Q-vs-Monte-Carlo check, when enabled
    pub q_check: Option<QFunctionCheck>,
}

/// Mean/min/max summary of a loss column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    /// Arithmetic mean
    pub mean: f64,
    /// Minimum
    pub min: f64,
    /// Maximum
    pub max: f64,
}

/// Summarize a value column; an empty column yields zeros.
pub fn summarize(values: &[f64]) -> StatSummary {
    if values.is_empty() {
        return StatSummary {
            mean: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    StatSummary { mean, min, max }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        let s = summarize(&[3.0, 1.0, 2.0]);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
    }

    #[test]
    fn test_summarize_empty() {
        let s = summarize(&[]);
        assert_eq!(s.mean, 0.0);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 0.0);
    }

    #[test]
    fn test_surrogate_improvement() {
        let d = StepDiagnostics {
            alpha: 0.1,
            step_size: 0.01,
            grad_time: 0.0,
            natural_grad_time: 0.0,
            surr_before: -0.5,
            surr_after: -0.2,
            kl_divergence: 0.01,
        };
        assert!((d.surrogate_improvement() - 0.3).abs() < 1e-12);
    }
}
