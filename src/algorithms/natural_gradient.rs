//! Natural policy gradient update engine.
//!
//! One update is a trust-region step along the natural direction:
//!
//! 1. normalize the advantage weights
//! 2. vanilla gradient g of the CPI surrogate
//! 3. natural direction d from (F + damping I) d = g via conjugate
//!    gradient, warm started at g
//! 4. step length from the configured mode
//! 5. parameter write to the current snapshot only
//! 6. post-step surrogate and KL against the still-frozen reference
//!
//! The Fisher matrix F is only ever touched through the policy's
//! matrix-vector product. The reference snapshot advances afterwards when
//! the caller asks for it, so diagnostics always compare against the
//! distribution the step started from.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::advantage::normalize_weights;
use super::cg::{cg_solve, dot, DampedOperator};
use crate::core::UpdateBatch;
use crate::metrics::StepDiagnostics;
use crate::policy::{NaturalGradientPolicy, SnapshotUpdate};

/// How the step length along the natural direction is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StepMode {
    /// Constant step length; the realized trust-region size
    /// alpha^2 (g . d) is reported
    FixedAlpha(f64),
    /// Normalized step size: alpha = sqrt(|target / (g . d)|)
    TrustRegion(f64),
}

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaturalGradientConfig {
    /// Step length selection
    pub step_mode: StepMode,
    /// Conjugate gradient iteration budget
    pub cg_iters: usize,
    /// Tikhonov damping added to the Fisher operator
    pub damping: f64,
    /// Early-exit threshold on the squared CG residual
    pub residual_tol: f64,
}

impl Default for NaturalGradientConfig {
    fn default() -> Self {
        Self {
            step_mode: StepMode::TrustRegion(0.01),
            cg_iters: 10,
            damping: 1e-4,
            residual_tol: 1e-10,
        }
    }
}

impl NaturalGradientConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step mode.
    pub fn with_step_mode(mut self, step_mode: StepMode) -> Self {
        self.step_mode = step_mode;
        self
    }

    /// Set the CG iteration budget.
    pub fn with_cg_iters(mut self, cg_iters: usize) -> Self {
        self.cg_iters = cg_iters;
        self
    }

    /// Set the curvature damping.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Check parameter sanity.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self.step_mode {
            StepMode::FixedAlpha(a) if a <= 0.0 => return Err("alpha must be > 0"),
            StepMode::TrustRegion(n) if n <= 0.0 => return Err("step size target must be > 0"),
            _ => {}
        }
        if self.cg_iters == 0 {
            return Err("cg_iters must be > 0");
        }
        if self.damping < 0.0 {
            return Err("damping must be >= 0");
        }
        Ok(())
    }
}

/// Fatal faults from a policy update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// The computed parameter vector contains NaN or infinity.
    ///
    /// The policy is left untouched; the run should halt for inspection
    /// rather than roll back and continue.
    NonFiniteUpdate,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateError::NonFiniteUpdate => {
                write!(f, "policy update produced non-finite parameters")
            }
        }
    }
}

impl std::error::Error for UpdateError {}

/// Trust-region natural-gradient policy updater.
#[derive(Debug, Clone, Default)]
pub struct NaturalGradientEngine {
    config: NaturalGradientConfig,
}

impl NaturalGradientEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: NaturalGradientConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &NaturalGradientConfig {
        &self.config
    }

    /// Run one natural-gradient step on `policy` over `batch`.
    ///
    /// When `advance_reference` is set, the reference snapshot is synced
    /// to the new parameters after the diagnostics are taken.
    pub fn update<P: NaturalGradientPolicy + ?Sized>(
        &self,
        policy: &mut P,
        batch: &UpdateBatch,
        advance_reference: bool,
    ) -> Result<StepDiagnostics, UpdateError> {
        let mut weights = batch.weights.clone();
        normalize_weights(&mut weights);

        let surr_before = policy.surrogate(&batch.observations, &batch.actions, &weights);

        let grad_start = Instant::now();
        let vpg_grad = policy.surrogate_grad(&batch.observations, &batch.actions, &weights);
        let grad_time = grad_start.elapsed().as_secs_f64();

        let npg_start = Instant::now();
        let npg_grad = {
            let fvp = |v: &[f64]| policy.fisher_vector_product(&batch.observations, v);
            let damped = DampedOperator::new(&fvp, self.config.damping);
            cg_solve(
                &damped,
                &vpg_grad,
                Some(&vpg_grad),
                self.config.cg_iters,
                self.config.residual_tol,
            )
        };
        let natural_grad_time = npg_start.elapsed().as_secs_f64();

        let gd = dot(&vpg_grad, &npg_grad);
        let (alpha, step_size) = match self.config.step_mode {
            StepMode::FixedAlpha(alpha) => (alpha, alpha * alpha * gd),
            StepMode::TrustRegion(target) => {
                ((target / (gd + 1e-20)).abs().sqrt(), target)
            }
        };

        let current = policy.params();
        let new_params: Vec<f64> = current
            .iter()
            .zip(npg_grad.iter())
            .map(|(p, d)| p + alpha * d)
            .collect();
        if new_params.iter().any(|p| !p.is_finite()) {
            log::warn!(
                "non-finite policy update (alpha {}, g.d {}), halting",
                alpha,
                gd
            );
            return Err(UpdateError::NonFiniteUpdate);
        }
        policy.set_params(&new_params, SnapshotUpdate::CurrentOnly);

        let surr_after = policy.surrogate(&batch.observations, &batch.actions, &weights);
        let kl_divergence = policy.kl_to_reference(&batch.observations);

        if advance_reference {
            policy.sync_reference();
        }

        Ok(StepDiagnostics {
            alpha,
            step_size,
            grad_time,
            natural_grad_time,
            surr_before,
            surr_after,
            kl_divergence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ActionSampler;
    use rand::RngCore;

    /// Policy stub with an identity Fisher and a fixed surrogate gradient.
    ///
    /// The surrogate is params . grad, so surrogate changes track the
    /// parameter step exactly.
    struct StubPolicy {
        current: Vec<f64>,
        reference: Vec<f64>,
        grad: Vec<f64>,
    }

    impl StubPolicy {
        fn new(grad: Vec<f64>) -> Self {
            let n = grad.len();
            Self {
                current: vec![0.0; n],
                reference: vec![0.0; n],
                grad,
            }
        }
    }

    impl ActionSampler for StubPolicy {
        fn obs_dim(&self) -> usize {
            1
        }
        fn act_dim(&self) -> usize {
            1
        }
        fn sample_actions(&self, observations: &[f64], _rng: &mut dyn RngCore) -> Vec<f64> {
            vec![0.0; observations.len()]
        }
        fn mode_actions(&self, observations: &[f64]) -> Vec<f64> {
            vec![0.0; observations.len()]
        }
    }

    impl NaturalGradientPolicy for StubPolicy {
        fn num_params(&self) -> usize {
            self.grad.len()
        }
        fn params(&self) -> Vec<f64> {
            self.current.clone()
        }
        fn reference_params(&self) -> Vec<f64> {
            self.reference.clone()
        }
        fn set_params(&mut self, params: &[f64], which: SnapshotUpdate) {
            match which {
                SnapshotUpdate::CurrentOnly => self.current = params.to_vec(),
                SnapshotUpdate::Both => {
                    self.current = params.to_vec();
                    self.reference = params.to_vec();
                }
            }
        }
        fn sync_reference(&mut self) {
            self.reference = self.current.clone();
        }
        fn log_likelihood(&self, _observations: &[f64], actions: &[f64]) -> Vec<f64> {
            vec![0.0; actions.len()]
        }
        fn surrogate(&self, _observations: &[f64], _actions: &[f64], _weights: &[f64]) -> f64 {
            dot(&self.current, &self.grad)
        }
        fn surrogate_grad(
            &self,
            _observations: &[f64],
            _actions: &[f64],
            _weights: &[f64],
        ) -> Vec<f64> {
            self.grad.clone()
        }
        fn kl_to_reference(&self, _observations: &[f64]) -> f64 {
            self.current
                .iter()
                .zip(self.reference.iter())
                .map(|(c, r)| (c - r).powi(2))
                .sum()
        }
        fn fisher_vector_product(&self, _observations: &[f64], v: &[f64]) -> Vec<f64> {
            v.to_vec()
        }
        fn exploration_std(&self) -> Vec<f64> {
            vec![1.0]
        }
    }

    fn unit_batch(n: usize) -> UpdateBatch {
        UpdateBatch::new(
            vec![0.0; n],
            vec![0.0; n],
            (0..n).map(|i| i as f64).collect(),
            1,
            1,
        )
    }

    fn undamped(step_mode: StepMode) -> NaturalGradientEngine {
        NaturalGradientEngine::new(
            NaturalGradientConfig::new()
                .with_step_mode(step_mode)
                .with_damping(0.0),
        )
    }

    #[test]
    fn test_identity_fisher_direction_equals_gradient() {
        let mut policy = StubPolicy::new(vec![1.0, -2.0, 0.5]);
        let engine = undamped(StepMode::FixedAlpha(1.0));

        let diag = engine.update(&mut policy, &unit_batch(4), false).unwrap();

        // F = I and warm start at g: d = g, so new params = alpha * g
        assert_eq!(policy.params(), vec![1.0, -2.0, 0.5]);
        // step_size = alpha^2 (g . d) = g . g
        assert!((diag.step_size - 5.25).abs() < 1e-12);
        assert_eq!(diag.alpha, 1.0);
    }

    #[test]
    fn test_fixed_alpha_step_size_identity() {
        let grad = vec![0.3, 0.4];
        let mut policy = StubPolicy::new(grad.clone());
        let engine = undamped(StepMode::FixedAlpha(0.2));

        let diag = engine.update(&mut policy, &unit_batch(4), false).unwrap();

        let gd = dot(&grad, &grad);
        assert!((diag.step_size - 0.04 * gd).abs() < 1e-12);
    }

    #[test]
    fn test_trust_region_realized_size_matches_target() {
        let grad = vec![1.0, 2.0, -1.0];
        let mut policy = StubPolicy::new(grad.clone());
        let target = 0.05;
        let engine = undamped(StepMode::TrustRegion(target));

        let diag = engine.update(&mut policy, &unit_batch(4), false).unwrap();

        assert_eq!(diag.step_size, target);
        assert!(diag.alpha > 0.0);
        // alpha^2 (g . d) recovers the target when F = I
        let realized = diag.alpha * diag.alpha * dot(&grad, &grad);
        assert!(
            (realized - target).abs() < 1e-9,
            "realized {} vs target {}",
            realized,
            target
        );
    }

    #[test]
    fn test_surrogate_recorded_around_step() {
        let mut policy = StubPolicy::new(vec![2.0]);
        let engine = undamped(StepMode::FixedAlpha(0.5));

        let diag = engine.update(&mut policy, &unit_batch(2), false).unwrap();

        // surrogate = params . grad: 0 before, 0.5 * 2 * 2 = 2 after
        assert_eq!(diag.surr_before, 0.0);
        assert!((diag.surr_after - 2.0).abs() < 1e-12);
        assert!(diag.surrogate_improvement() > 0.0);
    }

    #[test]
    fn test_reference_advance_is_explicit() {
        let mut policy = StubPolicy::new(vec![1.0]);
        let engine = undamped(StepMode::FixedAlpha(0.1));

        engine.update(&mut policy, &unit_batch(2), false).unwrap();
        assert_eq!(policy.reference_params(), vec![0.0]);
        assert!(policy.kl_to_reference(&[0.0]) > 0.0);

        engine.update(&mut policy, &unit_batch(2), true).unwrap();
        assert_eq!(policy.reference_params(), policy.params());
    }

    #[test]
    fn test_non_finite_update_is_fatal_and_leaves_params() {
        let mut policy = StubPolicy::new(vec![f64::NAN]);
        let engine = undamped(StepMode::FixedAlpha(0.1));

        let err = engine.update(&mut policy, &unit_batch(2), true);
        assert_eq!(err, Err(UpdateError::NonFiniteUpdate));
        assert_eq!(policy.params(), vec![0.0]);
        assert_eq!(policy.reference_params(), vec![0.0]);
    }

    #[test]
    fn test_zero_gradient_leaves_policy_unchanged() {
        let mut policy = StubPolicy::new(vec![0.0, 0.0]);
        let engine = undamped(StepMode::TrustRegion(0.01));

        let diag = engine.update(&mut policy, &unit_batch(3), true).unwrap();

        // d = 0, so the step is a no-op regardless of the huge alpha
        assert_eq!(policy.params(), vec![0.0, 0.0]);
        assert_eq!(diag.surr_before, diag.surr_after);
        assert_eq!(diag.kl_divergence, 0.0);
    }

    #[test]
    fn test_config_validate() {
        assert!(NaturalGradientConfig::default().validate().is_ok());
        assert!(NaturalGradientConfig::new()
            .with_step_mode(StepMode::FixedAlpha(0.0))
            .validate()
            .is_err());
        assert!(NaturalGradientConfig::new()
            .with_step_mode(StepMode::TrustRegion(-1.0))
            .validate()
            .is_err());
        assert!(NaturalGradientConfig::new()
            .with_cg_iters(0)
            .validate()
            .is_err());
    }
}
