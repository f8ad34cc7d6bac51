//! Q-function quality checks against Monte-Carlo rollouts.
//!
//! Two comparisons, both returning (predicted, target) columns:
//! - n-step: Q(s_t, a_t) against the n-step reward sum bootstrapped with
//!   the estimator's own Q where the trajectory continues
//! - start/end: Q at the first step against the full discounted return
//!
//! Targets never bootstrap past the recorded end of a trajectory.

use crate::core::Trajectory;
use crate::estimator::ValueEstimator;

/// Compare Q predictions with n-step bootstrapped targets over all steps.
pub fn n_step_comparison<V: ValueEstimator>(
    n: usize,
    gamma: f64,
    paths: &[Trajectory],
    estimator: &V,
) -> (Vec<f64>, Vec<f64>) {
    assert!(n > 0, "n-step comparison needs n > 0");

    let mut preds = Vec::new();
    let mut targets = Vec::new();
    for path in paths {
        let t_len = path.len();
        if t_len == 0 {
            continue;
        }

        let qs = estimator.predict(
            &path.observations_flat(),
            &path.actions_flat(),
            &path.times(),
        );
        let rewards = path.rewards();

        for t in 0..t_len {
            let horizon = n.min(t_len - t);
            let mut target = 0.0;
            let mut disc = 1.0;
            for i in 0..horizon {
                target += disc * rewards[t + i];
                disc *= gamma;
            }
            if t + n < t_len {
                target += disc * qs[t + n];
            }
            preds.push(qs[t]);
            targets.push(target);
        }
    }
    (preds, targets)
}

/// Compare Q at each trajectory's first step with its full discounted
/// return.
pub fn start_end_comparison<V: ValueEstimator>(
    gamma: f64,
    paths: &[Trajectory],
    estimator: &V,
) -> (Vec<f64>, Vec<f64>) {
    let mut preds = Vec::new();
    let mut targets = Vec::new();
    for path in paths {
        if path.is_empty() {
            continue;
        }

        let first = &path.steps[0];
        let q = estimator.predict(&first.observation, &first.action, &[first.time]);
        preds.push(q[0]);

        let mut target = 0.0;
        let mut disc = 1.0;
        for step in path.iter() {
            target += disc * step.reward;
            disc *= gamma;
        }
        targets.push(target);
    }
    (preds, targets)
}

/// Mean squared error between two equal-length columns.
pub fn mse(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        / a.len() as f64
}
