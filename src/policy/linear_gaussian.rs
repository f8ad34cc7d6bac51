//! Linear diagonal-Gaussian policy with closed-form update quantities.
//!
//! Actions are drawn from N(W s + b, diag(exp(log_std))²) with a
//! state-independent log_std. Flat parameter layout:
//!
//! [W row-major (act_dim x obs_dim), b (act_dim), log_std (act_dim)]
//!
//! Because the mean is linear in the parameters, the surrogate gradient,
//! the mean KL, and the Fisher-vector product all have closed forms. The
//! Fisher of the mean-KL at the current snapshot is block diagonal:
//! J_mu^T diag(1/sigma^2) J_mu for the mean parameters and 2 I for the
//! log_std entries.

use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

use super::{ActionSampler, NaturalGradientPolicy, SnapshotUpdate};

/// Floor applied to incoming log_std values.
///
/// Keeps the exploration noise from collapsing, which would blow up the
/// 1/sigma^2 terms in the curvature.
pub const DEFAULT_MIN_LOG_STD: f64 = -3.0;

/// Guard added to KL denominators.
const KL_EPS: f64 = 1e-8;

/// Linear-mean diagonal-Gaussian policy.
#[derive(Debug, Clone)]
pub struct LinearGaussianPolicy {
    obs_dim: usize,
    act_dim: usize,
    current: Vec<f64>,
    reference: Vec<f64>,
    min_log_std: f64,
}

impl LinearGaussianPolicy {
    /// Create a policy with zero mean map and unit exploration noise.
    ///
    /// Both snapshots start identical.
    pub fn new(obs_dim: usize, act_dim: usize) -> Self {
        let params = vec![0.0; act_dim * (obs_dim + 2)];
        Self {
            obs_dim,
            act_dim,
            current: params.clone(),
            reference: params,
            min_log_std: DEFAULT_MIN_LOG_STD,
        }
    }

    /// Set the initial log_std for every action dimension on both
    /// snapshots.
    pub fn with_init_log_std(mut self, log_std: f64) -> Self {
        let clamped = log_std.max(self.min_log_std);
        let off = self.log_std_offset();
        for j in 0..self.act_dim {
            self.current[off + j] = clamped;
            self.reference[off + j] = clamped;
        }
        self
    }

    /// Override the log_std floor.
    pub fn with_min_log_std(mut self, min_log_std: f64) -> Self {
        self.min_log_std = min_log_std;
        let off = self.log_std_offset();
        for params in [&mut self.current, &mut self.reference] {
            for v in params[off..].iter_mut() {
                *v = v.max(min_log_std);
            }
        }
        self
    }

    fn b_offset(&self) -> usize {
        self.act_dim * self.obs_dim
    }

    fn log_std_offset(&self) -> usize {
        self.act_dim * (self.obs_dim + 1)
    }

    fn rows(&self, observations: &[f64]) -> usize {
        assert_eq!(observations.len() % self.obs_dim, 0);
        observations.len() / self.obs_dim
    }

    /// Mean action for one observation row under the given parameters.
    fn mean_into(&self, params: &[f64], obs: &[f64], out: &mut [f64]) {
        let b_off = self.b_offset();
        for j in 0..self.act_dim {
            let row = &params[j * self.obs_dim..(j + 1) * self.obs_dim];
            let mut m = params[b_off + j];
            for (w, s) in row.iter().zip(obs.iter()) {
                m += w * s;
            }
            out[j] = m;
        }
    }

    /// Per-dimension standard deviations under the given parameters.
    fn stds(&self, params: &[f64]) -> Vec<f64> {
        params[self.log_std_offset()..].iter().map(|l| l.exp()).collect()
    }

    /// Log-likelihood of each row under the given parameter snapshot.
    fn log_likelihood_with(&self, params: &[f64], observations: &[f64], actions: &[f64]) -> Vec<f64> {
        let n = self.rows(observations);
        assert_eq!(actions.len(), n * self.act_dim);

        let log_stds = &params[self.log_std_offset()..];
        let stds = self.stds(params);
        let log_norm: f64 = log_stds.iter().sum::<f64>()
            + 0.5 * self.act_dim as f64 * (2.0 * std::f64::consts::PI).ln();

        let mut mu = vec![0.0; self.act_dim];
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let obs = &observations[i * self.obs_dim..(i + 1) * self.obs_dim];
            let act = &actions[i * self.act_dim..(i + 1) * self.act_dim];
            self.mean_into(params, obs, &mut mu);

            let mut quad = 0.0;
            for j in 0..self.act_dim {
                let z = (act[j] - mu[j]) / stds[j];
                quad += z * z;
            }
            out.push(-0.5 * quad - log_norm);
        }
        out
    }

    /// Likelihood ratios current/reference per row.
    fn ratios(&self, observations: &[f64], actions: &[f64]) -> Vec<f64> {
        let ll_cur = self.log_likelihood_with(&self.current, observations, actions);
        let ll_ref = self.log_likelihood_with(&self.reference, observations, actions);
        ll_cur
            .iter()
            .zip(ll_ref.iter())
            .map(|(c, r)| (c - r).exp())
            .collect()
    }
}

impl ActionSampler for LinearGaussianPolicy {
    fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    fn act_dim(&self) -> usize {
        self.act_dim
    }

    fn sample_actions(&self, observations: &[f64], rng: &mut dyn RngCore) -> Vec<f64> {
        let n = self.rows(observations);
        let stds = self.stds(&self.current);

        let mut mu = vec![0.0; self.act_dim];
        let mut out = Vec::with_capacity(n * self.act_dim);
        for i in 0..n {
            let obs = &observations[i * self.obs_dim..(i + 1) * self.obs_dim];
            self.mean_into(&self.current, obs, &mut mu);
            for j in 0..self.act_dim {
                let eps: f64 = StandardNormal.sample(rng);
                out.push(mu[j] + stds[j] * eps);
            }
        }
        out
    }

    fn mode_actions(&self, observations: &[f64]) -> Vec<f64> {
        let n = self.rows(observations);
        let mut mu = vec![0.0; self.act_dim];
        let mut out = Vec::with_capacity(n * self.act_dim);
        for i in 0..n {
            let obs = &observations[i * self.obs_dim..(i + 1) * self.obs_dim];
            self.mean_into(&self.current, obs, &mut mu);
            out.extend_from_slice(&mu);
        }
        out
    }
}

impl NaturalGradientPolicy for LinearGaussianPolicy {
    fn num_params(&self) -> usize {
        self.act_dim * (self.obs_dim + 2)
    }

    fn params(&self) -> Vec<f64> {
        self.current.clone()
    }

    fn reference_params(&self) -> Vec<f64> {
        self.reference.clone()
    }

    fn set_params(&mut self, params: &[f64], which: SnapshotUpdate) {
        assert_eq!(params.len(), self.num_params());
        let mut clamped = params.to_vec();
        let off = self.log_std_offset();
        for v in clamped[off..].iter_mut() {
            *v = v.max(self.min_log_std);
        }

        match which {
            SnapshotUpdate::CurrentOnly => self.current = clamped,
            SnapshotUpdate::Both => {
                self.current = clamped.clone();
                self.reference = clamped;
            }
        }
    }

    fn sync_reference(&mut self) {
        self.reference = self.current.clone();
    }

    fn log_likelihood(&self, observations: &[f64], actions: &[f64]) -> Vec<f64> {
        self.log_likelihood_with(&self.current, observations, actions)
    }

    fn surrogate(&self, observations: &[f64], actions: &[f64], weights: &[f64]) -> f64 {
        let n = self.rows(observations);
        assert_eq!(weights.len(), n);
        if n == 0 {
            return 0.0;
        }

        let ratios = self.ratios(observations, actions);
        ratios
            .iter()
            .zip(weights.iter())
            .map(|(r, w)| r * w)
            .sum::<f64>()
            / n as f64
    }

    fn surrogate_grad(&self, observations: &[f64], actions: &[f64], weights: &[f64]) -> Vec<f64> {
        let n = self.rows(observations);
        assert_eq!(weights.len(), n);

        let mut grad = vec![0.0; self.num_params()];
        if n == 0 {
            return grad;
        }

        let ratios = self.ratios(observations, actions);
        let stds = self.stds(&self.current);
        let b_off = self.b_offset();
        let ls_off = self.log_std_offset();

        let mut mu = vec![0.0; self.act_dim];
        for i in 0..n {
            let obs = &observations[i * self.obs_dim..(i + 1) * self.obs_dim];
            let act = &actions[i * self.act_dim..(i + 1) * self.act_dim];
            self.mean_into(&self.current, obs, &mut mu);

            // d surrogate / d theta = mean_i ratio_i w_i d log pi / d theta
            let coef = ratios[i] * weights[i] / n as f64;
            for j in 0..self.act_dim {
                let var = stds[j] * stds[j];
                let d_mu = (act[j] - mu[j]) / var;
                for (k, s) in obs.iter().enumerate() {
                    grad[j * self.obs_dim + k] += coef * d_mu * s;
                }
                grad[b_off + j] += coef * d_mu;

                let z2 = (act[j] - mu[j]).powi(2) / var;
                grad[ls_off + j] += coef * (z2 - 1.0);
            }
        }
        grad
    }

    fn kl_to_reference(&self, observations: &[f64]) -> f64 {
        let n = self.rows(observations);
        if n == 0 {
            return 0.0;
        }

        let std_cur = self.stds(&self.current);
        let std_ref = self.stds(&self.reference);
        let ls_cur = &self.current[self.log_std_offset()..];
        let ls_ref = &self.reference[self.log_std_offset()..];

        let mut mu_cur = vec![0.0; self.act_dim];
        let mut mu_ref = vec![0.0; self.act_dim];
        let mut total = 0.0;
        for i in 0..n {
            let obs = &observations[i * self.obs_dim..(i + 1) * self.obs_dim];
            self.mean_into(&self.current, obs, &mut mu_cur);
            self.mean_into(&self.reference, obs, &mut mu_ref);

            // KL(ref || cur) per dimension
            for j in 0..self.act_dim {
                let num = (mu_ref[j] - mu_cur[j]).powi(2) + std_ref[j].powi(2)
                    - std_cur[j].powi(2);
                let den = 2.0 * std_cur[j].powi(2) + KL_EPS;
                total += num / den + ls_cur[j] - ls_ref[j];
            }
        }
        total / n as f64
    }

    fn fisher_vector_product(&self, observations: &[f64], v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.num_params());
        let n = self.rows(observations);

        let mut out = vec![0.0; self.num_params()];
        let stds = self.stds(&self.current);
        let b_off = self.b_offset();
        let ls_off = self.log_std_offset();

        // log_std block of the KL Hessian is state independent: 2 I
        for j in 0..self.act_dim {
            out[ls_off + j] = 2.0 * v[ls_off + j];
        }
        if n == 0 {
            return out;
        }

        for i in 0..n {
            let obs = &observations[i * self.obs_dim..(i + 1) * self.obs_dim];
            for j in 0..self.act_dim {
                // Directional derivative of the mean: u_j = (v_W s + v_b)_j
                let mut u = v[b_off + j];
                for (k, s) in obs.iter().enumerate() {
                    u += v[j * self.obs_dim + k] * s;
                }

                let c = u / (stds[j] * stds[j]) / n as f64;
                for (k, s) in obs.iter().enumerate() {
                    out[j * self.obs_dim + k] += c * s;
                }
                out[b_off + j] += c;
            }
        }
        out
    }

    fn exploration_std(&self) -> Vec<f64> {
        self.stds(&self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    /// 2 obs dims, 1 act dim, non-trivial params on both snapshots.
    fn test_policy() -> LinearGaussianPolicy {
        let mut policy = LinearGaussianPolicy::new(2, 1);
        // [w00, w01, b0, log_std0]
        policy.set_params(&[0.5, -0.3, 0.1, -0.2], SnapshotUpdate::Both);
        policy
    }

    #[test]
    fn test_param_layout() {
        let policy = test_policy();
        assert_eq!(policy.num_params(), 4);
        assert_eq!(policy.params(), vec![0.5, -0.3, 0.1, -0.2]);
        assert_eq!(policy.params(), policy.reference_params());
    }

    #[test]
    fn test_mode_action_is_linear_mean() {
        let policy = test_policy();
        // mu = 0.5*1 - 0.3*2 + 0.1 = 0.0
        let mode = policy.mode_actions(&[1.0, 2.0]);
        assert!((mode[0] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_likelihood_standard_normal() {
        let policy = LinearGaussianPolicy::new(1, 1);
        // N(0,1) at a=0: ll = -0.5 ln(2 pi)
        let ll = policy.log_likelihood(&[0.3], &[0.0]);
        let expected = -0.5 * (2.0 * std::f64::consts::PI).ln();
        assert!((ll[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_surrogate_at_reference_is_mean_weight() {
        let policy = test_policy();
        let obs = vec![1.0, 2.0, -0.5, 0.3, 0.0, 1.0];
        let act = vec![0.2, -0.1, 0.4];
        let w = vec![1.0, 2.0, -3.0];
        // Snapshots identical: every ratio is 1
        let surr = policy.surrogate(&obs, &act, &w);
        assert!((surr - 0.0).abs() < 1e-12, "mean weight 0, got {}", surr);

        let w2 = vec![1.0, 2.0, 3.0];
        let surr2 = policy.surrogate(&obs, &act, &w2);
        assert!((surr2 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_surrogate_grad_matches_finite_difference() {
        let mut policy = test_policy();
        // Move current off the reference so ratios are not all 1
        policy.set_params(&[0.6, -0.25, 0.05, -0.15], SnapshotUpdate::CurrentOnly);

        let obs = vec![1.0, 2.0, -0.5, 0.3, 0.4, -1.2];
        let act = vec![0.2, -0.1, 0.4];
        let w = vec![1.0, -2.0, 0.5];

        let grad = policy.surrogate_grad(&obs, &act, &w);
        let base = policy.params();

        let h = 1e-6;
        for p in 0..policy.num_params() {
            let mut plus = base.clone();
            plus[p] += h;
            policy.set_params(&plus, SnapshotUpdate::CurrentOnly);
            let f_plus = policy.surrogate(&obs, &act, &w);

            let mut minus = base.clone();
            minus[p] -= h;
            policy.set_params(&minus, SnapshotUpdate::CurrentOnly);
            let f_minus = policy.surrogate(&obs, &act, &w);

            policy.set_params(&base, SnapshotUpdate::CurrentOnly);
            let fd = (f_plus - f_minus) / (2.0 * h);
            assert!(
                (grad[p] - fd).abs() < 1e-5,
                "param {}: analytic {} vs fd {}",
                p,
                grad[p],
                fd
            );
        }
    }

    #[test]
    fn test_kl_zero_at_reference() {
        let policy = test_policy();
        let kl = policy.kl_to_reference(&[1.0, 2.0, -0.5, 0.3]);
        assert!(kl.abs() < 1e-9, "expected kl 0, got {}", kl);
    }

    #[test]
    fn test_kl_mean_shift_hand_computed() {
        let mut policy = LinearGaussianPolicy::new(1, 1);
        // Shift the current mean by 1 with unit variance: KL = 0.5
        policy.set_params(&[0.0, 1.0, 0.0], SnapshotUpdate::CurrentOnly);
        let kl = policy.kl_to_reference(&[0.7]);
        assert!((kl - 0.5).abs() < 1e-6, "expected 0.5, got {}", kl);
    }

    #[test]
    fn test_fvp_matches_dense_fisher() {
        let policy = test_policy();
        let obs = vec![1.0, 2.0, -0.5, 0.3];
        let n = 2.0;

        // Dense Fisher for act_dim=1: mean block (1/sigma^2) E[x x^T] with
        // x = [s_0, s_1, 1], log_std block 2.
        let var = (2.0f64 * -0.2).exp();
        let xs = [[1.0, 2.0, 1.0], [-0.5, 0.3, 1.0]];
        let mut fisher = [[0.0f64; 4]; 4];
        for x in &xs {
            for a in 0..3 {
                for b in 0..3 {
                    fisher[a][b] += x[a] * x[b] / var / n;
                }
            }
        }
        fisher[3][3] = 2.0;

        for v in [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.3, -0.7, 0.2, 1.5],
        ] {
            let fv = policy.fisher_vector_product(&obs, &v);
            for a in 0..4 {
                let expected: f64 = (0..4).map(|b| fisher[a][b] * v[b]).sum();
                assert!(
                    (fv[a] - expected).abs() < 1e-10,
                    "row {}: {} vs {}",
                    a,
                    fv[a],
                    expected
                );
            }
        }
    }

    #[test]
    fn test_sample_actions_seeded() {
        let policy = test_policy();
        let obs = vec![1.0, 2.0, -0.5, 0.3];

        let mut rng_a = Xoshiro256StarStar::seed_from_u64(11);
        let mut rng_b = Xoshiro256StarStar::seed_from_u64(11);
        let a = policy.sample_actions(&obs, &mut rng_a);
        let b = policy.sample_actions(&obs, &mut rng_b);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);

        let mut rng_c = Xoshiro256StarStar::seed_from_u64(12);
        let c = policy.sample_actions(&obs, &mut rng_c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_set_params_clamps_log_std() {
        let mut policy = LinearGaussianPolicy::new(1, 1);
        policy.set_params(&[0.0, 0.0, -10.0], SnapshotUpdate::Both);
        let params = policy.params();
        assert_eq!(params[2], DEFAULT_MIN_LOG_STD);
        assert_eq!(policy.exploration_std()[0], DEFAULT_MIN_LOG_STD.exp());
    }

    #[test]
    fn test_snapshot_semantics() {
        let mut policy = test_policy();
        let reference = policy.reference_params();

        policy.set_params(&[0.9, 0.9, 0.9, 0.0], SnapshotUpdate::CurrentOnly);
        assert_eq!(policy.reference_params(), reference);
        assert_ne!(policy.params(), reference);

        policy.sync_reference();
        assert_eq!(policy.reference_params(), policy.params());
    }
}
