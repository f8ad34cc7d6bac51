//! Conjugate gradient over implicit linear operators.
//!
//! The Fisher information matrix is never materialized. Curvature enters
//! only through matrix-vector products, abstracted behind
//! [`LinearOperator`], and the natural-gradient direction is obtained by
//! solving F d = g iteratively.
//!
//! ## References
//!
//! - Nocedal & Wright, "Numerical Optimization", ch. 5
//! - Schulman et al., "Trust Region Policy Optimization" (2015)

/// Matrix-free symmetric positive definite operator.
pub trait LinearOperator {
    /// Apply the operator to a vector.
    fn apply(&self, v: &[f64]) -> Vec<f64>;
}

impl<F> LinearOperator for F
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        self(v)
    }
}

/// Operator with Tikhonov damping: (A + λI) v.
///
/// Keeps the CG system well conditioned when the underlying curvature is
/// near singular.
pub struct DampedOperator<'a, Op: LinearOperator + ?Sized> {
    inner: &'a Op,
    damping: f64,
}

impl<'a, Op: LinearOperator + ?Sized> DampedOperator<'a, Op> {
    /// Wrap `inner` with damping coefficient `damping`.
    pub fn new(inner: &'a Op, damping: f64) -> Self {
        Self { inner, damping }
    }
}

impl<Op: LinearOperator + ?Sized> LinearOperator for DampedOperator<'_, Op> {
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let mut out = self.inner.apply(v);
        for (o, x) in out.iter_mut().zip(v.iter()) {
            *o += self.damping * x;
        }
        out
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Solve A x = b by conjugate gradient.
///
/// # Arguments
///
/// * `op` - the operator A, assumed symmetric positive definite
/// * `b` - right-hand side
/// * `x0` - optional warm start; residual is recomputed as b - A x0
/// * `cg_iters` - iteration budget
/// * `residual_tol` - early exit when the squared residual drops below this
///
/// Runs the full budget unless the residual tolerance is met. Divergence
/// is not detected here; callers validate the final solution.
pub fn cg_solve<Op: LinearOperator + ?Sized>(
    op: &Op,
    b: &[f64],
    x0: Option<&[f64]>,
    cg_iters: usize,
    residual_tol: f64,
) -> Vec<f64> {
    let (mut x, mut r) = match x0 {
        Some(x0) => {
            assert_eq!(x0.len(), b.len());
            let ax0 = op.apply(x0);
            let r: Vec<f64> = b.iter().zip(ax0.iter()).map(|(bi, ai)| bi - ai).collect();
            (x0.to_vec(), r)
        }
        None => (vec![0.0; b.len()], b.to_vec()),
    };

    let mut p = r.clone();
    let mut rdotr = dot(&r, &r);

    for _ in 0..cg_iters {
        if rdotr < residual_tol {
            break;
        }

        let z = op.apply(&p);
        let alpha = rdotr / dot(&p, &z);

        for i in 0..x.len() {
            x[i] += alpha * p[i];
            r[i] -= alpha * z[i];
        }

        let new_rdotr = dot(&r, &r);
        let beta = new_rdotr / rdotr;
        for i in 0..p.len() {
            p[i] = r[i] + beta * p[i];
        }
        rdotr = new_rdotr;
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dense SPD matrix as an operator, row-major.
    struct DenseOperator {
        rows: Vec<Vec<f64>>,
    }

    impl LinearOperator for DenseOperator {
        fn apply(&self, v: &[f64]) -> Vec<f64> {
            self.rows.iter().map(|row| dot(row, v)).collect()
        }
    }

    fn residual_norm(op: &impl LinearOperator, x: &[f64], b: &[f64]) -> f64 {
        let ax = op.apply(x);
        ax.iter()
            .zip(b.iter())
            .map(|(a, bb)| (a - bb).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    #[test]
    fn test_cg_identity_cold_start() {
        let identity = |v: &[f64]| v.to_vec();
        let b = vec![1.0, -2.0, 3.0];
        // One iteration suffices: alpha = 1, x = b
        let x = cg_solve(&identity, &b, None, 1, 1e-10);
        for (xi, bi) in x.iter().zip(b.iter()) {
            assert!((xi - bi).abs() < 1e-12, "expected x=b, got {} vs {}", xi, bi);
        }
    }

    #[test]
    fn test_cg_identity_warm_start_is_immediate() {
        let identity = |v: &[f64]| v.to_vec();
        let b = vec![0.5, 0.25, -1.0];
        // Warm start at the exact solution: residual is zero, x stays b
        let x = cg_solve(&identity, &b, Some(&b), 10, 1e-10);
        assert_eq!(x, b);
    }

    #[test]
    fn test_cg_spd_system() {
        let op = DenseOperator {
            rows: vec![vec![4.0, 1.0], vec![1.0, 3.0]],
        };
        let b = vec![1.0, 2.0];
        let x = cg_solve(&op, &b, None, 10, 1e-12);

        // Exact solution: A^{-1} b = [1/11, 7/11]
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-9);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_cg_residual_shrinks_within_budget() {
        let op = DenseOperator {
            rows: vec![
                vec![10.0, 1.0, 0.0],
                vec![1.0, 7.0, 2.0],
                vec![0.0, 2.0, 5.0],
            ],
        };
        let b = vec![1.0, -1.0, 2.0];

        let before = residual_norm(&op, &[0.0, 0.0, 0.0], &b);
        let x = cg_solve(&op, &b, None, 3, 0.0);
        let after = residual_norm(&op, &x, &b);

        assert!(
            after < before * 1e-6,
            "residual did not shrink: {} -> {}",
            before,
            after
        );
    }

    #[test]
    fn test_cg_warm_start_beats_cold_on_tight_budget() {
        let op = DenseOperator {
            rows: vec![vec![6.0, 2.0], vec![2.0, 4.0]],
        };
        let b = vec![2.0, 1.0];
        // Exact solution of [[6,2],[2,4]] x = [2,1] is [0.3, 0.1]
        let near = vec![0.29, 0.11];

        let cold = cg_solve(&op, &b, None, 1, 0.0);
        let warm = cg_solve(&op, &b, Some(&near), 1, 0.0);

        let err = |x: &[f64]| ((x[0] - 0.3).powi(2) + (x[1] - 0.1).powi(2)).sqrt();
        assert!(err(&warm) < err(&cold));
    }

    #[test]
    fn test_damped_operator_adds_diagonal() {
        let zero = |v: &[f64]| vec![0.0; v.len()];
        let damped = DampedOperator::new(&zero, 0.5);
        let out = damped.apply(&[2.0, -4.0]);
        assert_eq!(out, vec![1.0, -2.0]);
    }

    #[test]
    fn test_dot() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }
}
