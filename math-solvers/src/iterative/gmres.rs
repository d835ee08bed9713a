//! GMRES (Generalized Minimal Residual) solver
//!
//! Restarted GMRES(m) with right preconditioning: the Arnoldi process runs on
//! A·M⁻¹, so the least-squares residual tracked by the Givens rotations is
//! the true residual ||b - Ax||.

use crate::traits::{IdentityPreconditioner, LinearOperator, Preconditioner};
use ndarray::{Array1, Array2};

/// GMRES solver configuration
#[derive(Debug, Clone)]
pub struct GmresConfig {
    /// Maximum total number of Krylov iterations, across restarts
    pub max_iterations: usize,
    /// Restart parameter (number of Arnoldi vectors before restart)
    pub restart: usize,
    /// Relative tolerance on ||b - Ax|| / ||b||
    pub tolerance: f64,
    /// Print progress every N iterations (0 = no output)
    pub print_interval: usize,
}

impl Default for GmresConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            restart: 30,
            tolerance: 1e-6,
            print_interval: 0,
        }
    }
}

/// GMRES solver result
#[derive(Debug, Clone)]
pub struct GmresSolution {
    /// Solution vector (last iterate when not converged)
    pub x: Array1<f64>,
    /// Number of Krylov iterations
    pub iterations: usize,
    /// Number of restarts performed
    pub restarts: usize,
    /// Final relative residual
    pub residual: f64,
    /// Whether convergence was achieved
    pub converged: bool,
}

/// Solve Ax = b using unpreconditioned restarted GMRES from a zero guess
pub fn gmres<A>(operator: &A, b: &Array1<f64>, config: &GmresConfig) -> GmresSolution
where
    A: LinearOperator + ?Sized,
{
    gmres_preconditioned(operator, &IdentityPreconditioner, b, None, config)
}

/// Right-preconditioned restarted GMRES with optional initial guess
pub fn gmres_preconditioned<A, P>(
    operator: &A,
    precond: &P,
    b: &Array1<f64>,
    x0: Option<&Array1<f64>>,
    config: &GmresConfig,
) -> GmresSolution
where
    A: LinearOperator + ?Sized,
    P: Preconditioner + ?Sized,
{
    let n = b.len();
    let m = config.restart.max(1);

    let b_norm = operator.norm(b);
    if b_norm == 0.0 {
        return GmresSolution {
            x: Array1::zeros(n),
            iterations: 0,
            restarts: 0,
            residual: 0.0,
            converged: true,
        };
    }

    let mut x = match x0 {
        Some(guess) => guess.clone(),
        None => Array1::zeros(n),
    };

    let mut total_iterations = 0;
    let mut restarts = 0;

    loop {
        let r = b - &operator.apply(&x);
        let beta = operator.norm(&r);
        let rel_residual = beta / b_norm;

        if rel_residual < config.tolerance || total_iterations >= config.max_iterations {
            return GmresSolution {
                x,
                iterations: total_iterations,
                restarts,
                residual: rel_residual,
                converged: rel_residual < config.tolerance,
            };
        }
        if total_iterations > 0 {
            restarts += 1;
        }

        let mut v: Vec<Array1<f64>> = Vec::with_capacity(m + 1);
        let mut z: Vec<Array1<f64>> = Vec::with_capacity(m);
        v.push(&r / beta);

        let mut h = Array2::<f64>::zeros((m + 1, m));
        let mut cs = vec![0.0; m];
        let mut sn = vec![0.0; m];
        let mut g = Array1::<f64>::zeros(m + 1);
        g[0] = beta;

        let mut k = 0;
        for j in 0..m {
            if total_iterations >= config.max_iterations {
                break;
            }
            total_iterations += 1;

            // w = A * M⁻¹ * v_j
            let zj = precond.apply(&v[j]);
            let mut w = operator.apply(&zj);
            z.push(zj);

            // Modified Gram-Schmidt
            for i in 0..=j {
                let h_ij = operator.dot(&v[i], &w);
                h[[i, j]] = h_ij;
                w.scaled_add(-h_ij, &v[i]);
            }
            let w_norm = operator.norm(&w);
            h[[j + 1, j]] = w_norm;

            // Apply previous Givens rotations
            for i in 0..j {
                let temp = cs[i] * h[[i, j]] + sn[i] * h[[i + 1, j]];
                h[[i + 1, j]] = -sn[i] * h[[i, j]] + cs[i] * h[[i + 1, j]];
                h[[i, j]] = temp;
            }

            let (c, s) = givens_rotation(h[[j, j]], h[[j + 1, j]]);
            cs[j] = c;
            sn[j] = s;
            h[[j, j]] = c * h[[j, j]] + s * h[[j + 1, j]];
            h[[j + 1, j]] = 0.0;
            g[j + 1] = -s * g[j];
            g[j] *= c;
            k = j + 1;

            let inner_residual = g[j + 1].abs() / b_norm;
            if config.print_interval > 0 && total_iterations % config.print_interval == 0 {
                log::info!(
                    "GMRES iteration {}: relative residual = {:.6e}",
                    total_iterations,
                    inner_residual
                );
            }

            // happy breakdown: the Krylov space is invariant
            if inner_residual < config.tolerance || w_norm <= 1e-14 * beta {
                break;
            }
            v.push(&w / w_norm);
        }

        let y = solve_upper_triangular(&h, &g, k);
        for (zi, &yi) in z.iter().zip(y.iter()) {
            x.scaled_add(yi, zi);
        }
    }
}

/// Compute Givens rotation coefficients zeroing `b` against `a`
#[inline]
fn givens_rotation(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        return (1.0, 0.0);
    }
    if a == 0.0 {
        return (0.0, b.signum());
    }
    let r = a.hypot(b);
    (a / r, b / r)
}

/// Solve the leading k×k upper triangular system Hy = g
fn solve_upper_triangular(h: &Array2<f64>, g: &Array1<f64>, k: usize) -> Vec<f64> {
    let mut y = vec![0.0; k];
    for i in (0..k).rev() {
        let mut sum = g[i];
        for j in (i + 1)..k {
            sum -= h[[i, j]] * y[j];
        }
        if h[[i, i]].abs() > f64::MIN_POSITIVE {
            y[i] = sum / h[[i, i]];
        }
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioners::IluPreconditioner;
    use crate::sparse::CsrMatrix;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn convection_diffusion(n: usize) -> CsrMatrix {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.5));
            if i > 0 {
                triplets.push((i, i - 1, -1.5));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -0.5));
            }
        }
        CsrMatrix::from_triplets(n, n, triplets)
    }

    #[test]
    fn test_gmres_simple() {
        let a = CsrMatrix::from_dense(&array![[4.0, 1.0], [2.0, 3.0]], 0.0);
        let b = array![1.0, 2.0];
        let config = GmresConfig {
            tolerance: 1e-12,
            ..Default::default()
        };

        let solution = gmres(&a, &b, &config);
        assert!(solution.converged);
        let ax = a.matvec(&solution.x);
        assert_relative_eq!(ax[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(ax[1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_gmres_restarted_non_symmetric() {
        let n = 80;
        let a = convection_diffusion(n);
        let mut rng = StdRng::seed_from_u64(7);
        let x_true = Array1::from_iter((0..n).map(|_| rng.random_range(-1.0..1.0)));
        let b = a.matvec(&x_true);

        let config = GmresConfig {
            max_iterations: 2000,
            restart: 10,
            tolerance: 1e-11,
            print_interval: 0,
        };
        let solution = gmres(&a, &b, &config);
        assert!(solution.converged);
        assert!(solution.restarts > 0);
        for i in 0..n {
            assert_relative_eq!(solution.x[i], x_true[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn test_gmres_ilu_converges_quickly() {
        let a = convection_diffusion(60);
        let b = Array1::from_elem(60, 1.0);
        let precond = IluPreconditioner::from_csr(&a);
        let config = GmresConfig {
            tolerance: 1e-12,
            ..Default::default()
        };
        let solution = gmres_preconditioned(&a, &precond, &b, None, &config);
        assert!(solution.converged);
        // ILU(0) of a tridiagonal matrix is an exact factorization
        assert!(solution.iterations <= 2);
    }

    #[test]
    fn test_gmres_iteration_cap() {
        let a = convection_diffusion(100);
        let b = Array1::from_elem(100, 1.0);
        let config = GmresConfig {
            max_iterations: 4,
            restart: 30,
            tolerance: 1e-14,
            print_interval: 0,
        };
        let solution = gmres(&a, &b, &config);
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 4);
        assert!(solution.x.iter().all(|v| v.is_finite()));
    }
}
