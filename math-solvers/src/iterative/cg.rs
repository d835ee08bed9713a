//! CG (Conjugate Gradient) solver
//!
//! The Conjugate Gradient method for symmetric positive definite systems,
//! with an optional symmetric preconditioner.

use crate::traits::{IdentityPreconditioner, LinearOperator, Preconditioner};
use ndarray::Array1;

/// CG solver configuration
#[derive(Debug, Clone)]
pub struct CgConfig {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Relative tolerance on ||b - Ax|| / ||b||
    pub tolerance: f64,
    /// Print progress every N iterations (0 = no output)
    pub print_interval: usize,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            print_interval: 0,
        }
    }
}

/// CG solver result
#[derive(Debug, Clone)]
pub struct CgSolution {
    /// Solution vector (last iterate when not converged)
    pub x: Array1<f64>,
    /// Number of iterations
    pub iterations: usize,
    /// Final relative residual
    pub residual: f64,
    /// Whether convergence was achieved
    pub converged: bool,
}

/// Solve Ax = b using the unpreconditioned Conjugate Gradient method
///
/// Note: This method is only correct for symmetric positive definite matrices.
/// For non-symmetric systems, use GMRES instead.
pub fn cg<A>(operator: &A, b: &Array1<f64>, config: &CgConfig) -> CgSolution
where
    A: LinearOperator + ?Sized,
{
    cg_preconditioned(operator, &IdentityPreconditioner, b, None, config)
}

/// Preconditioned Conjugate Gradient with optional initial guess
pub fn cg_preconditioned<A, P>(
    operator: &A,
    precond: &P,
    b: &Array1<f64>,
    x0: Option<&Array1<f64>>,
    config: &CgConfig,
) -> CgSolution
where
    A: LinearOperator + ?Sized,
    P: Preconditioner + ?Sized,
{
    let n = b.len();
    let b_norm = operator.norm(b);
    if b_norm == 0.0 {
        return CgSolution {
            x: Array1::zeros(n),
            iterations: 0,
            residual: 0.0,
            converged: true,
        };
    }

    let mut x = match x0 {
        Some(guess) => guess.clone(),
        None => Array1::zeros(n),
    };
    let mut r = b - &operator.apply(&x);
    let mut z = precond.apply(&r);
    let mut p = z.clone();
    let mut rz = operator.dot(&r, &z);
    let mut rel_residual = operator.norm(&r) / b_norm;

    for iter in 0..config.max_iterations {
        if rel_residual < config.tolerance {
            return CgSolution {
                x,
                iterations: iter,
                residual: rel_residual,
                converged: true,
            };
        }

        let q = operator.apply(&p);
        let pq = operator.dot(&p, &q);
        if pq.abs() < f64::MIN_POSITIVE {
            log::warn!("CG breakdown at iteration {iter}: (p, Ap) = {pq:.3e}");
            break;
        }

        let alpha = rz / pq;
        x.scaled_add(alpha, &p);
        r.scaled_add(-alpha, &q);
        rel_residual = operator.norm(&r) / b_norm;

        if config.print_interval > 0 && (iter + 1) % config.print_interval == 0 {
            log::info!(
                "CG iteration {}: relative residual = {:.6e}",
                iter + 1,
                rel_residual
            );
        }

        z = precond.apply(&r);
        let rz_new = operator.dot(&r, &z);
        let beta = rz_new / rz;
        rz = rz_new;
        p = &z + &(&p * beta);
    }

    let converged = rel_residual < config.tolerance;
    CgSolution {
        x,
        iterations: config.max_iterations,
        residual: rel_residual,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioners::DiagonalPreconditioner;
    use crate::sparse::CsrMatrix;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn laplacian_1d(n: usize) -> CsrMatrix {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_triplets(n, n, triplets)
    }

    #[test]
    fn test_cg_simple() {
        let a = CsrMatrix::from_dense(&array![[4.0, 1.0], [1.0, 3.0]], 0.0);
        let b = array![1.0, 2.0];
        let config = CgConfig {
            tolerance: 1e-12,
            ..Default::default()
        };

        let solution = cg(&a, &b, &config);
        assert!(solution.converged);

        let ax = a.matvec(&solution.x);
        assert_relative_eq!(ax[0], b[0], epsilon = 1e-10);
        assert_relative_eq!(ax[1], b[1], epsilon = 1e-10);
    }

    #[test]
    fn test_pcg_laplacian_with_guess() {
        let a = laplacian_1d(50);
        let b = Array1::from_elem(50, 1.0);
        let precond = DiagonalPreconditioner::from_csr(&a);
        let config = CgConfig {
            max_iterations: 200,
            tolerance: 1e-10,
            print_interval: 0,
        };

        let first = cg_preconditioned(&a, &precond, &b, None, &config);
        assert!(first.converged);
        assert!(first.iterations <= 50);

        let again = cg_preconditioned(&a, &precond, &b, Some(&first.x), &config);
        assert!(again.converged);
        assert_eq!(again.iterations, 0);
    }

    #[test]
    fn test_cg_reports_non_convergence() {
        let a = laplacian_1d(100);
        let b = Array1::from_elem(100, 1.0);
        let config = CgConfig {
            max_iterations: 3,
            tolerance: 1e-12,
            print_interval: 0,
        };
        let solution = cg(&a, &b, &config);
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 3);
        assert!(solution.residual > 1e-12);
    }
}
