//! Core traits for linear algebra operations
//!
//! - [`LinearOperator`]: matrix-like objects that can perform matrix-vector products
//! - [`Preconditioner`]: approximate inverses applied inside Krylov iterations
//!
//! Vectors handed to both traits hold the rows owned by the calling process.

use crate::blas_helpers::inner_product;
use ndarray::Array1;

/// Trait for linear operators (matrices or matrix-free representations)
///
/// Operators distributed over several processes override [`dot`](Self::dot)
/// with a globally reduced inner product. Every Krylov method in this crate
/// computes norms and projections through it.
pub trait LinearOperator: Send + Sync {
    /// Number of rows owned by this process
    fn num_rows(&self) -> usize;

    /// Number of columns seen by this process
    fn num_cols(&self) -> usize;

    /// Apply the operator: y = A * x
    fn apply(&self, x: &Array1<f64>) -> Array1<f64>;

    /// Inner product of two row-distributed vectors
    fn dot(&self, x: &Array1<f64>, y: &Array1<f64>) -> f64 {
        inner_product(x, y)
    }

    /// 2-norm consistent with [`dot`](Self::dot)
    fn norm(&self, x: &Array1<f64>) -> f64 {
        self.dot(x, x).max(0.0).sqrt()
    }

    /// Check if the operator is square
    fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols()
    }
}

/// Trait for preconditioners
///
/// A preconditioner approximates the inverse of a matrix to accelerate
/// iterative solver convergence.
pub trait Preconditioner: Send + Sync {
    /// Apply the preconditioner: y = M⁻¹ * r
    fn apply(&self, r: &Array1<f64>) -> Array1<f64>;
}

impl<P: Preconditioner + ?Sized> Preconditioner for Box<P> {
    fn apply(&self, r: &Array1<f64>) -> Array1<f64> {
        (**self).apply(r)
    }
}

/// Identity preconditioner (no preconditioning)
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &Array1<f64>) -> Array1<f64> {
        r.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Doubling;

    impl LinearOperator for Doubling {
        fn num_rows(&self) -> usize {
            3
        }
        fn num_cols(&self) -> usize {
            3
        }
        fn apply(&self, x: &Array1<f64>) -> Array1<f64> {
            x * 2.0
        }
    }

    #[test]
    fn test_default_dot_and_norm() {
        let op = Doubling;
        let x = array![3.0, 0.0, 4.0];
        assert_eq!(op.dot(&x, &x), 25.0);
        assert_eq!(op.norm(&x), 5.0);
        assert!(op.is_square());
    }

    #[test]
    fn test_boxed_identity() {
        let p: Box<dyn Preconditioner> = Box::new(IdentityPreconditioner);
        let r = array![1.0, -2.0];
        assert_eq!(p.apply(&r), r);
    }
}
