//! Dense vector kernels shared by the Krylov methods and preconditioners
//!
//! These operate on the locally owned part of a vector only; global
//! reductions go through [`LinearOperator::dot`](crate::LinearOperator::dot).

use ndarray::Array1;

/// Compute inner product (x, y) = Σ x_i * y_i
#[inline]
pub fn inner_product(x: &Array1<f64>, y: &Array1<f64>) -> f64 {
    assert_eq!(
        x.len(),
        y.len(),
        "Vector lengths must match for inner product"
    );
    x.iter().zip(y.iter()).map(|(xi, yi)| xi * yi).sum()
}

/// Compute vector 2-norm: ||x||_2 = sqrt(Σ x_i^2)
#[inline]
pub fn vector_norm(x: &Array1<f64>) -> f64 {
    inner_product(x, x).sqrt()
}

/// Maximum absolute entry
#[inline]
pub fn max_abs(x: &Array1<f64>) -> f64 {
    x.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

/// Compute axpy: y = α * x + y
#[inline]
pub fn axpy(alpha: f64, x: &Array1<f64>, y: &mut Array1<f64>) {
    y.scaled_add(alpha, x);
}
