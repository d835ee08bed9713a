//! LU decomposition solver
//!
//! Dense LU factorization with partial pivoting, PA = LU.

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors that can occur during LU factorization or solve
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LuError {
    /// A pivot fell below the relative singularity threshold
    #[error("Matrix is singular or nearly singular (pivot {pivot:.3e} at column {column})")]
    SingularMatrix {
        /// Column where elimination failed
        column: usize,
        /// Magnitude of the best available pivot
        pivot: f64,
    },
    /// Operand sizes do not agree
    #[error("Matrix dimensions mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension provided
        got: usize,
    },
}

/// LU factorization result
///
/// `lu` stores L below the diagonal (unit diagonal implied) and U on and
/// above it; `perm[i]` is the original row placed at position i.
#[derive(Debug, Clone)]
pub struct LuFactorization {
    /// Combined L and U factors
    pub lu: Array2<f64>,
    /// Row permutation
    pub perm: Vec<usize>,
    /// Matrix dimension
    pub n: usize,
}

impl LuFactorization {
    /// Solve Ax = b using the precomputed factorization
    pub fn solve(&self, b: &Array1<f64>) -> Result<Array1<f64>, LuError> {
        if b.len() != self.n {
            return Err(LuError::DimensionMismatch {
                expected: self.n,
                got: b.len(),
            });
        }

        let mut x = Array1::from_iter(self.perm.iter().map(|&p| b[p]));

        // Forward substitution: Ly = Pb
        for i in 0..self.n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum;
        }

        // Backward substitution: Ux = y
        for i in (0..self.n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..self.n {
                sum -= self.lu[[i, j]] * x[j];
            }
            x[i] = sum / self.lu[[i, i]];
        }

        Ok(x)
    }
}

/// Compute LU factorization with partial pivoting
///
/// Pivots smaller than `1e-13 * max|a_ij|` are reported as singular.
pub fn lu_factorize(a: &Array2<f64>) -> Result<LuFactorization, LuError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(LuError::DimensionMismatch {
            expected: n,
            got: a.ncols(),
        });
    }

    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let threshold = 1e-13 * scale.max(f64::MIN_POSITIVE);

    let mut lu = a.clone();
    let mut perm: Vec<usize> = (0..n).collect();

    for k in 0..n {
        let (max_row, max_val) = (k..n)
            .map(|i| (i, lu[[i, k]].abs()))
            .fold((k, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if max_val <= threshold {
            return Err(LuError::SingularMatrix {
                column: k,
                pivot: max_val,
            });
        }

        if max_row != k {
            for j in 0..n {
                lu.swap([k, j], [max_row, j]);
            }
            perm.swap(k, max_row);
        }

        let pivot = lu[[k, k]];
        for i in (k + 1)..n {
            let mult = lu[[i, k]] / pivot;
            lu[[i, k]] = mult;
            for j in (k + 1)..n {
                let update = mult * lu[[k, j]];
                lu[[i, j]] -= update;
            }
        }
    }

    Ok(LuFactorization { lu, perm, n })
}

/// Solve Ax = b using LU decomposition
pub fn lu_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, LuError> {
    lu_factorize(a)?.solve(b)
}
