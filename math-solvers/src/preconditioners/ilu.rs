//! ILU(0) preconditioner
//!
//! Incomplete LU factorization with no fill-in: L and U keep the sparsity
//! pattern of A. Requires column indices sorted within each row, which every
//! [`CsrMatrix`] constructor guarantees.

use crate::sparse::CsrMatrix;
use crate::traits::Preconditioner;
use ndarray::Array1;

/// ILU(0) preconditioner
///
/// The factors are stored in place of A: strictly lower entries hold L
/// (unit diagonal implied), the remaining entries hold U.
#[derive(Debug, Clone)]
pub struct IluPreconditioner {
    factors: CsrMatrix,
    diag_indices: Vec<Option<usize>>,
}

impl IluPreconditioner {
    /// Factorize a square CSR matrix
    pub fn from_csr(matrix: &CsrMatrix) -> Self {
        assert_eq!(matrix.num_rows, matrix.num_cols, "ILU needs a square matrix");
        let n = matrix.num_rows;
        let mut factors = matrix.clone();
        let diag_indices: Vec<Option<usize>> = (0..n).map(|i| factors.index_of(i, i)).collect();

        for i in 0..n {
            let row = factors.row_range(i);
            for idx in row.clone() {
                let k = factors.col_indices[idx];
                if k >= i {
                    break;
                }
                let Some(kk) = diag_indices[k] else {
                    continue;
                };
                let u_kk = factors.values[kk];
                if u_kk.abs() < 1e-30 {
                    continue;
                }

                let l_ik = factors.values[idx] / u_kk;
                factors.values[idx] = l_ik;

                for j_idx in (idx + 1)..row.end {
                    let j = factors.col_indices[j_idx];
                    if let Some(kj) = factors.index_of(k, j) {
                        let u_kj = factors.values[kj];
                        factors.values[j_idx] -= l_ik * u_kj;
                    }
                }
            }
        }

        Self {
            factors,
            diag_indices,
        }
    }
}

impl Preconditioner for IluPreconditioner {
    fn apply(&self, r: &Array1<f64>) -> Array1<f64> {
        let n = self.factors.num_rows;
        let mut y = r.clone();

        // Forward substitution: Ly = r (L has unit diagonal)
        for i in 0..n {
            let mut sum = y[i];
            for (j, l_ij) in self.factors.row_entries(i) {
                if j >= i {
                    break;
                }
                sum -= l_ij * y[j];
            }
            y[i] = sum;
        }

        // Backward substitution: Ux = y
        for i in (0..n).rev() {
            let mut sum = y[i];
            for (j, u_ij) in self.factors.row_entries(i) {
                if j > i {
                    sum -= u_ij * y[j];
                }
            }
            let u_ii = self.diag_indices[i].map_or(0.0, |d| self.factors.values[d]);
            y[i] = if u_ii.abs() > 1e-30 { sum / u_ii } else { sum };
        }

        y
    }
}
