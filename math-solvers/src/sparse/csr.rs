//! Compressed Sparse Row (CSR) matrix format
//!
//! CSR format stores:
//! - `values`: Non-zero entries in row-major order
//! - `col_indices`: Column index for each value, sorted within each row
//! - `row_ptrs`: Index into values/col_indices where each row starts
//!
//! Distributed blocks are stored with rows for the locally owned entities
//! and columns for every locally visible entity (owned first, then ghosts),
//! so a matrix may be rectangular even when the global operator is square.

use crate::traits::LinearOperator;
use ndarray::{Array1, Array2};
use std::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Compressed Sparse Row (CSR) matrix format
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    /// Number of rows
    pub num_rows: usize,
    /// Number of columns
    pub num_cols: usize,
    /// Non-zero values in row-major order
    pub values: Vec<f64>,
    /// Column indices for each value
    pub col_indices: Vec<usize>,
    /// Row pointers: row_ptrs[i] is the start index in values/col_indices for row i
    /// row_ptrs[num_rows] = nnz (total number of stored entries)
    pub row_ptrs: Vec<usize>,
}

impl CsrMatrix {
    /// Create a new empty CSR matrix
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptrs: vec![0; num_rows + 1],
        }
    }

    /// Create a CSR matrix from raw components
    ///
    /// # Panics
    ///
    /// Panics if the input arrays are inconsistent:
    /// - `row_ptrs` must have length `num_rows + 1`
    /// - `col_indices` and `values` must have the same length
    /// - `row_ptrs[num_rows]` must equal `values.len()`
    pub fn from_raw_parts(
        num_rows: usize,
        num_cols: usize,
        row_ptrs: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        assert_eq!(
            row_ptrs.len(),
            num_rows + 1,
            "row_ptrs must have num_rows + 1 elements"
        );
        assert_eq!(
            col_indices.len(),
            values.len(),
            "col_indices and values must have the same length"
        );
        assert_eq!(
            row_ptrs[num_rows],
            values.len(),
            "row_ptrs[num_rows] must equal nnz"
        );

        Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Create a CSR matrix from a dense matrix
    ///
    /// Only stores entries with magnitude > threshold
    pub fn from_dense(dense: &Array2<f64>, threshold: f64) -> Self {
        let num_rows = dense.nrows();
        let num_cols = dense.ncols();

        let mut values = Vec::new();
        let mut col_indices = Vec::new();
        let mut row_ptrs = vec![0usize; num_rows + 1];

        for i in 0..num_rows {
            for j in 0..num_cols {
                let val = dense[[i, j]];
                if val.abs() > threshold {
                    values.push(val);
                    col_indices.push(j);
                }
            }
            row_ptrs[i + 1] = values.len();
        }

        Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Create a CSR matrix from COO (Coordinate) format triplets
    ///
    /// Triplets are (row, col, value). Duplicate entries are summed; explicit
    /// zeros are kept so that the result can serve as an assembly pattern.
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Self {
        triplets.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut col_indices: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut row_counts = vec![0usize; num_rows];
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            assert!(
                row < num_rows && col < num_cols,
                "triplet ({row}, {col}) outside {num_rows}x{num_cols}"
            );
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += val;
                }
            } else {
                values.push(val);
                col_indices.push(col);
                row_counts[row] += 1;
                last = Some((row, col));
            }
        }

        let mut row_ptrs = Vec::with_capacity(num_rows + 1);
        row_ptrs.push(0);
        for count in row_counts {
            let next = row_ptrs[row_ptrs.len() - 1] + count;
            row_ptrs.push(next);
        }

        Self {
            num_rows,
            num_cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Get the range of indices in values/col_indices for a given row
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.row_ptrs[row]..self.row_ptrs[row + 1]
    }

    /// Get the (col, value) pairs for a row
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_range(row);
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Position of entry (i, j) in `values`, if it is part of the pattern
    pub fn index_of(&self, i: usize, j: usize) -> Option<usize> {
        let range = self.row_range(i);
        self.col_indices[range.clone()]
            .binary_search(&j)
            .ok()
            .map(|k| range.start + k)
    }

    /// Add `value` to entry (i, j); returns false if (i, j) is not in the pattern
    pub fn add_to(&mut self, i: usize, j: usize, value: f64) -> bool {
        match self.index_of(i, j) {
            Some(idx) => {
                self.values[idx] += value;
                true
            }
            None => false,
        }
    }

    /// Overwrite entry (i, j); returns false if (i, j) is not in the pattern
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> bool {
        match self.index_of(i, j) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Get element at (i, j), returns 0 if not stored
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.index_of(i, j).map_or(0.0, |idx| self.values[idx])
    }

    /// Reset every stored value to zero, keeping the pattern
    pub fn zero_values(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Set every stored entry of row `i` to zero
    pub fn zero_row(&mut self, i: usize) {
        let range = self.row_range(i);
        self.values[range].iter_mut().for_each(|v| *v = 0.0);
    }

    /// Multiply every stored entry of row `i` by `factor`
    pub fn scale_row(&mut self, i: usize, factor: f64) {
        let range = self.row_range(i);
        self.values[range].iter_mut().for_each(|v| *v *= factor);
    }

    /// Check whether two matrices share dimensions and sparsity pattern
    pub fn same_pattern(&self, other: &CsrMatrix) -> bool {
        self.num_rows == other.num_rows
            && self.num_cols == other.num_cols
            && self.row_ptrs == other.row_ptrs
            && self.col_indices == other.col_indices
    }

    /// Leading `rows x cols` block, dropping entries in later columns
    ///
    /// Used to extract the owned-by-owned block of a distributed matrix.
    pub fn leading_block(&self, rows: usize, cols: usize) -> Self {
        assert!(rows <= self.num_rows && cols <= self.num_cols);
        let mut values = Vec::new();
        let mut col_indices = Vec::new();
        let mut row_ptrs = Vec::with_capacity(rows + 1);
        row_ptrs.push(0);
        for i in 0..rows {
            for (j, v) in self.row_entries(i) {
                if j < cols {
                    col_indices.push(j);
                    values.push(v);
                }
            }
            row_ptrs.push(values.len());
        }
        Self {
            num_rows: rows,
            num_cols: cols,
            values,
            col_indices,
            row_ptrs,
        }
    }

    /// Matrix-vector product: y = A * x
    ///
    /// Uses parallel processing when the `parallel` feature is enabled and the
    /// matrix is large enough to benefit from parallelization.
    pub fn matvec(&self, x: &Array1<f64>) -> Array1<f64> {
        assert_eq!(x.len(), self.num_cols, "Input vector size mismatch");

        #[cfg(feature = "parallel")]
        {
            if self.num_rows >= 246 {
                return self.matvec_parallel(x);
            }
        }

        self.matvec_sequential(x)
    }

    fn matvec_sequential(&self, x: &Array1<f64>) -> Array1<f64> {
        Array1::from_iter((0..self.num_rows).map(|i| self.row_dot(i, x)))
    }

    #[cfg(feature = "parallel")]
    fn matvec_parallel(&self, x: &Array1<f64>) -> Array1<f64> {
        let results: Vec<f64> = (0..self.num_rows)
            .into_par_iter()
            .map(|i| self.row_dot(i, x))
            .collect();
        Array1::from_vec(results)
    }

    #[inline]
    fn row_dot(&self, i: usize, x: &Array1<f64>) -> f64 {
        self.row_range(i)
            .map(|idx| self.values[idx] * x[self.col_indices[idx]])
            .sum()
    }

    /// Extract diagonal elements
    pub fn diagonal(&self) -> Array1<f64> {
        let n = self.num_rows.min(self.num_cols);
        Array1::from_iter((0..n).map(|i| self.get(i, i)))
    }

    /// Create diagonal matrix from vector
    pub fn from_diagonal(diag: &Array1<f64>) -> Self {
        let n = diag.len();
        Self {
            num_rows: n,
            num_cols: n,
            values: diag.to_vec(),
            col_indices: (0..n).collect(),
            row_ptrs: (0..=n).collect(),
        }
    }

    /// Transposed copy
    pub fn transpose(&self) -> Self {
        let mut triplets = Vec::with_capacity(self.nnz());
        for i in 0..self.num_rows {
            for (j, v) in self.row_entries(i) {
                triplets.push((j, i, v));
            }
        }
        Self::from_triplets(self.num_cols, self.num_rows, triplets)
    }

    /// Convert to dense matrix (for debugging/small matrices)
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.num_rows, self.num_cols));
        for i in 0..self.num_rows {
            for (j, v) in self.row_entries(i) {
                dense[[i, j]] = v;
            }
        }
        dense
    }

    /// Sparse matrix-matrix product C = A * B
    ///
    /// Accumulates each output row in a sorted buffer; entries below 1e-15 in
    /// magnitude are dropped.
    pub fn matmul(&self, other: &CsrMatrix) -> CsrMatrix {
        assert_eq!(
            self.num_cols, other.num_rows,
            "Matrix dimension mismatch: A.cols ({}) != B.rows ({})",
            self.num_cols, other.num_rows
        );

        let m = self.num_rows;
        let n = other.num_cols;
        let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(self.nnz() * 4);
        let mut row_data: Vec<(usize, f64)> = Vec::new();

        for i in 0..m {
            row_data.clear();
            for (k, a_ik) in self.row_entries(i) {
                for (j, b_kj) in other.row_entries(k) {
                    row_data.push((j, a_ik * b_kj));
                }
            }
            row_data.sort_unstable_by_key(|&(j, _)| j);

            let mut iter = row_data.iter().copied();
            let Some((mut current_j, mut current_val)) = iter.next() else {
                continue;
            };
            for (j, val) in iter {
                if j == current_j {
                    current_val += val;
                } else {
                    if current_val.abs() > 1e-15 {
                        triplets.push((i, current_j, current_val));
                    }
                    current_j = j;
                    current_val = val;
                }
            }
            if current_val.abs() > 1e-15 {
                triplets.push((i, current_j, current_val));
            }
        }

        CsrMatrix::from_triplets(m, n, triplets)
    }
}

impl LinearOperator for CsrMatrix {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn num_cols(&self) -> usize {
        self.num_cols
    }

    fn apply(&self, x: &Array1<f64>) -> Array1<f64> {
        self.matvec(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn sample() -> CsrMatrix {
        CsrMatrix::from_dense(
            &array![[4.0, -1.0, 0.0], [-1.0, 4.0, -1.0], [0.0, -1.0, 4.0]],
            0.0,
        )
    }

    #[test]
    fn test_csr_from_dense() {
        let a = sample();
        assert_eq!(a.nnz(), 7);
        assert_eq!(a.row_ptrs, vec![0, 2, 5, 7]);
        assert_eq!(a.col_indices, vec![0, 1, 0, 1, 2, 1, 2]);
    }

    #[test]
    fn test_csr_matvec() {
        let a = sample();
        let y = a.matvec(&array![1.0, 2.0, 3.0]);
        assert_relative_eq!(y[0], 2.0);
        assert_relative_eq!(y[1], 4.0);
        assert_relative_eq!(y[2], 10.0);
    }

    #[test]
    fn test_csr_triplets_duplicate_and_empty_rows() {
        let a = CsrMatrix::from_triplets(
            4,
            3,
            vec![(2, 1, 1.0), (0, 0, 2.0), (2, 1, 0.5), (2, 0, 0.0)],
        );
        assert_eq!(a.row_ptrs, vec![0, 1, 1, 3, 3]);
        assert_relative_eq!(a.get(2, 1), 1.5);
        // explicit zeros stay in the pattern
        assert_eq!(a.index_of(2, 0), Some(1));
        assert_eq!(a.index_of(1, 0), None);
    }

    #[test]
    fn test_pattern_updates() {
        let mut a = sample();
        assert!(a.add_to(1, 2, 0.5));
        assert!(!a.add_to(0, 2, 1.0));
        assert_relative_eq!(a.get(1, 2), -0.5);
        a.scale_row(1, 2.0);
        assert_relative_eq!(a.get(1, 1), 8.0);
        a.zero_row(1);
        assert_relative_eq!(a.get(1, 0), 0.0);
        assert_eq!(a.nnz(), 7);
        assert!(a.same_pattern(&sample()));
    }

    #[test]
    fn test_leading_block() {
        let a = sample();
        let b = a.leading_block(2, 2);
        assert_eq!(b.to_dense(), array![[4.0, -1.0], [-1.0, 4.0]]);
    }

    #[test]
    fn test_matmul_and_transpose() {
        let a = CsrMatrix::from_dense(&array![[1.0, 2.0], [0.0, 3.0]], 0.0);
        let c = a.matmul(&a.transpose());
        let expected = array![[5.0, 6.0], [6.0, 9.0]];
        assert_eq!(c.to_dense(), expected);
        let d = CsrMatrix::from_diagonal(&array![1.0, 1.0]);
        assert_eq!(d.matmul(&a), a);
    }
}
