//! Symbolic sparsity patterns
//!
//! Assembly happens in two passes: the connectivity is recorded once into a
//! [`SparsityPattern`], frozen into a zero-valued [`CsrMatrix`], and numeric
//! passes then only touch values through [`CsrMatrix::add_to`].

use super::CsrMatrix;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Collected (row, col) positions of a sparse matrix
#[derive(Debug, Clone)]
pub struct SparsityPattern {
    num_rows: usize,
    num_cols: usize,
    entries: Vec<(usize, usize)>,
}

impl SparsityPattern {
    /// Create an empty pattern
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            entries: Vec::new(),
        }
    }

    /// Record position (row, col); duplicates are merged on [`build`](Self::build)
    pub fn insert(&mut self, row: usize, col: usize) {
        debug_assert!(row < self.num_rows && col < self.num_cols);
        self.entries.push((row, col));
    }

    /// Record every (row, col) pair of a dense local block
    pub fn insert_block(&mut self, rows: &[usize], cols: &[usize]) {
        for &r in rows {
            for &c in cols {
                self.insert(r, c);
            }
        }
    }

    /// Number of recorded positions, before merging duplicates
    pub fn num_recorded(&self) -> usize {
        self.entries.len()
    }

    /// Freeze into a CSR matrix with explicit zeros at every recorded position
    pub fn build(mut self) -> CsrMatrix {
        #[cfg(feature = "parallel")]
        self.entries.par_sort_unstable();
        #[cfg(not(feature = "parallel"))]
        self.entries.sort_unstable();
        self.entries.dedup();

        let mut row_ptrs = vec![0usize; self.num_rows + 1];
        for &(r, _) in &self.entries {
            row_ptrs[r + 1] += 1;
        }
        for i in 0..self.num_rows {
            row_ptrs[i + 1] += row_ptrs[i];
        }
        let col_indices: Vec<usize> = self.entries.iter().map(|&(_, c)| c).collect();
        let values = vec![0.0; col_indices.len()];

        CsrMatrix::from_raw_parts(self.num_rows, self.num_cols, row_ptrs, col_indices, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_merges_duplicates() {
        let mut p = SparsityPattern::new(3, 4);
        p.insert_block(&[0, 2], &[3, 1]);
        p.insert(2, 1);
        assert_eq!(p.num_recorded(), 5);

        let m = p.build();
        assert_eq!(m.nnz(), 4);
        assert_eq!(m.row_ptrs, vec![0, 2, 2, 4]);
        assert_eq!(m.col_indices, vec![1, 3, 1, 3]);
        assert!(m.values.iter().all(|&v| v == 0.0));
    }
}
