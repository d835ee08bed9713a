//! Elimination of the cell unknowns
//!
//! With `acc` diagonal, the face system is
//!
//! ```text
//! S   = aff - afc acc⁻¹ acf
//! r_f = b_f - afc acc⁻¹ b_c
//! x_c = acc⁻¹ (b_c - acf x_f)
//! ```
//!
//! `S` is written into the `aff` sparsity pattern, which already holds
//! every face pair sharing a cell.

use crate::assembly::GlobalBlocks;
use crate::error::{MfdError, Result};
use ndarray::{Array1, ArrayView1};
use solvers::CsrMatrix;

/// Schur complement reduction over the assembled blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct SchurReducer;

impl SchurReducer {
    /// Fail with `SingularCellBlock` unless every local `acc` entry is positive and finite
    pub fn check_cell_block(blocks: &GlobalBlocks) -> Result<()> {
        for (c, &value) in blocks.acc.iter().enumerate() {
            if !(value > 0.0 && value.is_finite()) {
                return Err(MfdError::SingularCellBlock { cell: c, value });
            }
        }
        Ok(())
    }

    /// `S = aff - afc acc⁻¹ acf` (owned faces × local faces)
    pub fn reduce(blocks: &GlobalBlocks) -> Result<CsrMatrix> {
        Self::check_cell_block(blocks)?;

        let mut schur = blocks.aff.clone();
        for f in 0..blocks.num_owned_faces() {
            for (c, a_fc) in blocks.afc.row_entries(f) {
                if a_fc == 0.0 {
                    continue;
                }
                let weight = a_fc / blocks.acc[c];
                for (g, a_cg) in blocks.acf.row_entries(c) {
                    let in_pattern = schur.add_to(f, g, -weight * a_cg);
                    debug_assert!(in_pattern, "schur entry ({f}, {g}) outside aff pattern");
                }
            }
        }
        log::debug!(
            "schur complement: {} rows, {} stored entries",
            schur.num_rows,
            schur.nnz()
        );
        Ok(schur)
    }

    /// `r_f = b_f - afc acc⁻¹ b_c` for the owned faces
    ///
    /// `b_cell` covers every local cell; `b_face` at least the owned faces.
    pub fn reduce_rhs(
        blocks: &GlobalBlocks,
        b_cell: ArrayView1<'_, f64>,
        b_face: ArrayView1<'_, f64>,
    ) -> Array1<f64> {
        let scaled_cells = &b_cell / &blocks.acc;
        let mut r = b_face.slice(ndarray::s![..blocks.num_owned_faces()]).to_owned();
        r -= &blocks.afc.matvec(&scaled_cells);
        r
    }

    /// `x_c = acc⁻¹ (b_c - acf x_f)` for every local cell
    ///
    /// `x_face` must carry current ghost values.
    pub fn back_substitute(
        blocks: &GlobalBlocks,
        b_cell: ArrayView1<'_, f64>,
        x_face: &Array1<f64>,
    ) -> Array1<f64> {
        (&b_cell - &blocks.acf.matvec(x_face)) / &blocks.acc
    }
}
