//! Global assembly of the mixed-hybrid blocks
//!
//! The global system over local cells `c` and faces `f` is
//!
//! ```text
//! | acc  acf | | p |   | b_c |
//! | afc  aff | | λ | = | b_f |
//! ```
//!
//! `acc` is diagonal. `acf` has a row for every local cell (owned and ghost),
//! `afc` and `aff` a row for every owned face; columns address every local
//! entity. Ghost cells contribute to owned face rows from ghosted geometry,
//! so no partial sums cross process boundaries.

use crate::local_form::LocalStiffness;
use crate::mesh::Mesh;
use ndarray::Array1;
use solvers::{CsrMatrix, SparsityPattern};

/// The four blocks of the assembled system
#[derive(Debug, Clone)]
pub struct GlobalBlocks {
    /// Cell diagonal, one entry per local cell
    pub acc: Array1<f64>,
    /// Local cells × local faces
    pub acf: CsrMatrix,
    /// Owned faces × local cells
    pub afc: CsrMatrix,
    /// Owned faces × local faces
    pub aff: CsrMatrix,
}

impl GlobalBlocks {
    /// Zero-valued blocks with the sparsity implied by the mesh connectivity
    pub fn symbolic(mesh: &Mesh) -> Self {
        let ncells = mesh.num_cells();
        let nfaces = mesh.num_faces();
        let nowned = mesh.num_owned_faces();

        let mut acf = SparsityPattern::new(ncells, nfaces);
        let mut afc = SparsityPattern::new(nowned, ncells);
        let mut aff = SparsityPattern::new(nowned, nfaces);

        for (c, cell) in mesh.cells().iter().enumerate() {
            acf.insert_block(&[c], &cell.faces);
            let owned_rows: Vec<usize> =
                cell.faces.iter().copied().filter(|&f| f < nowned).collect();
            afc.insert_block(&owned_rows, &[c]);
            aff.insert_block(&owned_rows, &cell.faces);
        }

        let blocks = Self {
            acc: Array1::zeros(ncells),
            acf: acf.build(),
            afc: afc.build(),
            aff: aff.build(),
        };
        log::debug!(
            "symbolic assembly: {} cells, {} faces ({} owned), nnz acf={} afc={} aff={}",
            ncells,
            nfaces,
            nowned,
            blocks.acf.nnz(),
            blocks.afc.nnz(),
            blocks.aff.nnz()
        );
        blocks
    }

    /// Reset all values, keeping the sparsity
    pub fn zero_values(&mut self) {
        self.acc.fill(0.0);
        self.acf.zero_values();
        self.afc.zero_values();
        self.aff.zero_values();
    }

    /// Sum the local stiffness pieces of every local cell into the blocks
    ///
    /// `stiffness[c]` must be ordered like `mesh.cell(c).faces`.
    pub fn assemble(&mut self, mesh: &Mesh, stiffness: &[LocalStiffness]) {
        let nowned = mesh.num_owned_faces();
        for (c, (cell, local)) in mesh.cells().iter().zip(stiffness).enumerate() {
            self.acc[c] += local.acc;
            for (n, &g) in cell.faces.iter().enumerate() {
                self.acf.add_to(c, g, local.acf[n]);
            }
            for (m, &f) in cell.faces.iter().enumerate() {
                if f >= nowned {
                    continue;
                }
                self.afc.add_to(f, c, local.afc[m]);
                for (n, &g) in cell.faces.iter().enumerate() {
                    self.aff.add_to(f, g, local.aff[[m, n]]);
                }
            }
        }
    }

    pub fn num_owned_faces(&self) -> usize {
        self.aff.num_rows
    }

    pub fn num_cells(&self) -> usize {
        self.acc.len()
    }
}
