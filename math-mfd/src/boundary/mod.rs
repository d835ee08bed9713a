//! Boundary conditions for the mixed-hybrid system
//!
//! Conditions are given per local face by an explicit [`BoundaryConditions`]
//! table owned by the caller. Face equations read `-q_f = b_f` with `q_f`
//! the outward flux leaving the domain, so:
//!
//! - **Dirichlet** `λ_f = g`: the face unknown is eliminated from every other
//!   equation, and an owned face row becomes `λ_f = g`
//! - **Neumann** (outward flux density `g`): `b_f -= g · area`
//! - **Flux** (total outward flux `g`): `b_f -= g`
//! - **Mixed** (Robin, `q_f = c · area · (λ_f - g)`): `aff(f,f) += c · area`,
//!   `b_f += c · area · g`

mod reconcile;

pub use reconcile::reconcile_ghost_markers;

use crate::assembly::GlobalBlocks;
use crate::error::{MfdError, Result};
use crate::mesh::{Mesh, Point};
use ndarray::ArrayViewMut1;
use serde::{Deserialize, Serialize};

/// Kind of condition on a face
///
/// The declaration order is the precedence used when copies of a face
/// disagree: `None < Neumann < Flux < Mixed < Dirichlet`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMarker {
    #[default]
    None,
    Neumann,
    Flux,
    Mixed,
    Dirichlet,
}

impl BoundaryMarker {
    /// Integer flag used in exchange buffers
    pub fn flag(self) -> usize {
        self as usize
    }

    pub fn from_flag(flag: usize) -> Option<Self> {
        match flag {
            0 => Some(BoundaryMarker::None),
            1 => Some(BoundaryMarker::Neumann),
            2 => Some(BoundaryMarker::Flux),
            3 => Some(BoundaryMarker::Mixed),
            4 => Some(BoundaryMarker::Dirichlet),
            _ => None,
        }
    }
}

/// Per-face boundary table over the local faces of a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConditions {
    pub markers: Vec<BoundaryMarker>,
    pub values: Vec<f64>,
    /// Transfer coefficient `c` of mixed faces
    pub mixed_coefficients: Vec<f64>,
}

impl BoundaryConditions {
    /// Table with every face unmarked
    pub fn new(num_faces: usize) -> Self {
        Self {
            markers: vec![BoundaryMarker::None; num_faces],
            values: vec![0.0; num_faces],
            mixed_coefficients: vec![0.0; num_faces],
        }
    }

    /// Unmarked table sized for the local faces of `mesh`
    pub fn for_mesh(mesh: &Mesh) -> Self {
        Self::new(mesh.num_faces())
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn set(&mut self, face: usize, marker: BoundaryMarker, value: f64) {
        self.markers[face] = marker;
        self.values[face] = value;
    }

    pub fn set_mixed(&mut self, face: usize, coefficient: f64, value: f64) {
        self.set(face, BoundaryMarker::Mixed, value);
        self.mixed_coefficients[face] = coefficient;
    }

    /// Mark every face of a named region, with values from the face centroids
    pub fn set_region<F>(
        &mut self,
        mesh: &Mesh,
        region: &str,
        marker: BoundaryMarker,
        value: F,
    ) -> Result<()>
    where
        F: Fn(&Point) -> f64,
    {
        let faces = mesh
            .region(region)
            .ok_or_else(|| MfdError::config(format!("unknown region '{region}'")))?;
        for &f in faces {
            self.set(f, marker, value(&mesh.face(f).centroid));
        }
        Ok(())
    }

    pub fn is_dirichlet(&self, face: usize) -> bool {
        self.markers[face] == BoundaryMarker::Dirichlet
    }

    pub fn dirichlet_mask(&self) -> Vec<bool> {
        self.markers
            .iter()
            .map(|&m| m == BoundaryMarker::Dirichlet)
            .collect()
    }

    /// Number of faces carrying `marker`
    pub fn count(&self, marker: BoundaryMarker) -> usize {
        self.markers.iter().filter(|&&m| m == marker).count()
    }
}

/// Apply `bcs` to the assembled blocks and right-hand side
///
/// `rhs_cell` has one entry per local cell, `rhs_face` one per local face;
/// only owned face rows are modified.
pub fn apply_boundary_conditions(
    mesh: &Mesh,
    bcs: &BoundaryConditions,
    blocks: &mut GlobalBlocks,
    rhs_cell: &mut ArrayViewMut1<'_, f64>,
    rhs_face: &mut ArrayViewMut1<'_, f64>,
) -> Result<()> {
    if bcs.len() != mesh.num_faces() {
        return Err(MfdError::DimensionMismatch {
            what: "boundary conditions",
            expected: mesh.num_faces(),
            actual: bcs.len(),
        });
    }

    // Dirichlet columns of the cell equations
    for c in 0..blocks.acf.num_rows {
        for idx in blocks.acf.row_range(c) {
            let d = blocks.acf.col_indices[idx];
            if bcs.is_dirichlet(d) {
                rhs_cell[c] -= blocks.acf.values[idx] * bcs.values[d];
                blocks.acf.values[idx] = 0.0;
            }
        }
    }

    let nowned = blocks.num_owned_faces();
    for f in 0..nowned {
        if bcs.is_dirichlet(f) {
            blocks.aff.zero_row(f);
            blocks.aff.set(f, f, 1.0);
            blocks.afc.zero_row(f);
            rhs_face[f] = bcs.values[f];
            continue;
        }

        for idx in blocks.aff.row_range(f) {
            let d = blocks.aff.col_indices[idx];
            if bcs.is_dirichlet(d) {
                rhs_face[f] -= blocks.aff.values[idx] * bcs.values[d];
                blocks.aff.values[idx] = 0.0;
            }
        }

        let area = mesh.face(f).area;
        match bcs.markers[f] {
            BoundaryMarker::Neumann => rhs_face[f] -= bcs.values[f] * area,
            BoundaryMarker::Flux => rhs_face[f] -= bcs.values[f],
            BoundaryMarker::Mixed => {
                let transfer = bcs.mixed_coefficients[f] * area;
                blocks.aff.add_to(f, f, transfer);
                rhs_face[f] += transfer * bcs.values[f];
            }
            BoundaryMarker::None | BoundaryMarker::Dirichlet => {}
        }
    }

    log::debug!(
        "boundary conditions: {} dirichlet, {} neumann, {} flux, {} mixed faces",
        bcs.count(BoundaryMarker::Dirichlet),
        bcs.count(BoundaryMarker::Neumann),
        bcs.count(BoundaryMarker::Flux),
        bcs.count(BoundaryMarker::Mixed)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MfdMethod;
    use crate::local_form::{LocalFormBuilder, Tensor};
    use crate::mesh::box_mesh_hexahedra;
    use ndarray::Array1;

    fn assembled() -> (Mesh, GlobalBlocks) {
        let mesh =
            box_mesh_hexahedra(2, 1, 1, Point::default(), Point::new(2.0, 1.0, 1.0)).unwrap();
        let builder = LocalFormBuilder::new(MfdMethod::TwoPointFlux);
        let local: Vec<_> = (0..2)
            .map(|c| {
                builder
                    .build(&mesh, c, &Tensor::default())
                    .unwrap()
                    .stiffness(&[1.0; 6])
            })
            .collect();
        let mut blocks = GlobalBlocks::symbolic(&mesh);
        blocks.assemble(&mesh, &local);
        (mesh, blocks)
    }

    #[test]
    fn test_marker_order() {
        assert!(BoundaryMarker::Dirichlet > BoundaryMarker::Mixed);
        assert!(BoundaryMarker::Mixed > BoundaryMarker::Flux);
        assert!(BoundaryMarker::Flux > BoundaryMarker::Neumann);
        assert!(BoundaryMarker::Neumann > BoundaryMarker::None);
        for m in [
            BoundaryMarker::None,
            BoundaryMarker::Neumann,
            BoundaryMarker::Flux,
            BoundaryMarker::Mixed,
            BoundaryMarker::Dirichlet,
        ] {
            assert_eq!(BoundaryMarker::from_flag(m.flag()), Some(m));
        }
        assert_eq!(BoundaryMarker::from_flag(9), None);
    }

    #[test]
    fn test_dirichlet_elimination() {
        let (mesh, mut blocks) = assembled();
        let mut bcs = BoundaryConditions::for_mesh(&mesh);
        bcs.set(0, BoundaryMarker::Dirichlet, 3.0);
        let mut rhs_c = Array1::zeros(2);
        let mut rhs_f = Array1::zeros(11);
        apply_boundary_conditions(
            &mesh,
            &bcs,
            &mut blocks,
            &mut rhs_c.view_mut(),
            &mut rhs_f.view_mut(),
        )
        .unwrap();

        assert!(blocks.aff.row_entries(0).all(|(j, v)| v == if j == 0 { 1.0 } else { 0.0 }));
        assert!(blocks.afc.row_entries(0).all(|(_, v)| v == 0.0));
        assert_eq!(rhs_f[0], 3.0);
        assert_eq!(blocks.acf.get(0, 0), 0.0);
        // acf(0,0) was -2: b_0 -= -2 * 3
        assert_eq!(rhs_c[0], 6.0);
        assert_eq!(rhs_c[1], 0.0);
    }

    #[test]
    fn test_flux_conditions() {
        let (mesh, mut blocks) = assembled();
        let mut bcs = BoundaryConditions::for_mesh(&mesh);
        bcs.set(2, BoundaryMarker::Neumann, 0.5);
        bcs.set(3, BoundaryMarker::Flux, 0.25);
        bcs.set_mixed(4, 2.0, 1.5);
        let before = blocks.aff.get(4, 4);
        let mut rhs_c = Array1::zeros(2);
        let mut rhs_f = Array1::zeros(11);
        apply_boundary_conditions(
            &mesh,
            &bcs,
            &mut blocks,
            &mut rhs_c.view_mut(),
            &mut rhs_f.view_mut(),
        )
        .unwrap();
        assert_eq!(rhs_f[2], -0.5);
        assert_eq!(rhs_f[3], -0.25);
        assert_eq!(blocks.aff.get(4, 4), before + 2.0);
        assert_eq!(rhs_f[4], 3.0);
    }

    #[test]
    fn test_set_region() {
        let (mesh, _) = assembled();
        let mut bcs = BoundaryConditions::for_mesh(&mesh);
        bcs.set_region(&mesh, "bottom side", BoundaryMarker::Dirichlet, |p| p.x)
            .unwrap();
        assert_eq!(bcs.count(BoundaryMarker::Dirichlet), 2);
        assert_eq!(bcs.values[8], 1.5);
        assert!(bcs.set_region(&mesh, "nowhere", BoundaryMarker::Flux, |_| 0.0).is_err());
    }

    #[test]
    fn test_size_mismatch() {
        let (mesh, mut blocks) = assembled();
        let bcs = BoundaryConditions::new(3);
        let mut rhs_c = Array1::zeros(2);
        let mut rhs_f = Array1::zeros(11);
        assert!(
            apply_boundary_conditions(
                &mesh,
                &bcs,
                &mut blocks,
                &mut rhs_c.view_mut(),
                &mut rhs_f.view_mut()
            )
            .is_err()
        );
    }
}
