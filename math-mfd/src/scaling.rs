//! Relative permeability weighting and the scaled face constraint
//!
//! A relative permeability `kr` multiplies the local forms before assembly.
//! It lives on faces (one value per face, weighting the rows of each cell's
//! `W`) or on cells (one value per cell, weighting all of `W`).
//!
//! With the scaled constraint enabled, every owned non-Dirichlet face
//! equation (`aff` row, `afc` row, `b_f`) is divided by `kr_f` once boundary
//! conditions are in place. On those rows the kr-weighted operator then
//! equals `diag(kr)` times the scaled one.

use crate::assembly::GlobalBlocks;
use crate::error::{MfdError, Result};
use crate::field::DistributedField;
use crate::mesh::{Mesh, is_positive};
use ndarray::ArrayViewMut1;

/// Relative permeability as seen by assembly
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RelativeScaling {
    /// No kr: all ones
    #[default]
    Uniform,
    /// One value per local cell (ghosts included)
    Cell(Vec<f64>),
    /// One value per local face (ghosts included)
    Face(Vec<f64>),
}

impl RelativeScaling {
    /// Read kr from a field's `"face"` component, else its `"cell"` component
    ///
    /// Ghost entries are taken as they are.
    pub fn from_field(mesh: &Mesh, kr: Option<&DistributedField>) -> Result<Self> {
        let Some(field) = kr else {
            return Ok(RelativeScaling::Uniform);
        };
        if field.has_component("face") {
            let values = field.scalar("face")?.to_vec();
            check_len("kr face component", mesh.num_faces(), values.len())?;
            Ok(RelativeScaling::Face(values))
        } else if field.has_component("cell") {
            let values = field.scalar("cell")?.to_vec();
            check_len("kr cell component", mesh.num_cells(), values.len())?;
            Ok(RelativeScaling::Cell(values))
        } else {
            Err(MfdError::MissingComponent("face".to_string()))
        }
    }

    /// Row weights of cell `c`'s local form, in the cell's face order
    pub fn row_weights(&self, mesh: &Mesh, c: usize) -> Vec<f64> {
        let faces = &mesh.cell(c).faces;
        match self {
            RelativeScaling::Uniform => vec![1.0; faces.len()],
            RelativeScaling::Cell(kr) => vec![kr[c]; faces.len()],
            RelativeScaling::Face(kr) => faces.iter().map(|&f| kr[f]).collect(),
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, RelativeScaling::Uniform)
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(MfdError::DimensionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Divide owned non-Dirichlet face equations by their face kr
///
/// `rhs_face` holds the face right-hand side (owned rows first) and
/// `dirichlet[f]` marks Dirichlet faces. Returns the number of rows scaled;
/// uniform kr leaves the system untouched.
pub fn scale_face_constraints(
    blocks: &mut GlobalBlocks,
    rhs_face: &mut ArrayViewMut1<'_, f64>,
    dirichlet: &[bool],
    kr: &RelativeScaling,
) -> Result<usize> {
    let values = match kr {
        RelativeScaling::Uniform => return Ok(0),
        RelativeScaling::Cell(_) => {
            return Err(MfdError::config(
                "scaled constraint requires kr on faces, got a cell-located kr",
            ));
        }
        RelativeScaling::Face(values) => values,
    };

    let nowned = blocks.num_owned_faces();
    // Validate everything before touching the blocks.
    for f in (0..nowned).filter(|&f| !dirichlet[f]) {
        if !is_positive(values[f]) {
            return Err(MfdError::InvalidScaling {
                face: f,
                value: values[f],
            });
        }
    }

    let mut scaled = 0;
    for f in (0..nowned).filter(|&f| !dirichlet[f]) {
        let factor = 1.0 / values[f];
        blocks.aff.scale_row(f, factor);
        blocks.afc.scale_row(f, factor);
        rhs_face[f] *= factor;
        scaled += 1;
    }
    log::debug!("scaled constraint applied to {} face rows", scaled);
    Ok(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Entity, FieldLayout};
    use crate::mesh::{Point, box_mesh_hexahedra};
    use ndarray::Array1;
    use std::sync::Arc;

    fn mesh() -> Arc<Mesh> {
        Arc::new(
            box_mesh_hexahedra(2, 1, 1, Point::default(), Point::new(2.0, 1.0, 1.0)).unwrap(),
        )
    }

    #[test]
    fn test_from_field_prefers_faces() {
        let mesh = mesh();
        assert!(RelativeScaling::from_field(&mesh, None).unwrap().is_uniform());

        let mut kr = DistributedField::from_layout(mesh.clone(), &FieldLayout::cell_face());
        kr.put_scalar(0.5);
        let scaling = RelativeScaling::from_field(&mesh, Some(&kr)).unwrap();
        assert!(matches!(scaling, RelativeScaling::Face(ref v) if v.len() == 11));
        assert_eq!(scaling.row_weights(&mesh, 1), vec![0.5; 6]);

        let mut kr = DistributedField::from_layout(mesh.clone(), &FieldLayout::scalar("cell", Entity::Cell));
        kr.scalar_mut("cell").unwrap()[1] = 3.0;
        let scaling = RelativeScaling::from_field(&mesh, Some(&kr)).unwrap();
        assert_eq!(scaling.row_weights(&mesh, 1), vec![3.0; 6]);

        let other = DistributedField::from_layout(mesh.clone(), &FieldLayout::scalar("node", Entity::Cell));
        assert!(RelativeScaling::from_field(&mesh, Some(&other)).is_err());
    }

    #[test]
    fn test_scaling_skips_dirichlet_rows() {
        let mesh = mesh();
        let mut blocks = GlobalBlocks::symbolic(&mesh);
        blocks.aff.values.iter_mut().for_each(|v| *v = 1.0);
        blocks.afc.values.iter_mut().for_each(|v| *v = 1.0);
        let mut rhs = Array1::from_elem(11, 1.0);
        let mut dirichlet = vec![false; 11];
        dirichlet[7] = true;
        let kr = RelativeScaling::Face(vec![0.25; 11]);

        let n = scale_face_constraints(&mut blocks, &mut rhs.view_mut(), &dirichlet, &kr).unwrap();
        assert_eq!(n, 10);
        assert_eq!(rhs[0], 4.0);
        assert_eq!(rhs[7], 1.0);
        assert!(blocks.aff.row_entries(7).all(|(_, v)| v == 1.0));
        assert!(blocks.aff.row_entries(1).all(|(_, v)| v == 4.0));
        assert_eq!(blocks.afc.get(1, 0), 4.0);
    }

    #[test]
    fn test_invalid_scaling() {
        let mesh = mesh();
        let mut blocks = GlobalBlocks::symbolic(&mesh);
        let mut rhs = Array1::zeros(11);
        let mut kr = vec![1.0; 11];
        kr[3] = 0.0;
        let err = scale_face_constraints(
            &mut blocks,
            &mut rhs.view_mut(),
            &[false; 11],
            &RelativeScaling::Face(kr.clone()),
        )
        .unwrap_err();
        assert!(matches!(err, MfdError::InvalidScaling { face: 3, .. }));

        // Zero kr on a Dirichlet face is allowed.
        let mut dirichlet = [false; 11];
        dirichlet[3] = true;
        assert!(
            scale_face_constraints(
                &mut blocks,
                &mut rhs.view_mut(),
                &dirichlet,
                &RelativeScaling::Face(kr)
            )
            .is_ok()
        );

        let err = scale_face_constraints(
            &mut blocks,
            &mut rhs.view_mut(),
            &[false; 11],
            &RelativeScaling::Cell(vec![1.0; 2]),
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }
}
