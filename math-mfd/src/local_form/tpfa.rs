//! Two-point flux approximation

use super::Tensor;
use crate::error::{MfdError, Result};
use crate::mesh::{Mesh, is_positive};
use ndarray::Array2;

/// Diagonal inverse mass matrix `W_ii = area_i nᵢᵀ K nᵢ / h_i`
///
/// `h_i` is the distance from the cell centroid to the plane of face `i`.
pub(super) fn inverse_mass(mesh: &Mesh, c: usize, k: &Tensor) -> Result<Array2<f64>> {
    let cell = mesh.cell(c);
    let nf = cell.faces.len();
    let mut w = Array2::zeros((nf, nf));

    for (i, &f) in cell.faces.iter().enumerate() {
        let face = mesh.face(f);
        let h = (face.centroid - cell.centroid).dot(&face.normal).abs();
        if !is_positive(h) {
            return Err(MfdError::DegenerateGeometry {
                entity: "cell-to-face distance",
                index: c,
                measure: h,
            });
        }
        w[[i, i]] = face.area * k.bilinear(&face.normal, &face.normal) / h;
    }
    Ok(w)
}
