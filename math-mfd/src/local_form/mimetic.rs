//! General mimetic inverse mass matrix for polyhedral cells

use super::{Tensor, outward_area_vectors};
use crate::mesh::Mesh;
use ndarray::Array2;

const RANK_TOLERANCE: f64 = 1e-12;

/// `W = N K Nᵀ / |c| + γ (I - Q Qᵀ)`
///
/// The first term reproduces linear pressures; the second stabilizes the
/// complement of range(`R`) and is scaled like the first (`γ` is the mean
/// diagonal of `N K Nᵀ / |c|`).
pub(super) fn inverse_mass(mesh: &Mesh, c: usize, k: &Tensor) -> Array2<f64> {
    let cell = mesh.cell(c);
    let nf = cell.faces.len();
    let normals = outward_area_vectors(mesh, c);

    let mut w = Array2::zeros((nf, nf));
    for i in 0..nf {
        let kn = k.apply(&normals[i]);
        for j in i..nf {
            let v = normals[j].dot(&kn) / cell.volume;
            w[[i, j]] = v;
            w[[j, i]] = v;
        }
    }
    let gamma = w.diag().sum() / nf as f64;

    let q = orthonormal_range(mesh, c);
    for i in 0..nf {
        for j in 0..nf {
            let qq: f64 = q.iter().map(|col| col[i] * col[j]).sum();
            let identity = if i == j { 1.0 } else { 0.0 };
            w[[i, j]] += gamma * (identity - qq);
        }
    }
    w
}

/// Orthonormal basis of the columns of `R` (rows `x_fi - x_c`), modified Gram-Schmidt
fn orthonormal_range(mesh: &Mesh, c: usize) -> Vec<Vec<f64>> {
    let cell = mesh.cell(c);
    let offsets: Vec<[f64; 3]> = cell
        .faces
        .iter()
        .map(|&f| (mesh.face(f).centroid - cell.centroid).as_array())
        .collect();

    let scale = offsets
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs()));

    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(3);
    for axis in 0..3 {
        let mut v: Vec<f64> = offsets.iter().map(|r| r[axis]).collect();
        for q in &basis {
            let proj: f64 = v.iter().zip(q).map(|(a, b)| a * b).sum();
            for (vi, qi) in v.iter_mut().zip(q) {
                *vi -= proj * qi;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > RANK_TOLERANCE * scale.max(f64::MIN_POSITIVE) {
            v.iter_mut().for_each(|x| *x /= norm);
            basis.push(v);
        }
    }
    basis
}
