//! Per-cell local forms
//!
//! For a cell with faces `f_1..f_nf`, the local inverse mass matrix `W`
//! maps the pressure drops `p_c - λ_i` to outward face fluxes `q_i`.
//! Consistency for linear pressures is `W R = N K`, where `N` holds rows
//! `area_i n_iᵀ` (outward normals) and `R` rows `(x_fi - x_c)ᵀ`.
//!
//! - [`MfdMethod::TwoPointFlux`]: diagonal `W`, exact on orthogonal meshes
//! - [`MfdMethod::Polyhedra`]: `W = N K Nᵀ / |c| + γ (I - Q Qᵀ)` with `Q` an
//!   orthonormal basis of range(`R`), exact on any polyhedron

mod mimetic;
mod tpfa;

use crate::config::MfdMethod;
use crate::error::{MfdError, Result};
use crate::mesh::{Mesh, Point, is_positive};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Cell permeability tensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Tensor {
    Scalar(f64),
    Diagonal([f64; 3]),
    /// Symmetric full tensor, row major
    Full([[f64; 3]; 3]),
}

impl Default for Tensor {
    fn default() -> Self {
        Tensor::Scalar(1.0)
    }
}

impl Tensor {
    /// K v
    pub fn apply(&self, v: &Point) -> Point {
        match self {
            Tensor::Scalar(k) => *v * *k,
            Tensor::Diagonal(d) => Point::new(d[0] * v.x, d[1] * v.y, d[2] * v.z),
            Tensor::Full(m) => {
                let r = m.map(|row| Point::new(row[0], row[1], row[2]));
                Point::new(r[0].dot(v), r[1].dot(v), r[2].dot(v))
            }
        }
    }

    /// uᵀ K v
    pub fn bilinear(&self, u: &Point, v: &Point) -> f64 {
        u.dot(&self.apply(v))
    }
}

/// Local inverse mass matrix of one cell
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCellForm {
    /// Symmetric nf × nf matrix, rows in the cell's face order
    pub inverse_mass: Array2<f64>,
}

/// kr-weighted stiffness pieces of one cell
///
/// With local unknowns `(λ_1..λ_nf, p_c)` the cell contributes
/// `[aff afc; acf acc]` to the mixed-hybrid system.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalStiffness {
    pub aff: Array2<f64>,
    pub afc: Array1<f64>,
    pub acf: Array1<f64>,
    pub acc: f64,
}

impl LocalCellForm {
    /// Stiffness pieces with row `m` of `W` multiplied by `row_weights[m]`
    ///
    /// Face-located kr gives one weight per face; cell-located kr repeats the
    /// cell value; no kr means all ones.
    pub fn stiffness(&self, row_weights: &[f64]) -> LocalStiffness {
        let nf = self.inverse_mass.nrows();
        let mut aff = self.inverse_mass.clone();
        for (m, mut row) in aff.rows_mut().into_iter().enumerate() {
            row *= row_weights[m];
        }

        let afc = Array1::from_iter((0..nf).map(|m| -aff.row(m).sum()));
        let acf = Array1::from_iter((0..nf).map(|n| -aff.column(n).sum()));
        let acc = aff.sum();
        LocalStiffness { aff, afc, acf, acc }
    }

    /// Outward fluxes `q = W (p_c - λ)`, weighted like [`stiffness`](Self::stiffness)
    pub fn outward_fluxes(&self, row_weights: &[f64], p_cell: f64, p_faces: &[f64]) -> Array1<f64> {
        let drops = Array1::from_iter(p_faces.iter().map(|&l| p_cell - l));
        let mut q = self.inverse_mass.dot(&drops);
        for (qm, w) in q.iter_mut().zip(row_weights) {
            *qm *= w;
        }
        q
    }
}

/// Builds local forms with the configured method
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFormBuilder {
    method: MfdMethod,
}

impl LocalFormBuilder {
    pub fn new(method: MfdMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> MfdMethod {
        self.method
    }

    /// Local form of cell `c`
    pub fn build(&self, mesh: &Mesh, c: usize, permeability: &Tensor) -> Result<LocalCellForm> {
        let cell = mesh.cell(c);
        if !is_positive(cell.volume) {
            return Err(MfdError::DegenerateGeometry {
                entity: "cell",
                index: c,
                measure: cell.volume,
            });
        }
        for &f in &cell.faces {
            let area = mesh.face(f).area;
            if !is_positive(area) {
                return Err(MfdError::DegenerateGeometry {
                    entity: "face",
                    index: f,
                    measure: area,
                });
            }
        }

        let inverse_mass = match self.method {
            MfdMethod::TwoPointFlux => tpfa::inverse_mass(mesh, c, permeability)?,
            MfdMethod::Polyhedra => mimetic::inverse_mass(mesh, c, permeability),
        };
        Ok(LocalCellForm { inverse_mass })
    }
}

/// Outward area vectors `area_i n_i` of a cell (rows of `N`)
fn outward_area_vectors(mesh: &Mesh, c: usize) -> Vec<Point> {
    let cell = mesh.cell(c);
    cell.faces
        .iter()
        .zip(&cell.face_dirs)
        .map(|(&f, &dir)| {
            let face = mesh.face(f);
            face.normal * (face.area * dir as f64)
        })
        .collect()
}
