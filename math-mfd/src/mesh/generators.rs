//! Structured mesh generators

use super::types::{Cell, Face, Mesh, Point};
use crate::error::{MfdError, Result};
use std::collections::BTreeMap;

/// Raw geometry of a serial mesh before numbering maps are attached
struct Geometry {
    cells: Vec<Cell>,
    faces: Vec<Face>,
    regions: BTreeMap<String, Vec<usize>>,
}

/// Generate a box mesh with `nx × ny × nz` hexahedral cells
///
/// Faces are numbered x-normal first, then y-normal, then z-normal; every
/// face normal points along the positive axis. Each cell lists its faces as
/// `[x-, x+, y-, y+, z-, z+]`. Regions `"left side"`/`"right side"` (x),
/// `"front side"`/`"back side"` (y), `"bottom side"`/`"top side"` (z) and
/// `"boundary"` are defined.
pub fn box_mesh_hexahedra(nx: usize, ny: usize, nz: usize, lo: Point, hi: Point) -> Result<Mesh> {
    let geometry = box_geometry(nx, ny, nz, lo, hi)?;
    Mesh::serial(geometry.cells, geometry.faces, geometry.regions)
}

/// Box mesh mapped through the linear map `x ↦ A x`
///
/// Cells become parallelepipeds, which exercises the general polyhedral
/// forms where two-point fluxes are inconsistent.
pub fn affine_box_mesh(
    nx: usize,
    ny: usize,
    nz: usize,
    lo: Point,
    hi: Point,
    matrix: [[f64; 3]; 3],
) -> Result<Mesh> {
    let mut geometry = box_geometry(nx, ny, nz, lo, hi)?;

    let rows = matrix.map(|r| Point::new(r[0], r[1], r[2]));
    let det = rows[0].dot(&rows[1].cross(&rows[2]));
    if det == 0.0 || !det.is_finite() {
        return Err(MfdError::config("affine map must be invertible"));
    }
    let map = |p: Point| Point::new(rows[0].dot(&p), rows[1].dot(&p), rows[2].dot(&p));
    // Area vectors transform with |det A| A^{-T} = sign(det) cof(A).
    let cofactor = [
        rows[1].cross(&rows[2]),
        rows[2].cross(&rows[0]),
        rows[0].cross(&rows[1]),
    ];
    let map_area = |a: Point| {
        Point::new(cofactor[0].dot(&a), cofactor[1].dot(&a), cofactor[2].dot(&a)) * det.signum()
    };

    for cell in &mut geometry.cells {
        cell.centroid = map(cell.centroid);
        cell.volume *= det.abs();
    }
    for face in &mut geometry.faces {
        face.centroid = map(face.centroid);
        let area_vector = map_area(face.normal * face.area);
        face.area = area_vector.norm();
        face.normal = area_vector * (1.0 / face.area);
    }

    Mesh::serial(geometry.cells, geometry.faces, geometry.regions)
}

fn box_geometry(nx: usize, ny: usize, nz: usize, lo: Point, hi: Point) -> Result<Geometry> {
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(MfdError::config("box mesh needs at least one cell per direction"));
    }
    let extent = hi - lo;
    if !(extent.x > 0.0 && extent.y > 0.0 && extent.z > 0.0) {
        return Err(MfdError::DegenerateGeometry {
            entity: "box",
            index: 0,
            measure: extent.x * extent.y * extent.z,
        });
    }

    let dx = extent.x / nx as f64;
    let dy = extent.y / ny as f64;
    let dz = extent.z / nz as f64;

    let cell_idx = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);
    let num_xfaces = (nx + 1) * ny * nz;
    let num_yfaces = nx * (ny + 1) * nz;
    let xface = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + ny * k);
    let yface = |i: usize, j: usize, k: usize| num_xfaces + i + nx * (j + (ny + 1) * k);
    let zface = |i: usize, j: usize, k: usize| num_xfaces + num_yfaces + i + nx * (j + ny * k);

    let mut faces = Vec::with_capacity(num_xfaces + num_yfaces + nx * ny * (nz + 1));
    let mut regions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    // x-normal faces
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..=nx {
                let mut cells = Vec::with_capacity(2);
                if i > 0 {
                    cells.push(cell_idx(i - 1, j, k));
                }
                if i < nx {
                    cells.push(cell_idx(i, j, k));
                }
                let region = match i {
                    0 => Some("left side"),
                    _ if i == nx => Some("right side"),
                    _ => None,
                };
                let centroid = Point::new(
                    lo.x + i as f64 * dx,
                    lo.y + (j as f64 + 0.5) * dy,
                    lo.z + (k as f64 + 0.5) * dz,
                );
                push_face(
                    &mut faces,
                    &mut regions,
                    cells,
                    centroid,
                    dy * dz,
                    Point::new(1.0, 0.0, 0.0),
                    region,
                );
            }
        }
    }

    // y-normal faces
    for k in 0..nz {
        for j in 0..=ny {
            for i in 0..nx {
                let mut cells = Vec::with_capacity(2);
                if j > 0 {
                    cells.push(cell_idx(i, j - 1, k));
                }
                if j < ny {
                    cells.push(cell_idx(i, j, k));
                }
                let region = match j {
                    0 => Some("front side"),
                    _ if j == ny => Some("back side"),
                    _ => None,
                };
                let centroid = Point::new(
                    lo.x + (i as f64 + 0.5) * dx,
                    lo.y + j as f64 * dy,
                    lo.z + (k as f64 + 0.5) * dz,
                );
                push_face(
                    &mut faces,
                    &mut regions,
                    cells,
                    centroid,
                    dx * dz,
                    Point::new(0.0, 1.0, 0.0),
                    region,
                );
            }
        }
    }

    // z-normal faces
    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..nx {
                let mut cells = Vec::with_capacity(2);
                if k > 0 {
                    cells.push(cell_idx(i, j, k - 1));
                }
                if k < nz {
                    cells.push(cell_idx(i, j, k));
                }
                let region = match k {
                    0 => Some("bottom side"),
                    _ if k == nz => Some("top side"),
                    _ => None,
                };
                let centroid = Point::new(
                    lo.x + (i as f64 + 0.5) * dx,
                    lo.y + (j as f64 + 0.5) * dy,
                    lo.z + k as f64 * dz,
                );
                push_face(
                    &mut faces,
                    &mut regions,
                    cells,
                    centroid,
                    dx * dy,
                    Point::new(0.0, 0.0, 1.0),
                    region,
                );
            }
        }
    }

    let mut cells = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                cells.push(Cell {
                    faces: vec![
                        xface(i, j, k),
                        xface(i + 1, j, k),
                        yface(i, j, k),
                        yface(i, j + 1, k),
                        zface(i, j, k),
                        zface(i, j, k + 1),
                    ],
                    face_dirs: vec![-1, 1, -1, 1, -1, 1],
                    centroid: Point::new(
                        lo.x + (i as f64 + 0.5) * dx,
                        lo.y + (j as f64 + 0.5) * dy,
                        lo.z + (k as f64 + 0.5) * dz,
                    ),
                    volume: dx * dy * dz,
                });
            }
        }
    }

    Ok(Geometry {
        cells,
        faces,
        regions,
    })
}

fn push_face(
    faces: &mut Vec<Face>,
    regions: &mut BTreeMap<String, Vec<usize>>,
    cells: Vec<usize>,
    centroid: Point,
    area: f64,
    normal: Point,
    region: Option<&str>,
) {
    let id = faces.len();
    if let Some(name) = region {
        regions.entry(name.to_string()).or_default().push(id);
        regions.entry("boundary".to_string()).or_default().push(id);
    }
    faces.push(Face {
        on_boundary: cells.len() == 1,
        cells,
        centroid,
        area,
        normal,
    });
}
