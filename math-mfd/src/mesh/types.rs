//! Mesh data structures

use crate::comm::{Communicator, GhostImporter, SerialComm};
use crate::error::{MfdError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;

/// A point (or vector) in 3D space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Point) -> Point {
        Point::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (*self - *other).norm()
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// A polyhedral cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// Local face ids
    pub faces: Vec<usize>,
    /// +1 where the face normal points out of this cell, -1 otherwise
    pub face_dirs: Vec<i32>,
    pub centroid: Point,
    pub volume: f64,
}

/// A planar face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    /// Local ids of the adjacent cells present on this process
    pub cells: Vec<usize>,
    pub centroid: Point,
    pub area: f64,
    /// Unit normal with a fixed orientation
    pub normal: Point,
    /// Whether the face lies on the boundary of the global domain
    pub on_boundary: bool,
}

/// Local to global numbering of one entity kind
///
/// Owned entities come first, ghosts after.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityMap {
    pub global_ids: Vec<usize>,
    pub num_owned: usize,
    /// Owning rank of every local entity
    pub owners: Vec<usize>,
}

impl EntityMap {
    pub fn new(global_ids: Vec<usize>, num_owned: usize, owners: Vec<usize>) -> Self {
        Self {
            global_ids,
            num_owned,
            owners,
        }
    }

    /// Map of a serial run: everything owned by rank 0, local id = global id
    pub fn serial(n: usize) -> Self {
        Self::new((0..n).collect(), n, vec![0; n])
    }

    /// Number of local entities (owned + ghost)
    pub fn len(&self) -> usize {
        self.global_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global_ids.is_empty()
    }

    pub fn is_owned(&self, local: usize) -> bool {
        local < self.num_owned
    }
}

/// A rank-local polyhedral mesh
///
/// Immutable once built; share it through `Arc<Mesh>`.
#[derive(Debug)]
pub struct Mesh {
    cells: Vec<Cell>,
    faces: Vec<Face>,
    cell_map: EntityMap,
    face_map: EntityMap,
    regions: BTreeMap<String, Vec<usize>>,
    comm: Arc<dyn Communicator>,
    cell_importer: GhostImporter,
    face_importer: GhostImporter,
}

impl Mesh {
    /// Assemble a rank-local mesh; collective (ghost importers are resolved here)
    pub fn new(
        cells: Vec<Cell>,
        faces: Vec<Face>,
        cell_map: EntityMap,
        face_map: EntityMap,
        regions: BTreeMap<String, Vec<usize>>,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self> {
        if cell_map.len() != cells.len() {
            return Err(MfdError::DimensionMismatch {
                what: "cell map",
                expected: cells.len(),
                actual: cell_map.len(),
            });
        }
        if face_map.len() != faces.len() {
            return Err(MfdError::DimensionMismatch {
                what: "face map",
                expected: faces.len(),
                actual: face_map.len(),
            });
        }
        let cell_importer = GhostImporter::new(&cell_map, comm.as_ref());
        let face_importer = GhostImporter::new(&face_map, comm.as_ref());
        Ok(Self {
            cells,
            faces,
            cell_map,
            face_map,
            regions,
            comm,
            cell_importer,
            face_importer,
        })
    }

    /// Single-process mesh where every entity is owned
    pub fn serial(
        cells: Vec<Cell>,
        faces: Vec<Face>,
        regions: BTreeMap<String, Vec<usize>>,
    ) -> Result<Self> {
        let cell_map = EntityMap::serial(cells.len());
        let face_map = EntityMap::serial(faces.len());
        Self::new(cells, faces, cell_map, face_map, regions, Arc::new(SerialComm))
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn cell(&self, c: usize) -> &Cell {
        &self.cells[c]
    }

    pub fn face(&self, f: usize) -> &Face {
        &self.faces[f]
    }

    /// Owned + ghost cells
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn num_owned_cells(&self) -> usize {
        self.cell_map.num_owned
    }

    /// Owned + ghost faces
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_owned_faces(&self) -> usize {
        self.face_map.num_owned
    }

    pub fn cell_map(&self) -> &EntityMap {
        &self.cell_map
    }

    pub fn face_map(&self) -> &EntityMap {
        &self.face_map
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Shared handle to the communicator
    pub fn comm_handle(&self) -> Arc<dyn Communicator> {
        Arc::clone(&self.comm)
    }

    pub fn cell_importer(&self) -> &GhostImporter {
        &self.cell_importer
    }

    pub fn face_importer(&self) -> &GhostImporter {
        &self.face_importer
    }

    /// Local faces of a named region, if it exists
    pub fn region(&self, name: &str) -> Option<&[usize]> {
        self.regions.get(name).map(Vec::as_slice)
    }

    pub fn regions(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.regions
    }

    /// Local faces on the global domain boundary
    pub fn boundary_faces(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.on_boundary)
            .map(|(i, _)| i)
    }

    /// Check that every cell volume and face area is positive
    pub fn validate(&self) -> Result<()> {
        for (c, cell) in self.cells.iter().enumerate() {
            if !is_positive(cell.volume) {
                return Err(MfdError::DegenerateGeometry {
                    entity: "cell",
                    index: c,
                    measure: cell.volume,
                });
            }
        }
        for (f, face) in self.faces.iter().enumerate() {
            if !is_positive(face.area) {
                return Err(MfdError::DegenerateGeometry {
                    entity: "face",
                    index: f,
                    measure: face.area,
                });
            }
        }
        Ok(())
    }
}

/// Strictly positive and finite
pub(crate) fn is_positive(value: f64) -> bool {
    value > 0.0 && value.is_finite()
}
