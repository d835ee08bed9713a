//! Rank-local views of a global mesh

use super::types::{Cell, EntityMap, Face, Mesh};
use crate::comm::Communicator;
use crate::error::{MfdError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Assign cells to `num_parts` slabs of roughly equal size along the x axis
pub fn slab_partition(mesh: &Mesh, num_parts: usize) -> Vec<usize> {
    let n = mesh.num_cells();
    let num_parts = num_parts.max(1);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        mesh.cell(a)
            .centroid
            .x
            .total_cmp(&mesh.cell(b).centroid.x)
            .then(a.cmp(&b))
    });

    let mut owners = vec![0; n];
    for (pos, &c) in order.iter().enumerate() {
        owners[c] = pos * num_parts / n.max(1);
    }
    owners
}

/// Build the calling rank's part of `global`; collective
///
/// `global` must be a serial mesh (local ids are global ids) and
/// `cell_owners[c]` names the rank owning cell `c`. The local mesh holds
/// the owned cells, one layer of ghost cells sharing a face with them, and
/// every face of those cells. A face is owned by the lowest rank among the
/// owners of its cells. Owned entities are numbered first, in global order.
pub fn partition_mesh(
    global: &Mesh,
    cell_owners: &[usize],
    comm: Arc<dyn Communicator>,
) -> Result<Mesh> {
    if cell_owners.len() != global.num_cells() {
        return Err(MfdError::DimensionMismatch {
            what: "cell owners",
            expected: global.num_cells(),
            actual: cell_owners.len(),
        });
    }
    if let Some(&bad) = cell_owners.iter().find(|&&r| r >= comm.size()) {
        return Err(MfdError::config(format!(
            "cell owner {} exceeds communicator size {}",
            bad,
            comm.size()
        )));
    }
    let rank = comm.rank();

    let owned_cells: Vec<usize> = (0..global.num_cells())
        .filter(|&c| cell_owners[c] == rank)
        .collect();
    let mut ghost_cells = BTreeSet::new();
    for &c in &owned_cells {
        for &f in &global.cell(c).faces {
            for &nb in &global.face(f).cells {
                if cell_owners[nb] != rank {
                    ghost_cells.insert(nb);
                }
            }
        }
    }
    let cell_gids: Vec<usize> = owned_cells.iter().copied().chain(ghost_cells).collect();
    let cell_g2l: HashMap<usize, usize> = cell_gids
        .iter()
        .enumerate()
        .map(|(l, &g)| (g, l))
        .collect();

    let face_owner = |f: usize| {
        global
            .face(f)
            .cells
            .iter()
            .map(|&c| cell_owners[c])
            .min()
            .unwrap_or(0)
    };
    let all_faces: BTreeSet<usize> = cell_gids
        .iter()
        .flat_map(|&c| global.cell(c).faces.iter().copied())
        .collect();
    let (owned_faces, ghost_faces): (Vec<usize>, Vec<usize>) =
        all_faces.into_iter().partition(|&f| face_owner(f) == rank);
    let num_owned_faces = owned_faces.len();
    let face_gids: Vec<usize> = owned_faces.into_iter().chain(ghost_faces).collect();
    let face_g2l: HashMap<usize, usize> = face_gids
        .iter()
        .enumerate()
        .map(|(l, &g)| (g, l))
        .collect();

    let cells: Vec<Cell> = cell_gids
        .iter()
        .map(|&g| {
            let cell = global.cell(g);
            Cell {
                faces: cell.faces.iter().map(|f| face_g2l[f]).collect(),
                face_dirs: cell.face_dirs.clone(),
                centroid: cell.centroid,
                volume: cell.volume,
            }
        })
        .collect();
    let faces: Vec<Face> = face_gids
        .iter()
        .map(|&g| {
            let face = global.face(g);
            Face {
                cells: face
                    .cells
                    .iter()
                    .filter_map(|c| cell_g2l.get(c).copied())
                    .collect(),
                centroid: face.centroid,
                area: face.area,
                normal: face.normal,
                on_boundary: face.on_boundary,
            }
        })
        .collect();

    let regions: BTreeMap<String, Vec<usize>> = global
        .regions()
        .iter()
        .map(|(name, ids)| {
            let mut local: Vec<usize> = ids.iter().filter_map(|f| face_g2l.get(f).copied()).collect();
            local.sort_unstable();
            (name.clone(), local)
        })
        .collect();

    let cell_map = EntityMap::new(
        cell_gids.clone(),
        owned_cells.len(),
        cell_gids.iter().map(|&c| cell_owners[c]).collect(),
    );
    let face_map = EntityMap::new(
        face_gids.clone(),
        num_owned_faces,
        face_gids.iter().map(|&f| face_owner(f)).collect(),
    );

    log::debug!(
        "rank {}: {} owned / {} ghost cells, {} owned / {} ghost faces",
        rank,
        cell_map.num_owned,
        cell_map.len() - cell_map.num_owned,
        face_map.num_owned,
        face_map.len() - face_map.num_owned
    );

    Mesh::new(cells, faces, cell_map, face_map, regions, comm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::run_ranks;
    use crate::mesh::{Point, box_mesh_hexahedra};

    fn global_mesh() -> Mesh {
        box_mesh_hexahedra(
            4,
            2,
            1,
            Point::new(0.0, 0.0, 0.0),
            Point::new(4.0, 2.0, 1.0),
        )
        .unwrap()
    }

    #[test]
    fn test_slab_partition_balanced() {
        let mesh = global_mesh();
        let owners = slab_partition(&mesh, 2);
        assert_eq!(owners.iter().filter(|&&r| r == 0).count(), 4);
        for (c, &r) in owners.iter().enumerate() {
            let expected = if mesh.cell(c).centroid.x < 2.0 { 0 } else { 1 };
            assert_eq!(r, expected);
        }
    }

    #[test]
    fn test_partition_counts() {
        let global = global_mesh();
        let owners = slab_partition(&global, 2);
        let parts = run_ranks(2, |comm| {
            let local = partition_mesh(&global, &owners, Arc::new(comm)).unwrap();
            (
                local.num_owned_cells(),
                local.num_cells(),
                local.num_owned_faces(),
                local.num_faces(),
                local.face_importer().num_ghosts(),
            )
        });
        // Rank 0 owns the shared x = 2 faces.
        assert_eq!(parts[0], (4, 6, 20, 29, 9));
        assert_eq!(parts[1].0, 4);
        assert_eq!(parts[1].1, 6);
        assert_eq!(parts[1].2, 18);
        let total_owned: usize = parts.iter().map(|p| p.2).sum();
        assert_eq!(total_owned, global.num_faces());
    }

    #[test]
    fn test_partition_preserves_geometry() {
        let global = global_mesh();
        let owners = slab_partition(&global, 2);
        run_ranks(2, |comm| {
            let local = partition_mesh(&global, &owners, Arc::new(comm)).unwrap();
            for (l, cell) in local.cells().iter().enumerate() {
                let g = local.cell_map().global_ids[l];
                assert_eq!(cell.centroid, global.cell(g).centroid);
                for (lf, gf) in cell.faces.iter().zip(&global.cell(g).faces) {
                    assert_eq!(local.face_map().global_ids[*lf], *gf);
                }
            }
            let boundary_local = local.region("boundary").unwrap();
            assert!(boundary_local.iter().all(|&f| local.face(f).on_boundary));
        });
    }

    #[test]
    fn test_partition_rejects_bad_owner() {
        let global = global_mesh();
        let owners = vec![3; global.num_cells()];
        let comm: Arc<dyn Communicator> = Arc::new(crate::comm::SerialComm);
        assert!(partition_mesh(&global, &owners, comm).is_err());
    }
}
