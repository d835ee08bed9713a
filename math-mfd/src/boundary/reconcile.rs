//! Agreement of boundary markers across face copies

use super::{BoundaryConditions, BoundaryMarker};
use crate::error::{MfdError, Result};
use crate::mesh::Mesh;
use std::collections::HashMap;

/// Entries per marked face in the index buffer: global id, flag, owned
const INDEX_STRIDE: usize = 3;
/// Entries per marked face in the value buffer: value, mixed coefficient
const VALUE_STRIDE: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    marker: BoundaryMarker,
    from_owner: bool,
    rank: usize,
    value: f64,
    coefficient: f64,
}

impl Candidate {
    /// Higher marker wins, then the owning copy, then the lowest rank
    fn beats(&self, other: &Candidate) -> bool {
        (self.marker, self.from_owner, std::cmp::Reverse(self.rank))
            > (other.marker, other.from_owner, std::cmp::Reverse(other.rank))
    }
}

/// Make every copy of a face carry the same marker and value; collective
///
/// Phase one publishes every marked local face copy (global id, marker,
/// value) to the ranks. Phase two recomputes each local face from the copies
/// received: the strongest marker wins, ties go to the owning rank, then to
/// the lowest rank. A face no rank marks stays unmarked.
pub fn reconcile_ghost_markers(bcs: &mut BoundaryConditions, mesh: &Mesh) -> Result<()> {
    if bcs.len() != mesh.num_faces() {
        return Err(MfdError::DimensionMismatch {
            what: "boundary conditions",
            expected: mesh.num_faces(),
            actual: bcs.len(),
        });
    }
    let comm = mesh.comm();
    let face_map = mesh.face_map();

    // Phase 1: pack and exchange
    let mut send_indices = Vec::new();
    let mut send_values = Vec::new();
    for (f, &marker) in bcs.markers.iter().enumerate() {
        if marker == BoundaryMarker::None {
            continue;
        }
        send_indices.extend_from_slice(&[
            face_map.global_ids[f],
            marker.flag(),
            usize::from(face_map.is_owned(f)),
        ]);
        send_values.extend_from_slice(&[bcs.values[f], bcs.mixed_coefficients[f]]);
    }
    let all_indices = comm.all_gather_indices(&send_indices);
    let all_values = comm.all_gather(&send_values);

    // Phase 2: vote per local face
    let local_of: HashMap<usize, usize> = face_map
        .global_ids
        .iter()
        .enumerate()
        .map(|(l, &g)| (g, l))
        .collect();
    let mut winners: HashMap<usize, Candidate> = HashMap::new();
    for (rank, (indices, values)) in all_indices.iter().zip(&all_values).enumerate() {
        for (idx, val) in indices
            .chunks_exact(INDEX_STRIDE)
            .zip(values.chunks_exact(VALUE_STRIDE))
        {
            let Some(&local) = local_of.get(&idx[0]) else {
                continue;
            };
            let marker = BoundaryMarker::from_flag(idx[1]).ok_or_else(|| {
                MfdError::config(format!("corrupt boundary flag {} from rank {}", idx[1], rank))
            })?;
            let candidate = Candidate {
                marker,
                from_owner: idx[2] == 1,
                rank,
                value: val[0],
                coefficient: val[1],
            };
            match winners.get(&local) {
                Some(current) if !candidate.beats(current) => {}
                _ => {
                    winners.insert(local, candidate);
                }
            }
        }
    }

    let mut changed = 0;
    for (local, winner) in winners {
        if bcs.markers[local] != winner.marker || bcs.values[local] != winner.value {
            changed += 1;
        }
        bcs.markers[local] = winner.marker;
        bcs.values[local] = winner.value;
        bcs.mixed_coefficients[local] = winner.coefficient;
    }
    log::debug!(
        "rank {}: boundary reconciliation updated {} face copies",
        comm.rank(),
        changed
    );
    Ok(())
}
