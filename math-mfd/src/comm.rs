//! Inter-process communication
//!
//! Every rank runs its own engine instance and the ranks advance through the
//! same collective calls in the same order. A [`Communicator`] provides the
//! few collectives the engine needs; [`GhostImporter`] builds the owner to
//! ghost copy on top of them.
//!
//! [`SerialComm`] is the single-process communicator. [`ThreadComm`] runs
//! ranks as threads of one process, exchanging data through shared slots
//! guarded by a barrier.

use crate::mesh::EntityMap;
use ndarray::{Array1, Array2, s};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Barrier, Mutex, PoisonError};

/// Collective operations shared by all ranks of a run
pub trait Communicator: Send + Sync + Debug {
    /// Rank of the calling process
    fn rank(&self) -> usize;

    /// Number of processes
    fn size(&self) -> usize;

    /// Gather a slice from every rank; entry `r` of the result holds rank `r`'s data
    fn all_gather(&self, send: &[f64]) -> Vec<Vec<f64>>;

    /// Index variant of [`all_gather`](Self::all_gather)
    fn all_gather_indices(&self, send: &[usize]) -> Vec<Vec<usize>>;

    /// Global sum
    fn sum_all(&self, value: f64) -> f64 {
        self.all_gather(&[value]).iter().map(|v| v[0]).sum()
    }

    /// Global maximum
    fn max_all(&self, value: f64) -> f64 {
        self.all_gather(&[value])
            .iter()
            .map(|v| v[0])
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Global sum of a count
    fn sum_all_indices(&self, value: usize) -> usize {
        self.all_gather_indices(&[value]).iter().map(|v| v[0]).sum()
    }
}

/// Communicator of a single-process run
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather(&self, send: &[f64]) -> Vec<Vec<f64>> {
        vec![send.to_vec()]
    }

    fn all_gather_indices(&self, send: &[usize]) -> Vec<Vec<usize>> {
        vec![send.to_vec()]
    }

    fn sum_all(&self, value: f64) -> f64 {
        value
    }

    fn max_all(&self, value: f64) -> f64 {
        value
    }
}

#[derive(Debug)]
struct SharedSlots {
    barrier: Barrier,
    values: Mutex<Vec<Vec<f64>>>,
    indices: Mutex<Vec<Vec<usize>>>,
}

/// In-process communicator: one instance per rank, each driven by its own thread
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<SharedSlots>,
}

impl ThreadComm {
    /// Create the communicators of a group of `size` ranks
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(SharedSlots {
            barrier: Barrier::new(size),
            values: Mutex::new(vec![Vec::new(); size]),
            indices: Mutex::new(vec![Vec::new(); size]),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    fn exchange<T: Clone>(&self, slots: &Mutex<Vec<Vec<T>>>, send: &[T]) -> Vec<Vec<T>> {
        // Barrier before publishing: the previous collective must be fully read.
        self.shared.barrier.wait();
        slots.lock().unwrap_or_else(PoisonError::into_inner)[self.rank] = send.to_vec();
        self.shared.barrier.wait();
        slots.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather(&self, send: &[f64]) -> Vec<Vec<f64>> {
        self.exchange(&self.shared.values, send)
    }

    fn all_gather_indices(&self, send: &[usize]) -> Vec<Vec<usize>> {
        self.exchange(&self.shared.indices, send)
    }
}

/// Run `f` once per rank of a fresh [`ThreadComm`] group and collect the results by rank
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(ThreadComm) -> T + Sync,
{
    let comms = ThreadComm::group(size);
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                scope.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(value) => value,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    })
}

/// Owner-to-ghost copy plan for one entity kind
///
/// Built collectively from an [`EntityMap`]: each ghost entity is resolved to
/// the rank that owns it and its position among that rank's owned entities.
#[derive(Debug, Clone, Default)]
pub struct GhostImporter {
    num_owned: usize,
    /// (owner rank, owner-local index) per ghost, in ghost order
    sources: Vec<(usize, usize)>,
}

impl GhostImporter {
    /// Resolve the ghosts of `map`; collective
    pub fn new(map: &EntityMap, comm: &dyn Communicator) -> Self {
        let owned_gids = comm.all_gather_indices(&map.global_ids[..map.num_owned]);
        let ghost_gids = &map.global_ids[map.num_owned..];

        let wanted: HashMap<usize, usize> = ghost_gids
            .iter()
            .enumerate()
            .map(|(i, &gid)| (gid, i))
            .collect();
        let mut sources = vec![(usize::MAX, usize::MAX); ghost_gids.len()];
        for (rank, gids) in owned_gids.iter().enumerate() {
            for (index, gid) in gids.iter().enumerate() {
                if let Some(&g) = wanted.get(gid) {
                    sources[g] = (rank, index);
                }
            }
        }
        if let Some(g) = sources.iter().position(|s| s.0 == usize::MAX) {
            log::error!(
                "rank {}: ghost entity with global id {} has no owner",
                comm.rank(),
                ghost_gids[g]
            );
        }

        Self {
            num_owned: map.num_owned,
            sources,
        }
    }

    /// Number of ghost entities served
    pub fn num_ghosts(&self) -> usize {
        self.sources.len()
    }

    /// Single-dof variant of [`scatter`](Self::scatter); collective
    pub fn scatter_vector(&self, comm: &dyn Communicator, data: &mut Array1<f64>) {
        if comm.size() == 1 {
            return;
        }
        let send = data.slice(s![..self.num_owned]).to_vec();
        let received = comm.all_gather(&send);
        for (g, &(rank, index)) in self.sources.iter().enumerate() {
            if rank != usize::MAX {
                data[self.num_owned + g] = received[rank][index];
            }
        }
    }

    /// Overwrite ghost rows of `data` with the owners' rows; collective
    ///
    /// `data` holds owned rows first, then ghost rows, one column per dof.
    pub fn scatter(&self, comm: &dyn Communicator, data: &mut Array2<f64>) {
        if comm.size() == 1 {
            return;
        }
        let ndofs = data.ncols();
        let send: Vec<f64> = data
            .rows()
            .into_iter()
            .take(self.num_owned)
            .flat_map(|row| row.to_vec())
            .collect();
        let received = comm.all_gather(&send);

        for (g, &(rank, index)) in self.sources.iter().enumerate() {
            if rank == usize::MAX {
                continue;
            }
            let src = &received[rank][index * ndofs..(index + 1) * ndofs];
            for (k, &v) in src.iter().enumerate() {
                data[[self.num_owned + g, k]] = v;
            }
        }
    }
}
