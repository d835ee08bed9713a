//! Algebraic Multigrid (AMG) Preconditioner
//!
//! Smoothed-aggregation AMG in the spirit of hypre's BoomerAMG as it is used
//! for face-based elliptic systems:
//!
//! - **Strength of connection**: |a_ij| >= θ sqrt(|a_ii a_jj|)
//! - **Coarsening**: greedy aggregation of strongly connected neighborhoods
//! - **Interpolation**: tentative piecewise-constant prolongator, optionally
//!   smoothed by one damped Jacobi step
//! - **Smoother**: damped Jacobi, V(ν₁, ν₂) cycles
//! - **Coarsest level**: dense LU, Jacobi sweeps if the coarse matrix is singular
//!
//! One application of the preconditioner runs up to `cycle_applications`
//! V-cycles, stopping early once the relative residual drops below
//! `tolerance` (when positive).

use crate::blas_helpers::vector_norm;
use crate::direct::{LuFactorization, lu_factorize};
use crate::sparse::CsrMatrix;
use crate::traits::Preconditioner;
use ndarray::Array1;

/// Configuration for AMG preconditioner
#[derive(Debug, Clone)]
pub struct AmgConfig {
    /// Strong connection threshold θ
    pub strong_threshold: f64,
    /// Maximum number of levels in the hierarchy
    pub max_levels: usize,
    /// Coarsest level size - switch to direct solve below this
    pub coarse_size: usize,
    /// Number of pre-smoothing sweeps (ν₁)
    pub num_pre_smooth: usize,
    /// Number of post-smoothing sweeps (ν₂)
    pub num_post_smooth: usize,
    /// Jacobi damping parameter (ω)
    pub jacobi_weight: f64,
    /// Smooth the tentative prolongator
    pub smooth_prolongation: bool,
    /// V-cycles per preconditioner application
    pub cycle_applications: usize,
    /// Early exit on relative residual (0 disables)
    pub tolerance: f64,
}

impl Default for AmgConfig {
    fn default() -> Self {
        Self {
            strong_threshold: 0.08,
            max_levels: 10,
            coarse_size: 64,
            num_pre_smooth: 2,
            num_post_smooth: 2,
            jacobi_weight: 2.0 / 3.0,
            smooth_prolongation: true,
            cycle_applications: 1,
            tolerance: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct AmgLevel {
    matrix: CsrMatrix,
    inv_diag: Array1<f64>,
    prolongation: CsrMatrix,
    restriction: CsrMatrix,
}

#[derive(Debug, Clone)]
struct CoarseLevel {
    matrix: CsrMatrix,
    inv_diag: Array1<f64>,
    lu: Option<LuFactorization>,
}

/// Smoothed-aggregation AMG preconditioner
#[derive(Debug, Clone)]
pub struct AmgPreconditioner {
    levels: Vec<AmgLevel>,
    coarse: CoarseLevel,
    config: AmgConfig,
}

impl AmgPreconditioner {
    /// Build the multigrid hierarchy for a square matrix
    pub fn from_csr(matrix: &CsrMatrix, config: AmgConfig) -> Self {
        assert_eq!(matrix.num_rows, matrix.num_cols, "AMG needs a square matrix");

        let mut levels = Vec::new();
        let mut current = matrix.clone();

        while levels.len() + 1 < config.max_levels && current.num_rows > config.coarse_size {
            let strong = strength_graph(&current, config.strong_threshold);
            let (aggregate_of, num_aggregates) = aggregate(&strong);
            if num_aggregates == 0 || num_aggregates >= current.num_rows {
                break;
            }

            let inv_diag = inverse_diagonal(&current);
            let tentative = CsrMatrix::from_triplets(
                current.num_rows,
                num_aggregates,
                aggregate_of.iter().enumerate().map(|(i, &a)| (i, a, 1.0)).collect(),
            );
            let prolongation = if config.smooth_prolongation {
                smooth_prolongator(&current, &inv_diag, &tentative, config.jacobi_weight)
            } else {
                tentative
            };
            let restriction = prolongation.transpose();
            let coarse = restriction.matmul(&current.matmul(&prolongation));

            log::debug!(
                "AMG level {}: {} rows -> {} aggregates",
                levels.len(),
                current.num_rows,
                num_aggregates
            );

            levels.push(AmgLevel {
                matrix: current,
                inv_diag,
                prolongation,
                restriction,
            });
            current = coarse;
        }

        let lu = match lu_factorize(&current.to_dense()) {
            Ok(lu) => Some(lu),
            Err(err) => {
                log::debug!("AMG coarse grid uses Jacobi sweeps: {err}");
                None
            }
        };
        let coarse = CoarseLevel {
            inv_diag: inverse_diagonal(&current),
            matrix: current,
            lu,
        };

        Self {
            levels,
            coarse,
            config,
        }
    }

    /// Number of levels including the coarsest
    pub fn num_levels(&self) -> usize {
        self.levels.len() + 1
    }

    /// Size of the coarsest level
    pub fn coarse_size(&self) -> usize {
        self.coarse.matrix.num_rows
    }

    /// Configuration used to build this hierarchy
    pub fn config(&self) -> &AmgConfig {
        &self.config
    }

    fn fine_matrix(&self) -> &CsrMatrix {
        self.levels
            .first()
            .map_or(&self.coarse.matrix, |level| &level.matrix)
    }

    fn v_cycle(&self, level: usize, b: &Array1<f64>) -> Array1<f64> {
        if level == self.levels.len() {
            return self.coarse_solve(b);
        }
        let lvl = &self.levels[level];
        let mut x = Array1::zeros(b.len());

        for _ in 0..self.config.num_pre_smooth {
            jacobi_sweep(&lvl.matrix, &lvl.inv_diag, self.config.jacobi_weight, b, &mut x);
        }

        let residual = b - &lvl.matrix.matvec(&x);
        let coarse_rhs = lvl.restriction.matvec(&residual);
        let coarse_correction = self.v_cycle(level + 1, &coarse_rhs);
        x += &lvl.prolongation.matvec(&coarse_correction);

        for _ in 0..self.config.num_post_smooth {
            jacobi_sweep(&lvl.matrix, &lvl.inv_diag, self.config.jacobi_weight, b, &mut x);
        }
        x
    }

    fn coarse_solve(&self, b: &Array1<f64>) -> Array1<f64> {
        if let Some(lu) = &self.coarse.lu {
            if let Ok(x) = lu.solve(b) {
                return x;
            }
        }
        let mut x = Array1::zeros(b.len());
        for _ in 0..(self.config.num_pre_smooth + self.config.num_post_smooth).max(4) {
            jacobi_sweep(
                &self.coarse.matrix,
                &self.coarse.inv_diag,
                self.config.jacobi_weight,
                b,
                &mut x,
            );
        }
        x
    }
}

impl Preconditioner for AmgPreconditioner {
    fn apply(&self, r: &Array1<f64>) -> Array1<f64> {
        let r_norm = vector_norm(r);
        if r_norm == 0.0 {
            return Array1::zeros(r.len());
        }

        let mut x = self.v_cycle(0, r);
        for _ in 1..self.config.cycle_applications.max(1) {
            let residual = r - &self.fine_matrix().matvec(&x);
            if self.config.tolerance > 0.0 && vector_norm(&residual) < self.config.tolerance * r_norm {
                break;
            }
            x += &self.v_cycle(0, &residual);
        }
        x
    }
}

fn inverse_diagonal(matrix: &CsrMatrix) -> Array1<f64> {
    matrix
        .diagonal()
        .mapv(|d| if d.abs() > 1e-30 { 1.0 / d } else { 0.0 })
}

fn jacobi_sweep(
    matrix: &CsrMatrix,
    inv_diag: &Array1<f64>,
    weight: f64,
    b: &Array1<f64>,
    x: &mut Array1<f64>,
) {
    let residual = b - &matrix.matvec(x);
    x.scaled_add(weight, &(&residual * inv_diag));
}

/// Strongly connected off-diagonal neighbours of each row
fn strength_graph(matrix: &CsrMatrix, theta: f64) -> Vec<Vec<usize>> {
    let diag = matrix.diagonal();
    (0..matrix.num_rows)
        .map(|i| {
            matrix
                .row_entries(i)
                .filter(|&(j, v)| {
                    j != i && v != 0.0 && v.abs() >= theta * (diag[i] * diag[j]).abs().sqrt()
                })
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

/// Greedy three-pass aggregation; returns the aggregate of every row
fn aggregate(strong: &[Vec<usize>]) -> (Vec<usize>, usize) {
    let n = strong.len();
    let mut aggregate_of: Vec<Option<usize>> = vec![None; n];
    let mut count = 0;

    // pass 1: seed aggregates from fully unaggregated neighbourhoods
    for i in 0..n {
        if aggregate_of[i].is_some() || strong[i].iter().any(|&j| aggregate_of[j].is_some()) {
            continue;
        }
        aggregate_of[i] = Some(count);
        for &j in &strong[i] {
            aggregate_of[j] = Some(count);
        }
        count += 1;
    }

    // pass 2: attach leftovers to a neighbouring aggregate
    let snapshot = aggregate_of.clone();
    for i in 0..n {
        if aggregate_of[i].is_none() {
            aggregate_of[i] = strong[i].iter().find_map(|&j| snapshot[j]);
        }
    }

    // pass 3: whatever remains becomes its own aggregate
    let assigned: Vec<usize> = aggregate_of
        .into_iter()
        .map(|a| {
            a.unwrap_or_else(|| {
                count += 1;
                count - 1
            })
        })
        .collect();
    (assigned, count)
}

/// P = (I - ω D⁻¹ A) P₀
fn smooth_prolongator(
    matrix: &CsrMatrix,
    inv_diag: &Array1<f64>,
    tentative: &CsrMatrix,
    weight: f64,
) -> CsrMatrix {
    let mut scaled = matrix.clone();
    for i in 0..scaled.num_rows {
        scaled.scale_row(i, -weight * inv_diag[i]);
    }
    let correction = scaled.matmul(tentative);

    let mut triplets = Vec::with_capacity(tentative.nnz() + correction.nnz());
    for i in 0..tentative.num_rows {
        triplets.extend(tentative.row_entries(i).map(|(j, v)| (i, j, v)));
        triplets.extend(correction.row_entries(i).map(|(j, v)| (i, j, v)));
    }
    CsrMatrix::from_triplets(tentative.num_rows, tentative.num_cols, triplets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterative::{GmresConfig, gmres_preconditioned};

    /// 2D 5-point Laplacian on an n x n grid
    fn laplacian_2d(n: usize) -> CsrMatrix {
        let idx = |i: usize, j: usize| i * n + j;
        let mut triplets = Vec::new();
        for i in 0..n {
            for j in 0..n {
                triplets.push((idx(i, j), idx(i, j), 4.0));
                if i > 0 {
                    triplets.push((idx(i, j), idx(i - 1, j), -1.0));
                }
                if i + 1 < n {
                    triplets.push((idx(i, j), idx(i + 1, j), -1.0));
                }
                if j > 0 {
                    triplets.push((idx(i, j), idx(i, j - 1), -1.0));
                }
                if j + 1 < n {
                    triplets.push((idx(i, j), idx(i, j + 1), -1.0));
                }
            }
        }
        CsrMatrix::from_triplets(n * n, n * n, triplets)
    }

    #[test]
    fn test_amg_builds_hierarchy() {
        let a = laplacian_2d(20);
        let amg = AmgPreconditioner::from_csr(&a, AmgConfig::default());
        assert!(amg.num_levels() >= 2);
        assert!(amg.coarse_size() < 400);
    }

    #[test]
    fn test_amg_reduces_residual() {
        let a = laplacian_2d(16);
        let b = Array1::from_elem(256, 1.0);
        let config = AmgConfig {
            cycle_applications: 10,
            ..Default::default()
        };
        let amg = AmgPreconditioner::from_csr(&a, config);
        let x = amg.apply(&b);
        let residual = &b - &a.matvec(&x);
        assert!(vector_norm(&residual) < 0.1 * vector_norm(&b));
    }

    #[test]
    fn test_amg_accelerates_gmres() {
        let a = laplacian_2d(24);
        let b = Array1::from_elem(576, 1.0);
        let config = GmresConfig {
            max_iterations: 500,
            restart: 50,
            tolerance: 1e-10,
            print_interval: 0,
        };
        let amg = AmgPreconditioner::from_csr(&a, AmgConfig::default());
        let with_amg = gmres_preconditioned(&a, &amg, &b, None, &config);
        let plain = gmres_preconditioned(&a, &crate::IdentityPreconditioner, &b, None, &config);
        assert!(with_amg.converged);
        assert!(with_amg.iterations < plain.iterations);
    }

    #[test]
    fn test_small_matrix_is_solved_directly() {
        let a = laplacian_2d(4);
        let amg = AmgPreconditioner::from_csr(&a, AmgConfig::default());
        assert_eq!(amg.num_levels(), 1);
        let b = Array1::from_elem(16, 1.0);
        let x = amg.apply(&b);
        let residual = &b - &a.matvec(&x);
        assert!(vector_norm(&residual) < 1e-12);
    }

    #[test]
    fn test_aggregation_covers_every_row() {
        let strong = vec![vec![1], vec![0, 2], vec![1], vec![]];
        let (agg, count) = aggregate(&strong);
        assert_eq!(agg.len(), 4);
        assert!(agg.iter().all(|&a| a < count));
        assert_eq!(agg[0], agg[1]);
    }
}
