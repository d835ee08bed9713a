//! Face-system solvers
//!
//! [`LinearSolver`] wraps the Krylov methods and preconditioners of the
//! solver crate for distributed face matrices. The matrix rows are the owned
//! faces and its columns every local face; [`DistributedCsrOperator`] imports
//! ghost values before each product and reduces inner products over all
//! ranks, so every rank takes the same Krylov steps. Preconditioners act on
//! the owned diagonal block only (block Jacobi across ranks).

mod schur;

pub use schur::SchurReducer;

use crate::config::{IterativeMethod, PreconditionerSettings, PreconditionerType, SolverSettings};
use crate::mesh::Mesh;
use ndarray::{Array1, s};
use solvers::blas_helpers::inner_product;
use solvers::{
    AmgConfig, AmgPreconditioner, CgConfig, CsrMatrix, DiagonalPreconditioner, GmresConfig,
    IdentityPreconditioner, IluPreconditioner, LinearOperator, Preconditioner, cg_preconditioned,
    gmres_preconditioned,
};
use std::fmt;

/// Outcome of an iterative solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveStatus {
    pub converged: bool,
    pub iterations: usize,
    /// Final relative residual
    pub residual: f64,
}

impl SolveStatus {
    /// 0 when converged, 1 otherwise
    pub fn code(&self) -> i32 {
        if self.converged { 0 } else { 1 }
    }
}

/// Owned-rows × local-columns face matrix seen as an operator on owned vectors
pub struct DistributedCsrOperator<'a> {
    matrix: &'a CsrMatrix,
    mesh: &'a Mesh,
}

impl<'a> DistributedCsrOperator<'a> {
    pub fn new(matrix: &'a CsrMatrix, mesh: &'a Mesh) -> Self {
        Self { matrix, mesh }
    }

    /// Extend an owned vector with ghost values; collective
    pub fn ghosted(&self, x: &Array1<f64>) -> Array1<f64> {
        let mut full = Array1::zeros(self.matrix.num_cols);
        full.slice_mut(s![..x.len()]).assign(x);
        self.mesh
            .face_importer()
            .scatter_vector(self.mesh.comm(), &mut full);
        full
    }
}

impl LinearOperator for DistributedCsrOperator<'_> {
    fn num_rows(&self) -> usize {
        self.matrix.num_rows
    }

    fn num_cols(&self) -> usize {
        self.matrix.num_rows
    }

    fn apply(&self, x: &Array1<f64>) -> Array1<f64> {
        self.matrix.matvec(&self.ghosted(x))
    }

    fn dot(&self, x: &Array1<f64>, y: &Array1<f64>) -> f64 {
        self.mesh.comm().sum_all(inner_product(x, y))
    }
}

/// Configured Krylov method plus a preconditioner built for one matrix
pub struct LinearSolver {
    settings: SolverSettings,
    preconditioner_type: PreconditionerType,
    preconditioner: Box<dyn Preconditioner>,
}

impl fmt::Debug for LinearSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearSolver")
            .field("settings", &self.settings)
            .field("preconditioner_type", &self.preconditioner_type)
            .finish_non_exhaustive()
    }
}

impl LinearSolver {
    /// Build the preconditioner from the owned diagonal block of `matrix`
    pub fn new(
        matrix: &CsrMatrix,
        solver: &SolverSettings,
        preconditioner: &PreconditionerSettings,
    ) -> Self {
        let n = matrix.num_rows;
        let block = matrix.leading_block(n, n);
        let pc: Box<dyn Preconditioner> = match preconditioner.preconditioner_type {
            PreconditionerType::Identity => Box::new(IdentityPreconditioner),
            PreconditionerType::Diagonal => Box::new(DiagonalPreconditioner::from_csr(&block)),
            PreconditionerType::BlockIlu => Box::new(IluPreconditioner::from_csr(&block)),
            PreconditionerType::BoomerAmg => {
                let config = AmgConfig {
                    strong_threshold: preconditioner.strong_threshold,
                    num_pre_smooth: preconditioner.smoothing_sweeps,
                    num_post_smooth: preconditioner.smoothing_sweeps,
                    cycle_applications: preconditioner.cycle_applications,
                    tolerance: preconditioner.tolerance,
                    ..AmgConfig::default()
                };
                let amg = AmgPreconditioner::from_csr(&block, config);
                log::debug!(
                    "AMG hierarchy: {} levels, coarsest {} rows",
                    amg.num_levels(),
                    amg.coarse_size()
                );
                Box::new(amg)
            }
        };
        Self {
            settings: solver.clone(),
            preconditioner_type: preconditioner.preconditioner_type,
            preconditioner: pc,
        }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Solve `matrix x = b` for the owned face values; collective
    ///
    /// Never fails: a solve that stops short of the tolerance returns its
    /// last iterate with `converged == false`.
    pub fn solve(
        &self,
        mesh: &Mesh,
        matrix: &CsrMatrix,
        b: &Array1<f64>,
        x0: Option<&Array1<f64>>,
    ) -> (Array1<f64>, SolveStatus) {
        let operator = DistributedCsrOperator::new(matrix, mesh);
        let s = &self.settings;
        let (name, x, status) = match s.iterative_method {
            IterativeMethod::Pcg => {
                let config = CgConfig {
                    max_iterations: s.max_iterations,
                    tolerance: s.tolerance,
                    print_interval: s.print_interval,
                };
                let sol = cg_preconditioned(&operator, self.preconditioner.as_ref(), b, x0, &config);
                let status = SolveStatus {
                    converged: sol.converged,
                    iterations: sol.iterations,
                    residual: sol.residual,
                };
                ("PCG", sol.x, status)
            }
            IterativeMethod::Gmres => {
                let config = GmresConfig {
                    max_iterations: s.max_iterations,
                    restart: s.restart,
                    tolerance: s.tolerance,
                    print_interval: s.print_interval,
                };
                let sol =
                    gmres_preconditioned(&operator, self.preconditioner.as_ref(), b, x0, &config);
                let status = SolveStatus {
                    converged: sol.converged,
                    iterations: sol.iterations,
                    residual: sol.residual,
                };
                ("GMRES", sol.x, status)
            }
        };

        if status.converged {
            log::info!(
                "{} converged in {} iterations, relative residual {:.3e}",
                name,
                status.iterations,
                status.residual
            );
        } else {
            log::warn!(
                "{} did not converge in {} iterations, relative residual {:.3e}",
                name,
                status.iterations,
                status.residual
            );
        }
        (x, status)
    }
}
