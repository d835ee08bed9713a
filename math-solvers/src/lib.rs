//! Linear solvers for mimetic finite difference systems
//!
//! This crate provides the real-valued linear algebra used by the MFD engine:
//! sparse storage, Krylov methods, preconditioners and a dense LU for small
//! blocks and coarse grids.
//!
//! # Features
//!
//! - **Iterative Solvers**: preconditioned CG, restarted GMRES
//! - **Direct Solvers**: dense LU decomposition with partial pivoting
//! - **Preconditioners**: Jacobi, ILU(0), aggregation-based algebraic multigrid
//! - **Sparse Matrices**: CSR format with pattern-preserving value updates
//! - **Diagnostics**: MatrixMarket export and import
//!
//! Krylov methods take every inner product through
//! [`LinearOperator::dot`], so an operator that spans several processes only
//! has to reduce that one call to make the whole iteration global.
//!
//! # Example
//!
//! ```ignore
//! use math_mfd_solvers::{CsrMatrix, GmresConfig, IluPreconditioner, gmres_preconditioned};
//!
//! let matrix = CsrMatrix::from_triplets(n, n, triplets);
//! let precond = IluPreconditioner::from_csr(&matrix);
//! let solution = gmres_preconditioned(&matrix, &precond, &rhs, None, &GmresConfig::default());
//! assert!(solution.converged);
//! ```

pub mod blas_helpers;
pub mod direct;
pub mod iterative;
pub mod preconditioners;
pub mod sparse;
pub mod traits;

// Re-export main types
pub use sparse::{CsrMatrix, MatrixMarketError, SparsityPattern, read_matrix_market, write_matrix_market};
pub use traits::{LinearOperator, Preconditioner};

// Re-export iterative solvers
pub use iterative::{
    CgConfig, CgSolution, GmresConfig, GmresSolution, cg, cg_preconditioned, gmres,
    gmres_preconditioned,
};

// Re-export direct solvers
pub use direct::{LuError, LuFactorization, lu_factorize, lu_solve};

// Re-export preconditioners
pub use preconditioners::{
    AmgConfig, AmgPreconditioner, DiagonalPreconditioner, IdentityPreconditioner,
    IluPreconditioner,
};
