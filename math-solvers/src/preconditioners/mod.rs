//! Preconditioners for iterative solvers
//!
//! Preconditioners approximate A^(-1) to accelerate convergence of iterative methods.
//!
//! # Available Preconditioners
//!
//! - **IdentityPreconditioner**: no preconditioning
//! - **DiagonalPreconditioner** (Jacobi): diagonal scaling
//! - **IluPreconditioner**: ILU(0), no fill-in
//! - **AmgPreconditioner**: aggregation-based algebraic multigrid V-cycles
//!
//! All of them are built from a square matrix. For distributed operators they
//! are built from the block coupling owned rows to owned columns, which turns
//! them into block-Jacobi preconditioners across processes.

mod amg;
mod diagonal;
mod ilu;

pub use amg::{AmgConfig, AmgPreconditioner};
pub use diagonal::DiagonalPreconditioner;
pub use ilu::IluPreconditioner;

// Re-export IdentityPreconditioner from traits
pub use crate::traits::IdentityPreconditioner;
