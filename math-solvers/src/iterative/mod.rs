//! Iterative solvers for linear systems
//!
//! This module provides Krylov subspace methods for solving large sparse systems:
//! - [`gmres`]: GMRES(m) with restart - for general non-symmetric systems
//! - [`cg`]: Conjugate Gradient - for symmetric positive definite systems
//!
//! Both accept an optional initial guess and report convergence through their
//! solution structs instead of an error: non-convergence is a recoverable
//! outcome that the caller decides how to handle.

mod cg;
mod gmres;

pub use cg::{CgConfig, CgSolution, cg, cg_preconditioned};
pub use gmres::{GmresConfig, GmresSolution, gmres, gmres_preconditioned};
