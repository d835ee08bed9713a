//! Mimetic finite difference (MFD) discretization engine
//!
//! This crate assembles the mixed-hybrid system of diffusion-type equations
//! on polyhedral meshes, with unknowns on cells and faces.
//!
//! # Features
//!
//! - **Local forms**: two-point flux approximation and general polyhedral MFD
//! - **Global assembly**: `acc`, `acf`, `afc`, `aff` blocks with fixed sparsity
//! - **Boundary conditions**: Dirichlet, Neumann, total flux, mixed (Robin)
//! - **Scaled constraint**: face equations divided by a relative permeability
//! - **Schur reduction**: face-only system solved with preconditioned Krylov methods
//! - **Distributed runs**: owned/ghost numbering with a pluggable communicator
//!
//! # Example
//!
//! ```ignore
//! use math_mfd::{MatrixMfd, MfdConfig, boundary::BoundaryConditions, mesh};
//! use std::sync::Arc;
//!
//! let mesh = Arc::new(mesh::box_mesh_hexahedra(8, 8, 8, lo, hi)?);
//! let mut op = MatrixMfd::new(MfdConfig::default(), mesh.clone())?;
//! op.symbolic_assemble_global_matrices()?;
//! op.create_mfd_mass_matrices(None)?;
//! op.create_mfd_stiffness_matrices(None)?;
//! op.create_mfd_rhs_vectors()?;
//! op.apply_boundary_conditions(&bcs)?;
//! op.assemble_schur_complement()?;
//! let status = op.apply_inverse(op.rhs()?, &mut x)?;
//! ```

pub mod assembly;
pub mod boundary;
pub mod comm;
pub mod config;
pub mod error;
pub mod field;
pub mod local_form;
pub mod mesh;
pub mod operator;
pub mod scaling;
pub mod solver;

pub use config::{MfdConfig, MfdMethod};
pub use error::{MfdError, Result};
pub use field::{DistributedField, Entity, FieldLayout};
pub use operator::{MatrixMfd, OperatorState};
pub use solver::SolveStatus;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
