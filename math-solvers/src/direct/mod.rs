//! Direct solvers for linear systems
//!
//! - [`lu_factorize`] / [`lu_solve`]: dense LU decomposition with partial
//!   pivoting, used for AMG coarse grids and small dense blocks.

mod lu;

pub use lu::{LuError, LuFactorization, lu_factorize, lu_solve};
