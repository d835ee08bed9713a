//! Polyhedral meshes
//!
//! This module provides the rank-local mesh used by the MFD engine, structured
//! generators and the owned/ghost partitioner.

mod generators;
mod partition;
mod types;

pub use generators::*;
pub use partition::*;
pub use types::*;
