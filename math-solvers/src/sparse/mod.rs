//! Sparse matrix structures (CSR format)
//!
//! This module provides Compressed Sparse Row (CSR) storage, a symbolic
//! pattern builder for assembly, and MatrixMarket I/O for diagnostics.

mod csr;
mod matrix_market;
mod pattern;

pub use csr::CsrMatrix;
pub use matrix_market::{MatrixMarketError, read_matrix_market, write_matrix_market};
pub use pattern::SparsityPattern;
