// crates/eqf_algo/src/lib.rs
#![forbid(unsafe_code)]

//! Pure numeric algorithms. No I/O, no shared mutable state; every function
//! reads its inputs and returns a fresh value.

pub mod grid;
pub mod share;
pub mod weighted;

// Tight, explicit re-exports (avoid wildcard export drift).
pub use grid::{weight_grid, RunPlan, RunSpec};
pub use share::{normalize, share_column};
pub use weighted::{combine, scale, WeightedTerm};
