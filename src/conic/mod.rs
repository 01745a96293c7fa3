//! Solver-facing conic problem.

pub mod assembly;

pub use assembly::{assemble, ConeBlock, ConeDims, ConicProblem, VariableMap};
