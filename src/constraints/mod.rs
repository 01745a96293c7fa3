//! Constraints relating two expressions.

pub mod constraint;

pub use constraint::{Constraint, ConstraintExt, Relation};
