//! DCP (Disciplined Convex Programming) analysis.
//!
//! This module provides the core DCP analysis functionality:
//! - Curvature tracking (convex, concave, affine, constant)
//! - Sign tracking (non-negative, non-positive, unknown)
//! - Composition rules and the analyzer that applies them to trees

pub mod analyzer;
pub mod curvature;
pub mod sign;

pub use analyzer::{
    analyze_expr, check_constraint, check_objective, matrix_status, DcpAnalyzer, Violation,
};
pub use curvature::{add_curvature, compose, scale_curvature, Curvature, PsdStatus};
pub use sign::{add_sign, mul_sign, Sign};
