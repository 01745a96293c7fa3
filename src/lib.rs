//! # cvxcore
//!
//! Parsing, Disciplined Convex Programming (DCP) verification and conic
//! canonicalization for convex optimization problems written as text.
//!
//! cvxcore takes declarations plus objective and constraint strings, checks
//! them against the DCP rules and reduces them to a solver-ready
//! [`ConicProblem`]. It does not solve anything.
//!
//! ## Quick Start
//!
//! ```
//! use cvxcore::prelude::*;
//!
//! let problem = Problem::maximize("mu @ w - gamma * quad_form(w, Sigma)")
//!     .declare(Declaration::variable("w", 10).nonneg())
//!     .declare(Declaration::parameter("mu", 10))
//!     .declare(Declaration::parameter("gamma", ()).nonneg())
//!     .declare(Declaration::parameter("Sigma", (10, 10)).psd())
//!     .subject_to(["sum(w) == 1", "w <= 0.3"])
//!     .build()?;
//!
//! assert!(problem.is_dcp());
//! let conic = problem.canonicalize()?;
//! println!("{} columns, cones: {:?}", conic.num_columns(), conic.dims());
//! # Ok::<(), CvxError>(())
//! ```
//!
//! ## DCP Rules
//!
//! cvxcore enforces Disciplined Convex Programming rules:
//!
//! - **Minimization** requires a **convex** objective
//! - **Maximization** requires a **concave** objective
//! - **Equality constraints** require **affine** expressions
//! - **Inequality constraints** (`<=`) require a **convex** left side and a
//!   **concave** right side (`>=` the reverse)
//!
//! ## Supported Atoms
//!
//! ### Affine
//! - Arithmetic: `+`, `-`, `*` (by constant data), `/` (by constant data), `@`
//! - Aggregation: `sum`, `trace`
//! - Structural: `reshape`, `transpose`, `diag`, `vstack`, `hstack`, indexing
//!
//! ### Convex
//! - Norms: `norm1`, `norm2`, `norm_inf`
//! - Element-wise: `abs`, `pos`, `neg_part`, `exp`
//! - Aggregation: `maximum`, `sum_squares`
//! - Quadratic: `quad_form` (with PSD matrix), `quad_over_lin`
//! - Spectral: `lambda_max`
//!
//! ### Concave
//! - Element-wise: `log`, `entropy`, `sqrt`
//! - Aggregation: `minimum`
//! - Quadratic: `quad_form` (with NSD matrix)
//!
//! `power(x, p)` (written `x ** p`) depends on `p`.
//!
//! ## Architecture
//!
//! - **Frontend** lexes and parses fragments into owned expression trees
//! - **Analysis** binds names and infers shapes
//! - **DCP verification** via curvature and sign tracking
//! - **Canonicalization** to affine constraints plus SOC, exponential and PSD cones
//! - **Assembly** into an immutable [`ConicProblem`]

pub mod analysis;
pub mod atoms;
pub mod canon;
pub mod conic;
pub mod constraints;
pub mod dcp;
pub mod document;
pub mod error;
pub mod expr;
pub mod frontend;
pub mod problem;
pub mod settings;

/// Prelude module for convenient imports.
///
/// ```
/// use cvxcore::prelude::*;
/// ```
pub mod prelude {
    // Expression types
    pub use crate::expr::{Array, DeclKind, DeclTable, Declaration, Expr, Shape};

    // Atoms
    pub use crate::atoms::Atom;

    // Constraints
    pub use crate::constraints::{Constraint, ConstraintExt, Relation};

    // DCP
    pub use crate::dcp::{Curvature, Sign};

    // Problem
    pub use crate::conic::{ConeDims, ConicProblem};
    pub use crate::problem::{Problem, ProblemBuilder, Sense};
    pub use crate::settings::Settings;

    // Errors
    pub use crate::error::{CvxError, ErrorKind, Result};
}

// Re-export main types at crate root
pub use conic::ConicProblem;
pub use error::{CvxError, ErrorKind, Result};
pub use problem::Problem;
pub use settings::Settings;
