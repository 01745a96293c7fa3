//! Canonicalization transforms expressions into conic form.
//!
//! This module converts DCP expressions into:
//! - Affine expression trees (`AffineConstraint`) for equalities and inequalities
//! - Cone memberships (`ConeMembership`) over variable slices for nonlinear atoms
//! - Auxiliary declarations, including derived square-root factors

pub mod canonicalizer;
pub mod cone;
pub mod factor;

pub use canonicalizer::{canonicalize, CanonObjective, Canonical};
pub use cone::{AffineConstraint, ConeKind, ConeMembership, VarSlice};
pub use factor::{nsd_sqrt, psd_sqrt};
