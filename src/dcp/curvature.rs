//! Curvature tracking for DCP (Disciplined Convex Programming).
//!
//! This module implements the curvature lattice and the rules that combine
//! curvatures under addition, scaling and atom composition.

use std::fmt;

use serde::Serialize;

use super::sign::Sign;
use crate::atoms::Monotonicity;
use crate::expr::Array;

/// Curvature of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Curvature {
    /// Constant value (most restrictive).
    Constant,
    /// Affine function (both convex and concave).
    Affine,
    /// Convex function.
    Convex,
    /// Concave function.
    Concave,
    /// Unknown curvature (not DCP-compliant).
    Unknown,
}

impl Curvature {
    /// Check if the curvature is convex (constant, affine, or convex).
    pub fn is_convex(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine | Curvature::Convex)
    }

    /// Check if the curvature is concave (constant, affine, or concave).
    pub fn is_concave(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine | Curvature::Concave)
    }

    /// Check if the curvature is affine (constant or affine).
    pub fn is_affine(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine)
    }

    /// Check if this is a constant.
    pub fn is_constant(self) -> bool {
        matches!(self, Curvature::Constant)
    }

    /// Negate the curvature (convex <-> concave).
    pub fn negate(self) -> Self {
        match self {
            Curvature::Convex => Curvature::Concave,
            Curvature::Concave => Curvature::Convex,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Curvature::Constant => "constant",
            Curvature::Affine => "affine",
            Curvature::Convex => "convex",
            Curvature::Concave => "concave",
            Curvature::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Curvature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine curvatures for addition: a + b.
pub fn add_curvature(a: Curvature, b: Curvature) -> Curvature {
    use Curvature::*;
    match (a, b) {
        // Unknown absorbs everything
        (Unknown, _) | (_, Unknown) => Unknown,
        // Constants don't affect curvature
        (Constant, x) | (x, Constant) => x,
        // Affine doesn't affect non-constant curvature
        (Affine, x) | (x, Affine) => x,
        (Convex, Convex) => Convex,
        (Concave, Concave) => Concave,
        (Convex, Concave) | (Concave, Convex) => Unknown,
    }
}

/// Curvature of `scalar * expr` for a multiplier of the given sign.
///
/// Nonnegative preserves, nonpositive flips, zero gives a constant. An
/// unknown-signed multiplier only keeps affine expressions affine.
pub fn scale_curvature(sign: Sign, expr_curv: Curvature) -> Curvature {
    match sign {
        Sign::Zero => Curvature::Constant,
        Sign::Nonnegative => expr_curv,
        Sign::Nonpositive => expr_curv.negate(),
        Sign::Unknown if expr_curv.is_affine() => expr_curv,
        Sign::Unknown => Curvature::Unknown,
    }
}

/// Curvature of `f(g)` for `f` of curvature `outer` with the given
/// monotonicity, applied to `g` of curvature `inner`.
///
/// `SignDependent` must be resolved by the caller; passed here it is treated
/// as nonmonotone.
pub fn compose(outer: Curvature, monotonicity: Monotonicity, inner: Curvature) -> Curvature {
    use Curvature::*;
    use Monotonicity::*;
    match (outer, inner) {
        (_, Unknown) | (Unknown, _) => Unknown,
        (_, Constant) | (Constant, _) => Constant,
        (Affine, _) => match monotonicity {
            Increasing => inner,
            Decreasing => inner.negate(),
            Nonmonotone | SignDependent if inner.is_affine() => Affine,
            Nonmonotone | SignDependent => Unknown,
        },
        (Convex, Affine) => Convex,
        (Concave, Affine) => Concave,
        (Convex, Convex) if monotonicity == Increasing => Convex,
        (Convex, Concave) if monotonicity == Decreasing => Convex,
        (Concave, Concave) if monotonicity == Increasing => Concave,
        (Concave, Convex) if monotonicity == Decreasing => Concave,
        _ => Unknown,
    }
}

/// Resolve sign-dependent monotonicity against the argument's sign.
pub fn resolve_monotonicity(monotonicity: Monotonicity, arg_sign: Sign) -> Monotonicity {
    match monotonicity {
        Monotonicity::SignDependent if arg_sign.is_zero() => Monotonicity::Increasing,
        Monotonicity::SignDependent if arg_sign.is_nonneg() => Monotonicity::Increasing,
        Monotonicity::SignDependent if arg_sign.is_nonpos() => Monotonicity::Decreasing,
        Monotonicity::SignDependent => Monotonicity::Nonmonotone,
        other => other,
    }
}

/// Determine if a matrix is PSD, NSD, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsdStatus {
    Psd,     // Positive semi-definite
    Nsd,     // Negative semi-definite
    Neither, // Indefinite or non-symmetric
}

impl PsdStatus {
    /// Determine PSD status of an array from its eigenvalues.
    pub fn of_array(arr: &Array) -> Self {
        if let Array::Scalar(v) = arr {
            return if *v >= 0.0 {
                PsdStatus::Psd
            } else {
                PsdStatus::Nsd
            };
        }
        let Some(eigen) = arr.symmetric_eigen() else {
            return PsdStatus::Neither;
        };
        let tol = arr.eigen_tolerance();
        if eigen.eigenvalues.iter().all(|&l| l >= -tol) {
            PsdStatus::Psd
        } else if eigen.eigenvalues.iter().all(|&l| l <= tol) {
            PsdStatus::Nsd
        } else {
            PsdStatus::Neither
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curvature_basics() {
        assert!(Curvature::Constant.is_convex());
        assert!(Curvature::Constant.is_concave());
        assert!(Curvature::Constant.is_affine());

        assert!(Curvature::Affine.is_convex());
        assert!(Curvature::Affine.is_concave());
        assert!(Curvature::Affine.is_affine());

        assert!(Curvature::Convex.is_convex());
        assert!(!Curvature::Convex.is_concave());
        assert!(!Curvature::Convex.is_affine());

        assert!(!Curvature::Concave.is_convex());
        assert!(Curvature::Concave.is_concave());
        assert!(!Curvature::Concave.is_affine());

        assert!(!Curvature::Unknown.is_convex());
        assert!(!Curvature::Unknown.is_concave());
    }

    #[test]
    fn test_negate_curvature() {
        assert_eq!(Curvature::Convex.negate(), Curvature::Concave);
        assert_eq!(Curvature::Concave.negate(), Curvature::Convex);
        assert_eq!(Curvature::Affine.negate(), Curvature::Affine);
        assert_eq!(Curvature::Constant.negate(), Curvature::Constant);
    }

    #[test]
    fn test_add_curvature() {
        use Curvature::*;
        assert_eq!(add_curvature(Convex, Convex), Convex);
        assert_eq!(add_curvature(Concave, Concave), Concave);
        assert_eq!(add_curvature(Affine, Affine), Affine);
        assert_eq!(add_curvature(Constant, Constant), Constant);
        assert_eq!(add_curvature(Convex, Affine), Convex);
        assert_eq!(add_curvature(Concave, Constant), Concave);
        assert_eq!(add_curvature(Convex, Concave), Unknown);
        assert_eq!(add_curvature(Constant, Unknown), Unknown);
    }

    #[test]
    fn test_scale_curvature() {
        use Curvature::*;
        assert_eq!(scale_curvature(Sign::Nonnegative, Convex), Convex);
        assert_eq!(scale_curvature(Sign::Nonpositive, Convex), Concave);
        assert_eq!(scale_curvature(Sign::Zero, Concave), Constant);
        assert_eq!(scale_curvature(Sign::Unknown, Affine), Affine);
        assert_eq!(scale_curvature(Sign::Unknown, Convex), Unknown);
    }

    #[test]
    fn test_composition_table() {
        use Curvature::*;
        use Monotonicity::*;
        const INNER: [Curvature; 5] = [Constant, Affine, Convex, Concave, Unknown];
        // One row per (outer, monotonicity), one column per inner curvature.
        let table = [
            (Constant, Increasing, [Constant, Constant, Constant, Constant, Unknown]),
            (Constant, Decreasing, [Constant, Constant, Constant, Constant, Unknown]),
            (Constant, Nonmonotone, [Constant, Constant, Constant, Constant, Unknown]),
            (Affine, Increasing, [Constant, Affine, Convex, Concave, Unknown]),
            (Affine, Decreasing, [Constant, Affine, Concave, Convex, Unknown]),
            (Affine, Nonmonotone, [Constant, Affine, Unknown, Unknown, Unknown]),
            (Convex, Increasing, [Constant, Convex, Convex, Unknown, Unknown]),
            (Convex, Decreasing, [Constant, Convex, Unknown, Convex, Unknown]),
            (Convex, Nonmonotone, [Constant, Convex, Unknown, Unknown, Unknown]),
            (Concave, Increasing, [Constant, Concave, Unknown, Concave, Unknown]),
            (Concave, Decreasing, [Constant, Concave, Concave, Unknown, Unknown]),
            (Concave, Nonmonotone, [Constant, Concave, Unknown, Unknown, Unknown]),
            (Unknown, Increasing, [Unknown; 5]),
            (Unknown, Decreasing, [Unknown; 5]),
            (Unknown, Nonmonotone, [Unknown; 5]),
        ];
        for (outer, monotonicity, row) in table {
            for (inner, expected) in INNER.into_iter().zip(row) {
                assert_eq!(
                    compose(outer, monotonicity, inner),
                    expected,
                    "{outer} {monotonicity} of {inner}"
                );
            }
        }
    }

    #[test]
    fn test_sign_dependent_composition() {
        use Curvature::*;
        let cases = [
            (Convex, Sign::Nonnegative, Convex, Convex),
            (Convex, Sign::Zero, Convex, Convex),
            (Concave, Sign::Nonpositive, Convex, Convex),
            (Convex, Sign::Nonpositive, Convex, Unknown),
            (Concave, Sign::Nonnegative, Convex, Unknown),
            (Convex, Sign::Unknown, Convex, Unknown),
            (Affine, Sign::Unknown, Convex, Convex),
        ];
        for (inner, sign, outer, expected) in cases {
            let m = resolve_monotonicity(Monotonicity::SignDependent, sign);
            assert_eq!(compose(outer, m, inner), expected, "{outer} of {sign} {inner}");
        }
        // Unresolved, it composes like a nonmonotone function.
        assert_eq!(compose(Convex, Monotonicity::SignDependent, Convex), Unknown);
        assert_eq!(compose(Convex, Monotonicity::SignDependent, Affine), Convex);
    }

    #[test]
    fn test_resolve_monotonicity() {
        use Monotonicity::*;
        assert_eq!(resolve_monotonicity(SignDependent, Sign::Nonnegative), Increasing);
        assert_eq!(resolve_monotonicity(SignDependent, Sign::Nonpositive), Decreasing);
        assert_eq!(resolve_monotonicity(SignDependent, Sign::Unknown), Nonmonotone);
        assert_eq!(resolve_monotonicity(Decreasing, Sign::Nonnegative), Decreasing);
    }

    #[test]
    fn test_psd_status() {
        let psd = Array::from_rows(&[vec![2.0, 1.0], vec![1.0, 2.0]]).unwrap();
        let singular = Array::from_rows(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        let indefinite = Array::from_rows(&[vec![1.0, 0.0], vec![0.0, -1.0]]).unwrap();
        let nsd = Array::from_rows(&[vec![-1.0, 0.0], vec![0.0, -3.0]]).unwrap();
        let asymmetric = Array::from_rows(&[vec![1.0, 2.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(PsdStatus::of_array(&psd), PsdStatus::Psd);
        assert_eq!(PsdStatus::of_array(&singular), PsdStatus::Psd);
        assert_eq!(PsdStatus::of_array(&indefinite), PsdStatus::Neither);
        assert_eq!(PsdStatus::of_array(&nsd), PsdStatus::Nsd);
        assert_eq!(PsdStatus::of_array(&asymmetric), PsdStatus::Neither);
        assert_eq!(PsdStatus::of_array(&Array::Scalar(-2.0)), PsdStatus::Nsd);
    }
}
