//! Static per-atom rules.

use std::fmt;

use super::Atom;
use crate::canon::ConeKind;
use crate::dcp::Curvature;

/// How an atom's result curvature is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurvatureRule {
    /// Declared curvature, subject to the argument requirements.
    Fixed(Curvature),
    /// Convex for a PSD matrix argument, concave for an NSD one.
    ByMatrix,
    /// Determined by the literal exponent.
    ByExponent,
}

/// How an atom's result sign is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignRule {
    Nonnegative,
    Unknown,
    /// Sign of the first argument.
    Preserve,
    /// Common sign of all arguments.
    Combine,
    /// Nonnegative if any argument is, nonpositive if all are.
    Max,
    /// Nonpositive if any argument is, nonnegative if all are.
    Min,
    ByMatrix,
    ByExponent,
}

/// Number of arguments an atom accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Between(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::Between(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(k) => n >= k,
        }
    }

    /// Smallest accepted argument count.
    pub fn min(self) -> usize {
        match self {
            Arity::Exactly(k) | Arity::Between(k, _) | Arity::AtLeast(k) => k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(1) => write!(f, "1 argument"),
            Arity::Exactly(k) => write!(f, "{k} arguments"),
            Arity::Between(lo, hi) => write!(f, "{lo} to {hi} arguments"),
            Arity::AtLeast(k) => write!(f, "at least {k} arguments"),
        }
    }
}

/// What kind of value an argument position takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRole {
    /// Any expression.
    Expr,
    /// An expression without variables.
    Data,
    /// A numeric literal in the source text.
    Literal,
}

/// Monotonicity of an atom in one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Monotonicity {
    Increasing,
    Decreasing,
    Nonmonotone,
    /// Increasing for a nonnegative argument, decreasing for a nonpositive one.
    SignDependent,
}

impl fmt::Display for Monotonicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Monotonicity::Increasing => write!(f, "increasing"),
            Monotonicity::Decreasing => write!(f, "decreasing"),
            Monotonicity::Nonmonotone => write!(f, "nonmonotone"),
            Monotonicity::SignDependent => write!(f, "sign-dependent"),
        }
    }
}

/// Curvature requirement on an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRequirement {
    /// The argument must be affine.
    Affine,
    /// Composition rule with the given monotonicity.
    Monotone(Monotonicity),
    /// Checked elsewhere (literals, data, exponent-dependent rules).
    Unchecked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub role: ArgRole,
    pub requirement: ArgRequirement,
}

/// Shape rule of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeRule {
    /// Any argument, scalar result.
    Scalar,
    /// Same shape as the first argument.
    Elementwise,
    /// Elementwise across all arguments with scalar broadcasting.
    Broadcast,
    /// Total or single-axis reduction.
    Sum,
    Reshape,
    Transpose,
    /// Square matrix to scalar.
    SquareToScalar,
    Diag,
    Vstack,
    Hstack,
    QuadForm,
    QuadOverLin,
}

/// Family of conic reduction applied by the canonicalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipe {
    /// Affine atom rebuilt over canonicalized arguments.
    PassThrough,
    /// Epigraph with linear inequalities only.
    Linear,
    SecondOrder,
    Exponential,
    Psd,
}

impl Recipe {
    /// Cone kind the recipe's memberships use.
    pub fn cone(self) -> ConeKind {
        match self {
            Recipe::PassThrough | Recipe::Linear => ConeKind::None,
            Recipe::SecondOrder => ConeKind::SecondOrder,
            Recipe::Exponential => ConeKind::Exponential,
            Recipe::Psd => ConeKind::Psd,
        }
    }
}

/// Everything the analysis passes need to know about one atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtomSpec {
    pub atom: Atom,
    pub description: &'static str,
    pub curvature: CurvatureRule,
    pub sign: SignRule,
    pub arity: Arity,
    /// Per-position argument rules. Variadic atoms repeat the last entry.
    pub args: &'static [ArgSpec],
    pub shape: ShapeRule,
    pub recipe: Recipe,
}

impl AtomSpec {
    /// Rule for argument `index`.
    pub fn arg(&self, index: usize) -> &ArgSpec {
        let last = self.args.len().saturating_sub(1);
        &self.args[index.min(last)]
    }

    /// Positions that must be numeric literals.
    pub fn literal_positions(&self, n_args: usize) -> impl Iterator<Item = usize> + '_ {
        (0..n_args).filter(move |&i| self.arg(i).role == ArgRole::Literal)
    }
}
