//! The atom table.

use super::spec::{
    ArgRequirement, ArgRole, ArgSpec, Arity, AtomSpec, CurvatureRule, Monotonicity, Recipe,
    ShapeRule, SignRule,
};
use super::Atom;
use crate::dcp::Curvature::{Affine, Concave, Convex};

const fn expr(name: &'static str, requirement: ArgRequirement) -> ArgSpec {
    ArgSpec {
        name,
        role: ArgRole::Expr,
        requirement,
    }
}

const fn literal(name: &'static str) -> ArgSpec {
    ArgSpec {
        name,
        role: ArgRole::Literal,
        requirement: ArgRequirement::Unchecked,
    }
}

const AFFINE: ArgRequirement = ArgRequirement::Affine;
const INCREASING: ArgRequirement = ArgRequirement::Monotone(Monotonicity::Increasing);
const DECREASING: ArgRequirement = ArgRequirement::Monotone(Monotonicity::Decreasing);
const SIGN_DEPENDENT: ArgRequirement = ArgRequirement::Monotone(Monotonicity::SignDependent);

const X_INCREASING: &[ArgSpec] = &[expr("x", INCREASING)];
const X_AFFINE: &[ArgSpec] = &[expr("x", AFFINE)];

pub(super) static SUM: AtomSpec = AtomSpec {
    atom: Atom::Sum,
    description: "sum of all entries, or along one axis",
    curvature: CurvatureRule::Fixed(Affine),
    sign: SignRule::Preserve,
    arity: Arity::Between(1, 2),
    args: &[expr("x", INCREASING), literal("axis")],
    shape: ShapeRule::Sum,
    recipe: Recipe::PassThrough,
};

pub(super) static RESHAPE: AtomSpec = AtomSpec {
    atom: Atom::Reshape,
    description: "reshape to an m x n matrix",
    curvature: CurvatureRule::Fixed(Affine),
    sign: SignRule::Preserve,
    arity: Arity::Exactly(3),
    args: &[expr("x", INCREASING), literal("m"), literal("n")],
    shape: ShapeRule::Reshape,
    recipe: Recipe::PassThrough,
};

pub(super) static TRANSPOSE: AtomSpec = AtomSpec {
    atom: Atom::Transpose,
    description: "matrix transpose",
    curvature: CurvatureRule::Fixed(Affine),
    sign: SignRule::Preserve,
    arity: Arity::Exactly(1),
    args: X_INCREASING,
    shape: ShapeRule::Transpose,
    recipe: Recipe::PassThrough,
};

pub(super) static TRACE: AtomSpec = AtomSpec {
    atom: Atom::Trace,
    description: "sum of the diagonal of a square matrix",
    curvature: CurvatureRule::Fixed(Affine),
    sign: SignRule::Preserve,
    arity: Arity::Exactly(1),
    args: X_INCREASING,
    shape: ShapeRule::SquareToScalar,
    recipe: Recipe::PassThrough,
};

pub(super) static DIAG: AtomSpec = AtomSpec {
    atom: Atom::Diag,
    description: "vector to diagonal matrix, or diagonal of a square matrix",
    curvature: CurvatureRule::Fixed(Affine),
    sign: SignRule::Preserve,
    arity: Arity::Exactly(1),
    args: X_INCREASING,
    shape: ShapeRule::Diag,
    recipe: Recipe::PassThrough,
};

pub(super) static VSTACK: AtomSpec = AtomSpec {
    atom: Atom::Vstack,
    description: "stack rows vertically",
    curvature: CurvatureRule::Fixed(Affine),
    sign: SignRule::Combine,
    arity: Arity::AtLeast(1),
    args: X_INCREASING,
    shape: ShapeRule::Vstack,
    recipe: Recipe::PassThrough,
};

pub(super) static HSTACK: AtomSpec = AtomSpec {
    atom: Atom::Hstack,
    description: "concatenate horizontally",
    curvature: CurvatureRule::Fixed(Affine),
    sign: SignRule::Combine,
    arity: Arity::AtLeast(1),
    args: X_INCREASING,
    shape: ShapeRule::Hstack,
    recipe: Recipe::PassThrough,
};

pub(super) static NORM1: AtomSpec = AtomSpec {
    atom: Atom::Norm1,
    description: "sum of absolute values",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: X_AFFINE,
    shape: ShapeRule::Scalar,
    recipe: Recipe::Linear,
};

pub(super) static NORM2: AtomSpec = AtomSpec {
    atom: Atom::Norm2,
    description: "Euclidean norm",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: X_AFFINE,
    shape: ShapeRule::Scalar,
    recipe: Recipe::SecondOrder,
};

pub(super) static NORM_INF: AtomSpec = AtomSpec {
    atom: Atom::NormInf,
    description: "largest absolute value",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: X_AFFINE,
    shape: ShapeRule::Scalar,
    recipe: Recipe::Linear,
};

pub(super) static ABS: AtomSpec = AtomSpec {
    atom: Atom::Abs,
    description: "elementwise absolute value",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: &[expr("x", SIGN_DEPENDENT)],
    shape: ShapeRule::Elementwise,
    recipe: Recipe::Linear,
};

pub(super) static POS: AtomSpec = AtomSpec {
    atom: Atom::Pos,
    description: "elementwise max(x, 0)",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: X_INCREASING,
    shape: ShapeRule::Elementwise,
    recipe: Recipe::Linear,
};

pub(super) static NEG_PART: AtomSpec = AtomSpec {
    atom: Atom::NegPart,
    description: "elementwise max(-x, 0)",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: &[expr("x", DECREASING)],
    shape: ShapeRule::Elementwise,
    recipe: Recipe::Linear,
};

pub(super) static MAXIMUM: AtomSpec = AtomSpec {
    atom: Atom::Maximum,
    description: "elementwise maximum of its arguments",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Max,
    arity: Arity::AtLeast(2),
    args: X_INCREASING,
    shape: ShapeRule::Broadcast,
    recipe: Recipe::Linear,
};

pub(super) static MINIMUM: AtomSpec = AtomSpec {
    atom: Atom::Minimum,
    description: "elementwise minimum of its arguments",
    curvature: CurvatureRule::Fixed(Concave),
    sign: SignRule::Min,
    arity: Arity::AtLeast(2),
    args: X_INCREASING,
    shape: ShapeRule::Broadcast,
    recipe: Recipe::Linear,
};

pub(super) static SUM_SQUARES: AtomSpec = AtomSpec {
    atom: Atom::SumSquares,
    description: "squared Euclidean norm",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: X_AFFINE,
    shape: ShapeRule::Scalar,
    recipe: Recipe::SecondOrder,
};

pub(super) static QUAD_FORM: AtomSpec = AtomSpec {
    atom: Atom::QuadForm,
    description: "x' P x for a PSD or NSD matrix P",
    curvature: CurvatureRule::ByMatrix,
    sign: SignRule::ByMatrix,
    arity: Arity::Exactly(2),
    args: &[
        expr("x", AFFINE),
        ArgSpec {
            name: "P",
            role: ArgRole::Data,
            requirement: ArgRequirement::Unchecked,
        },
    ],
    shape: ShapeRule::QuadForm,
    recipe: Recipe::SecondOrder,
};

pub(super) static QUAD_OVER_LIN: AtomSpec = AtomSpec {
    atom: Atom::QuadOverLin,
    description: "sum of squares of x divided by the scalar y",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(2),
    args: &[expr("x", AFFINE), expr("y", DECREASING)],
    shape: ShapeRule::QuadOverLin,
    recipe: Recipe::SecondOrder,
};

pub(super) static EXP: AtomSpec = AtomSpec {
    atom: Atom::Exp,
    description: "elementwise exponential",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: X_INCREASING,
    shape: ShapeRule::Elementwise,
    recipe: Recipe::Exponential,
};

pub(super) static LOG: AtomSpec = AtomSpec {
    atom: Atom::Log,
    description: "elementwise natural logarithm",
    curvature: CurvatureRule::Fixed(Concave),
    sign: SignRule::Unknown,
    arity: Arity::Exactly(1),
    args: X_INCREASING,
    shape: ShapeRule::Elementwise,
    recipe: Recipe::Exponential,
};

pub(super) static ENTROPY: AtomSpec = AtomSpec {
    atom: Atom::Entropy,
    description: "elementwise -x log(x)",
    curvature: CurvatureRule::Fixed(Concave),
    sign: SignRule::Unknown,
    arity: Arity::Exactly(1),
    args: X_AFFINE,
    shape: ShapeRule::Elementwise,
    recipe: Recipe::Exponential,
};

pub(super) static SQRT: AtomSpec = AtomSpec {
    atom: Atom::Sqrt,
    description: "elementwise square root",
    curvature: CurvatureRule::Fixed(Concave),
    sign: SignRule::Nonnegative,
    arity: Arity::Exactly(1),
    args: X_INCREASING,
    shape: ShapeRule::Elementwise,
    recipe: Recipe::SecondOrder,
};

pub(super) static POWER: AtomSpec = AtomSpec {
    atom: Atom::Power,
    description: "elementwise x ** p for p in {0, 0.5, 1, 2, -1}",
    curvature: CurvatureRule::ByExponent,
    sign: SignRule::ByExponent,
    arity: Arity::Exactly(2),
    args: &[
        ArgSpec {
            name: "x",
            role: ArgRole::Expr,
            requirement: ArgRequirement::Unchecked,
        },
        literal("p"),
    ],
    shape: ShapeRule::Elementwise,
    recipe: Recipe::SecondOrder,
};

pub(super) static LAMBDA_MAX: AtomSpec = AtomSpec {
    atom: Atom::LambdaMax,
    description: "largest eigenvalue of a symmetric matrix",
    curvature: CurvatureRule::Fixed(Convex),
    sign: SignRule::Unknown,
    arity: Arity::Exactly(1),
    args: X_AFFINE,
    shape: ShapeRule::SquareToScalar,
    recipe: Recipe::Psd,
};
