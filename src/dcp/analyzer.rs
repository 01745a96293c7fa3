//! Curvature and sign propagation over bound, shaped expression trees.
//!
//! The analyzer walks each tree post-order, left to right, annotating every
//! node with its curvature and sign. Rule violations are collected in that
//! order and do not stop the walk; the first one becomes the error.

use tracing::debug;

use super::curvature::{add_curvature, compose, resolve_monotonicity, scale_curvature};
use super::curvature::{Curvature, PsdStatus};
use super::sign::{add_sign, combine_signs, max_sign, min_sign, mul_sign, Sign};
use crate::atoms::{ArgRequirement, ArgRole, Atom, AtomSpec, CurvatureRule, Monotonicity, SignRule};
use crate::constraints::Constraint;
use crate::error::{CvxError, Result, Span};
use crate::expr::{BinaryOp, DeclKind, DeclLookup, Declaration, Expr, ExprKind, UnaryOp};
use crate::problem::Sense;
use crate::settings::Settings;

/// A DCP rule broken at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub span: Span,
    pub message: String,
}

impl From<Violation> for CvxError {
    fn from(v: Violation) -> Self {
        CvxError::not_dcp(v.span, v.message)
    }
}

/// Walks one expression tree. Reusable across trees of the same problem.
pub struct DcpAnalyzer<'a> {
    decls: &'a dyn DeclLookup,
    settings: &'a Settings,
    violations: Vec<Violation>,
}

impl<'a> DcpAnalyzer<'a> {
    pub fn new(decls: &'a dyn DeclLookup, settings: &'a Settings) -> Self {
        DcpAnalyzer {
            decls,
            settings,
            violations: Vec::new(),
        }
    }

    /// Annotate `expr` and return its curvature and sign.
    ///
    /// Fails with the first violation found in this tree.
    pub fn analyze(&mut self, expr: &Expr) -> Result<(Curvature, Sign)> {
        let first = self.violations.len();
        let result = self.visit(expr)?;
        match self.violations.get(first) {
            Some(v) => Err(v.clone().into()),
            None => Ok(result),
        }
    }

    /// Every violation seen so far, in traversal order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    fn violation(&mut self, span: Span, message: String) {
        debug!(%span, %message, "DCP violation");
        self.violations.push(Violation { span, message });
    }

    // Always walks the whole subtree; cached annotations never short-circuit it.
    fn visit(&mut self, expr: &Expr) -> Result<(Curvature, Sign)> {
        let (curvature, sign) = match expr.kind() {
            ExprKind::Leaf(symbol) => {
                let decl = self.decls.lookup(symbol.name()).ok_or_else(|| CvxError::Reference {
                    name: symbol.name().to_string(),
                    span: expr.span(),
                })?;
                (Curvature::Affine, self.leaf_sign(decl))
            }
            ExprKind::Number(v) => (Curvature::Constant, Sign::of_value(*v)),
            ExprKind::Unary(UnaryOp::Neg, operand) => {
                let (c, s) = self.visit(operand)?;
                (c.negate(), s.negate())
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let l = self.visit(lhs)?;
                let r = self.visit(rhs)?;
                self.binary(expr, *op, (lhs, l), (rhs, r))
            }
            ExprKind::Call(atom, args) => {
                let mut analyzed = Vec::with_capacity(args.len());
                for arg in args {
                    analyzed.push(self.visit(arg)?);
                }
                self.call(expr, *atom, args, &analyzed)
            }
            ExprKind::Index(base, _) => self.visit(base)?,
        };
        expr.annotate_dcp(curvature, sign);
        Ok((curvature, sign))
    }

    /// Declared sign of a leaf. An unsigned scalar parameter is taken as
    /// nonnegative when the settings allow it.
    fn leaf_sign(&self, decl: &Declaration) -> Sign {
        let sign = decl.sign();
        let assume = self.settings.assume_nonneg_scalar_parameters;
        if sign == Sign::Unknown
            && assume
            && decl.kind == DeclKind::Parameter
            && decl.shape.is_scalar()
        {
            Sign::Nonnegative
        } else {
            sign
        }
    }

    fn binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        (lhs, (lc, ls)): (&Expr, (Curvature, Sign)),
        (rhs, (rc, rs)): (&Expr, (Curvature, Sign)),
    ) -> (Curvature, Sign) {
        match op {
            BinaryOp::Add => (add_curvature(lc, rc), add_sign(ls, rs)),
            BinaryOp::Sub => (add_curvature(lc, rc.negate()), add_sign(ls, rs.negate())),
            BinaryOp::Mul | BinaryOp::MatMul => {
                let sign = mul_sign(ls, rs);
                let curvature = if lhs.is_data() {
                    scale_curvature(ls, rc)
                } else if rhs.is_data() {
                    scale_curvature(rs, lc)
                } else {
                    self.violation(
                        expr.span(),
                        format!(
                            "product of two non-constant expressions `{lhs}` and `{rhs}`"
                        ),
                    );
                    return (Curvature::Unknown, sign);
                };
                let known = lc != Curvature::Unknown && rc != Curvature::Unknown;
                if curvature == Curvature::Unknown && known {
                    self.violation(
                        expr.span(),
                        format!("cannot determine the sign of the multiplier in `{expr}`"),
                    );
                }
                (curvature, sign)
            }
            BinaryOp::Div => {
                let sign = mul_sign(ls, rs);
                if !rhs.is_data() {
                    self.violation(
                        expr.span(),
                        format!("denominator `{rhs}` must be constant data"),
                    );
                    return (Curvature::Unknown, sign);
                }
                if rs.is_zero() {
                    self.violation(expr.span(), format!("division by zero in `{expr}`"));
                    return (Curvature::Unknown, Sign::Unknown);
                }
                let curvature = scale_curvature(rs, lc);
                if curvature == Curvature::Unknown && lc != Curvature::Unknown {
                    self.violation(
                        expr.span(),
                        format!("cannot determine the sign of the denominator in `{expr}`"),
                    );
                }
                (curvature, sign)
            }
        }
    }

    fn call(
        &mut self,
        expr: &Expr,
        atom: Atom,
        args: &[Expr],
        analyzed: &[(Curvature, Sign)],
    ) -> (Curvature, Sign) {
        let spec = atom.spec();
        let (outer, sign) = match spec.curvature {
            CurvatureRule::Fixed(c) => (Some(c), fixed_sign(spec, analyzed)),
            CurvatureRule::ByMatrix => self.matrix_rule(expr, args),
            CurvatureRule::ByExponent => return self.exponent_rule(expr, args, analyzed),
        };
        let Some(outer) = outer else {
            return (Curvature::Unknown, sign);
        };
        (self.compose_args(expr, spec, outer, args, analyzed), sign)
    }

    /// Fold the per-argument composition results of one call.
    fn compose_args(
        &mut self,
        expr: &Expr,
        spec: &AtomSpec,
        outer: Curvature,
        args: &[Expr],
        analyzed: &[(Curvature, Sign)],
    ) -> Curvature {
        let mut result = Curvature::Constant;
        for (i, (arg, &(inner, arg_sign))) in args.iter().zip(analyzed).enumerate() {
            let arg_spec = spec.arg(i);
            let position = i + 1;
            let per_arg = match (arg_spec.role, arg_spec.requirement) {
                (ArgRole::Literal, _) => continue,
                (ArgRole::Data, _) => {
                    if !arg.is_data() {
                        self.violation(
                            expr.span(),
                            format!("`{}` argument {position} must be constant data", spec.atom),
                        );
                        Curvature::Unknown
                    } else {
                        continue;
                    }
                }
                (_, ArgRequirement::Unchecked) => continue,
                (_, ArgRequirement::Affine) => {
                    let c = compose(outer, Monotonicity::Nonmonotone, inner);
                    if !inner.is_affine() && inner != Curvature::Unknown {
                        self.violation(
                            expr.span(),
                            format!(
                                "`{}` argument {position} must be affine, found {inner} `{arg}`",
                                spec.atom
                            ),
                        );
                    }
                    c
                }
                (_, ArgRequirement::Monotone(m)) => {
                    let m = resolve_monotonicity(m, arg_sign);
                    let c = compose(outer, m, inner);
                    if c == Curvature::Unknown && inner != Curvature::Unknown {
                        self.violation(
                            expr.span(),
                            format!(
                                "`{}` is {outer} and {m} in argument {position}, \
                                 which cannot take the {inner} `{arg}`",
                                spec.atom
                            ),
                        );
                    }
                    c
                }
            };
            result = add_curvature(result, per_arg);
        }
        result
    }

    /// `quad_form(x, P)`: convex for PSD `P`, concave for NSD `P`.
    fn matrix_rule(&mut self, expr: &Expr, args: &[Expr]) -> (Option<Curvature>, Sign) {
        let status = args.get(1).and_then(|p| matrix_status(p, self.decls));
        match status {
            Some(PsdStatus::Psd) => (Some(Curvature::Convex), Sign::Nonnegative),
            Some(PsdStatus::Nsd) => (Some(Curvature::Concave), Sign::Nonpositive),
            Some(PsdStatus::Neither) | None => {
                let p = args.get(1).map(ToString::to_string).unwrap_or_default();
                self.violation(
                    expr.span(),
                    format!("`quad_form` argument 2 must be a psd or nsd matrix, found `{p}`"),
                );
                (None, Sign::Unknown)
            }
        }
    }

    /// `power(x, p)` for the supported exponents.
    fn exponent_rule(
        &mut self,
        expr: &Expr,
        args: &[Expr],
        analyzed: &[(Curvature, Sign)],
    ) -> (Curvature, Sign) {
        let (Some(x), Some(&(inner, x_sign))) = (args.first(), analyzed.first()) else {
            return (Curvature::Unknown, Sign::Unknown);
        };
        let p = args.get(1).and_then(Expr::literal_value);
        let (outer, monotonicity) = match p {
            Some(p) if p == 0.0 => return (Curvature::Constant, Sign::Nonnegative),
            Some(p) if p == 1.0 => return (inner, x_sign),
            Some(p) if p == 2.0 => (Curvature::Convex, Monotonicity::SignDependent),
            Some(p) if p == 0.5 => (Curvature::Concave, Monotonicity::Increasing),
            Some(p) if p == -1.0 => (Curvature::Convex, Monotonicity::Decreasing),
            _ => {
                let shown = args.get(1).map(ToString::to_string).unwrap_or_default();
                self.violation(
                    expr.span(),
                    format!("`power` exponent {shown} is not one of 0, 0.5, 1, 2, -1"),
                );
                return (Curvature::Unknown, Sign::Unknown);
            }
        };
        let monotonicity = resolve_monotonicity(monotonicity, x_sign);
        let c = compose(outer, monotonicity, inner);
        if c == Curvature::Unknown && inner != Curvature::Unknown {
            self.violation(
                expr.span(),
                format!(
                    "`{x} ** {}` requires {} base, found {inner}",
                    fmt_exponent(p),
                    required_base(monotonicity, outer)
                ),
            );
        }
        (c, Sign::Nonnegative)
    }
}

/// PSD status of a literal, or of a data leaf from its attributes or value.
pub fn matrix_status(p: &Expr, decls: &dyn DeclLookup) -> Option<PsdStatus> {
    if let Some(v) = p.literal_value() {
        return Some(if v >= 0.0 { PsdStatus::Psd } else { PsdStatus::Nsd });
    }
    let decl = decls.lookup(p.as_leaf()?)?;
    if decl.is_variable() {
        return None;
    }
    if decl.attributes.psd {
        return Some(PsdStatus::Psd);
    }
    if decl.attributes.nsd {
        return Some(PsdStatus::Nsd);
    }
    if let Some(value) = &decl.value {
        return Some(PsdStatus::of_array(value));
    }
    if decl.shape.is_scalar() {
        let sign = decl.sign();
        if sign.is_nonneg() {
            return Some(PsdStatus::Psd);
        }
        if sign.is_nonpos() {
            return Some(PsdStatus::Nsd);
        }
    }
    Some(PsdStatus::Neither)
}

fn fixed_sign(spec: &AtomSpec, analyzed: &[(Curvature, Sign)]) -> Sign {
    let signs: Vec<Sign> = analyzed
        .iter()
        .enumerate()
        .filter(|(i, _)| spec.arg(*i).role != ArgRole::Literal)
        .map(|(_, &(_, s))| s)
        .collect();
    match spec.sign {
        SignRule::Nonnegative => Sign::Nonnegative,
        SignRule::Unknown => Sign::Unknown,
        SignRule::Preserve => signs.first().copied().unwrap_or(Sign::Unknown),
        SignRule::Combine => combine_signs(signs),
        SignRule::Max => max_sign(&signs),
        SignRule::Min => min_sign(&signs),
        // Only paired with the matrix and exponent curvature rules.
        SignRule::ByMatrix | SignRule::ByExponent => Sign::Unknown,
    }
}

fn fmt_exponent(p: Option<f64>) -> String {
    p.map(|v| v.to_string()).unwrap_or_default()
}

/// Base curvature a power rule accepts, with its article.
fn required_base(monotonicity: Monotonicity, outer: Curvature) -> &'static str {
    match monotonicity {
        Monotonicity::Nonmonotone | Monotonicity::SignDependent => "an affine",
        m if (outer == Curvature::Convex) == (m == Monotonicity::Increasing) => "a convex",
        _ => "a concave",
    }
}

/// Analyze one expression against a declaration table.
pub fn analyze_expr(
    expr: &Expr,
    decls: &dyn DeclLookup,
    settings: &Settings,
) -> Result<(Curvature, Sign)> {
    DcpAnalyzer::new(decls, settings).analyze(expr)
}

/// Check an analyzed objective against its sense.
pub fn check_objective(sense: Sense, expr: &Expr) -> Result<()> {
    let curvature = expr.curvature().unwrap_or(Curvature::Unknown);
    let ok = match sense {
        Sense::Minimize => curvature.is_convex(),
        Sense::Maximize => curvature.is_concave(),
    };
    if ok {
        return Ok(());
    }
    let needed = match sense {
        Sense::Minimize => "convex",
        Sense::Maximize => "concave",
    };
    Err(CvxError::not_dcp(
        expr.span(),
        format!("cannot {sense} a {curvature} expression, it must be {needed}"),
    ))
}

/// Analyze both sides of a constraint and check the relation's rule.
pub fn check_constraint(
    constraint: &Constraint,
    decls: &dyn DeclLookup,
    settings: &Settings,
) -> Result<()> {
    let mut analyzer = DcpAnalyzer::new(decls, settings);
    let (lhs, _) = analyzer.analyze(constraint.lhs())?;
    let (rhs, _) = analyzer.analyze(constraint.rhs())?;
    if constraint.relation().admits(lhs, rhs) {
        return Ok(());
    }
    Err(CvxError::not_dcp(
        constraint.span(),
        format!(
            "`{constraint}` relates a {lhs} left side to a {rhs} right side with `{}`",
            constraint.relation()
        ),
    ))
}
