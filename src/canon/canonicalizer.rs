//! Expression canonicalization.
//!
//! Canonicalization rewrites a DCP-valid problem into conic form:
//! - Affine parts are rebuilt as new affine expression trees
//! - Nonlinear atoms are replaced by an epigraph (or hypograph) variable plus
//!   linear constraints and cone memberships
//! - Declaration attributes become constraints
//!
//! Input trees must already be bound, shaped and DCP-analyzed. Every output
//! tree is re-checked against the problem and auxiliary declarations before
//! it is returned.

use std::collections::HashMap;
use std::mem;

use serde::Serialize;
use tracing::{debug, trace};

use super::cone::{AffineConstraint, ConeKind, ConeMembership, VarSlice};
use super::factor::{nsd_sqrt, psd_sqrt};
use crate::analysis::{bind, infer_shapes, static_bound};
use crate::atoms::{ArgRole, Atom, Recipe};
use crate::constraints::{Constraint, Relation};
use crate::dcp::{matrix_status, DcpAnalyzer, PsdStatus};
use crate::error::{CvxError, Fragment, Result, Span};
use crate::expr::{
    Array, BinaryOp, DeclKind, DeclLookup, DeclTable, Declaration, Derivation, Expr, ExprKind,
    Layered, Shape, Slice,
};
use crate::problem::Sense;
use crate::settings::Settings;

/// Reduced objective: a single scalar variable plus a constant offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonObjective {
    pub sense: Sense,
    /// Variable holding the objective value; `None` for a constant objective.
    pub variable: Option<String>,
    pub offset: f64,
}

/// Result of canonicalizing a problem.
#[derive(Debug, Clone)]
pub struct Canonical {
    pub objective: CanonObjective,
    /// Auxiliary variables, derived parameters and generated constants, in
    /// creation order.
    pub auxiliary: DeclTable,
    /// `lhs == rhs` rows.
    pub equalities: Vec<AffineConstraint>,
    /// `lhs <= rhs` rows.
    pub inequalities: Vec<AffineConstraint>,
    pub cones: Vec<ConeMembership>,
    /// Variables restricted to integer values.
    pub integers: Vec<String>,
}

/// Canonicalize an analyzed problem.
pub fn canonicalize(
    decls: &DeclTable,
    settings: &Settings,
    sense: Sense,
    objective: &Expr,
    constraints: &[Constraint],
) -> Result<Canonical> {
    let mut ctx = Canonicalizer::new(decls, settings);
    ctx.attribute_constraints()?;

    ctx.enter(Fragment::Objective);
    let objective = ctx.objective(sense, objective)?;

    for (index, constraint) in constraints.iter().enumerate() {
        ctx.enter(Fragment::Constraint {
            index,
            name: constraint.name().map(str::to_string),
        });
        ctx.constraint(constraint)?;
    }

    let mut canonical = Canonical {
        objective,
        auxiliary: ctx.aux,
        equalities: ctx.equalities,
        inequalities: ctx.inequalities,
        cones: ctx.cones,
        integers: ctx.integers,
    };
    verify(decls, settings, &mut canonical)?;
    debug!(
        auxiliary = canonical.auxiliary.len(),
        equalities = canonical.equalities.len(),
        inequalities = canonical.inequalities.len(),
        cones = canonical.cones.len(),
        "canonicalized problem"
    );
    Ok(canonical)
}

/// Context for canonicalization, tracking auxiliaries and generated constraints.
struct Canonicalizer<'a> {
    decls: &'a DeclTable,
    settings: &'a Settings,
    aux: DeclTable,
    /// Problem-local suffix for auxiliary names.
    counter: usize,
    equalities: Vec<AffineConstraint>,
    inequalities: Vec<AffineConstraint>,
    cones: Vec<ConeMembership>,
    integers: Vec<String>,
    /// Memoized factors by source name.
    factors: HashMap<String, String>,
    /// Memoized fixed scalars (`_one`, `_two`) by value bits.
    fixed: HashMap<u64, String>,
    /// Memoized identity constants by size.
    eyes: HashMap<usize, String>,
    fragment: String,
    origin: String,
}

fn leaf(name: &str) -> Expr {
    Expr::leaf(name, Span::default())
}

fn num(v: f64) -> Expr {
    Expr::number(v, Span::default())
}

fn neg(e: Expr) -> Expr {
    Expr::neg(e, Span::default())
}

fn transpose(e: Expr) -> Expr {
    Expr::call(Atom::Transpose, vec![e], Span::default())
}

fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(op, lhs, rhs, Span::default())
}

fn shape_of(e: &Expr) -> Result<Shape> {
    e.shape()
        .cloned()
        .ok_or_else(|| CvxError::Canonicalization(format!("`{e}` has not been analyzed")))
}

fn arg(args: &[Expr], i: usize, atom: Atom) -> Result<&Expr> {
    args.get(i).ok_or_else(|| {
        CvxError::Canonicalization(format!("`{atom}` is missing argument {}", i + 1))
    })
}

impl<'a> Canonicalizer<'a> {
    fn new(decls: &'a DeclTable, settings: &'a Settings) -> Self {
        Canonicalizer {
            decls,
            settings,
            aux: DeclTable::new(),
            counter: 0,
            equalities: Vec::new(),
            inequalities: Vec::new(),
            cones: Vec::new(),
            integers: Vec::new(),
            factors: HashMap::new(),
            fixed: HashMap::new(),
            eyes: HashMap::new(),
            fragment: String::new(),
            origin: String::new(),
        }
    }

    fn enter(&mut self, fragment: Fragment) {
        self.fragment = fragment.to_string();
        self.origin = self.fragment.clone();
    }

    fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.decls.get(name).or_else(|| self.aux.get(name))
    }

    fn is_taken(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// `_{tag}_{k}` for the next free `k`.
    fn fresh_name(&mut self, tag: &str) -> String {
        loop {
            let name = format!("_{tag}_{}", self.counter);
            self.counter += 1;
            if !self.is_taken(&name) {
                return name;
            }
        }
    }

    /// `base` itself if free, else `base` with a numeric suffix.
    fn unique_name(&mut self, base: String) -> String {
        let mut name = base.clone();
        while self.is_taken(&name) {
            name = format!("{base}_{}", self.counter);
            self.counter += 1;
        }
        name
    }

    fn add_aux(&mut self, decl: Declaration) -> Result<String> {
        let name = decl.name.clone();
        trace!(name = %name, kind = %decl.kind, shape = %decl.shape, origin = %self.origin, "auxiliary");
        self.aux.insert(decl)?;
        Ok(name)
    }

    fn new_variable(&mut self, tag: &str, shape: Shape) -> Result<String> {
        let name = self.fresh_name(tag);
        self.add_aux(Declaration::variable(name, shape))
    }

    /// Scalar variable fixed to `value` by an equality, shared per problem.
    fn fixed_scalar(&mut self, value: f64) -> Result<VarSlice> {
        if let Some(name) = self.fixed.get(&value.to_bits()) {
            return Ok(VarSlice::whole(name.clone(), 1));
        }
        let tag = match value {
            v if v == 1.0 => "one",
            v if v == 2.0 => "two",
            _ => "fixed",
        };
        let name = self.new_variable(tag, Shape::scalar())?;
        self.eq(leaf(&name), num(value));
        self.fixed.insert(value.to_bits(), name.clone());
        Ok(VarSlice::whole(name, 1))
    }

    /// n x n identity as a generated constant, shared per problem.
    fn eye(&mut self, n: usize) -> Result<String> {
        if let Some(name) = self.eyes.get(&n) {
            return Ok(name.clone());
        }
        let name = self.fresh_name("eye");
        let name = self.add_aux(Declaration::constant_value(name, Array::identity(n)))?;
        self.eyes.insert(n, name.clone());
        Ok(name)
    }

    /// A declared leaf that is already symmetric, by attribute or value.
    fn is_symmetric(&self, e: &Expr) -> bool {
        let Some(decl) = e.as_leaf().and_then(|name| self.decls.get(name)) else {
            return false;
        };
        let attrs = &decl.attributes;
        attrs.symmetric
            || attrs.psd
            || attrs.nsd
            || decl.value.as_ref().is_some_and(Array::is_symmetric)
    }

    fn eq(&mut self, lhs: Expr, rhs: Expr) {
        self.equalities
            .push(AffineConstraint::new(lhs, rhs, self.origin.clone()));
    }

    fn le(&mut self, lhs: Expr, rhs: Expr) {
        self.inequalities
            .push(AffineConstraint::new(lhs, rhs, self.origin.clone()));
    }

    fn cone(&mut self, kind: ConeKind, members: Vec<VarSlice>) {
        self.cones.push(ConeMembership {
            kind,
            members,
            origin: self.origin.clone(),
        });
    }

    /// The variable entries an affine expression denotes, binding it to a
    /// fresh auxiliary when it is not already a variable slice.
    fn as_slice(&mut self, expr: Expr, shape: &Shape, tag: &str) -> Result<VarSlice> {
        if self.settings.reuse_variable_slices {
            if let Some(slice) = self.variable_slice(&expr) {
                return Ok(slice);
            }
        }
        let name = self.new_variable(tag, shape.clone())?;
        self.eq(leaf(&name), expr);
        Ok(VarSlice::whole(name, shape.size()))
    }

    /// A whole variable, or a statically indexed stretch of a vector variable.
    fn variable_slice(&self, expr: &Expr) -> Option<VarSlice> {
        let lookup = Layered {
            base: self.decls,
            overlay: &self.aux,
        };
        match expr.kind() {
            ExprKind::Leaf(symbol) => {
                let decl = self.lookup(symbol.name())?;
                decl.is_variable()
                    .then(|| VarSlice::whole(decl.name.clone(), decl.shape.size()))
            }
            ExprKind::Index(base, slices) => {
                let decl = self.lookup(base.as_leaf()?)?;
                if !decl.is_variable() || !decl.shape.is_vector() || slices.len() != 1 {
                    return None;
                }
                let len = decl.shape.size();
                let end = |b: &Option<crate::expr::Bound>, default: usize| match b {
                    None => Some(default),
                    Some(b) => static_bound(b, &lookup),
                };
                let (lo, hi) = match &slices[0] {
                    Slice::All => (0, len),
                    Slice::Single(b) => {
                        let i = static_bound(b, &lookup)?;
                        (i, i + 1)
                    }
                    Slice::Range { start, stop } => (end(start, 0)?, end(stop, len)?),
                };
                (lo < hi && hi <= len).then(|| VarSlice {
                    name: decl.name.clone(),
                    start: lo,
                    len: hi - lo,
                })
            }
            _ => None,
        }
    }

    /// Rebuild `expr` as an affine tree, reducing every nonlinear atom.
    fn canon(&mut self, expr: &Expr) -> Result<Expr> {
        match expr.kind() {
            ExprKind::Leaf(_) | ExprKind::Number(_) => Ok(expr.clone()),
            ExprKind::Unary(op, operand) => {
                let operand = self.canon(operand)?;
                Ok(Expr::new(ExprKind::Unary(*op, Box::new(operand)), expr.span()))
            }
            ExprKind::Binary(op, lhs, rhs) => {
                // Data multipliers and denominators are kept as written.
                let (l, r) = match op {
                    BinaryOp::Mul | BinaryOp::MatMul if lhs.is_data() => {
                        (lhs.as_ref().clone(), self.canon(rhs)?)
                    }
                    BinaryOp::Mul | BinaryOp::MatMul | BinaryOp::Div if rhs.is_data() => {
                        (self.canon(lhs)?, rhs.as_ref().clone())
                    }
                    _ => (self.canon(lhs)?, self.canon(rhs)?),
                };
                Ok(Expr::binary(*op, l, r, expr.span()))
            }
            ExprKind::Index(base, slices) => {
                let base = self.canon(base)?;
                Ok(Expr::index(base, slices.clone(), expr.span()))
            }
            ExprKind::Call(atom, args) => {
                let origin = format!("`{atom}` in {}", self.fragment);
                let saved = mem::replace(&mut self.origin, origin);
                let result = self.canon_call(expr, *atom, args);
                self.origin = saved;
                result
            }
        }
    }

    fn canon_call(&mut self, expr: &Expr, atom: Atom, args: &[Expr]) -> Result<Expr> {
        let spec = atom.spec();
        if spec.recipe == Recipe::PassThrough {
            let mut out = Vec::with_capacity(args.len());
            for (i, a) in args.iter().enumerate() {
                out.push(match spec.arg(i).role {
                    ArgRole::Literal => a.clone(),
                    _ => self.canon(a)?,
                });
            }
            return Ok(Expr::call(atom, out, expr.span()));
        }

        trace!(atom = %atom, origin = %self.origin, "canonicalizing atom");
        let shape = shape_of(expr)?;
        let x = arg(args, 0, atom)?;
        let x_shape = shape_of(x)?;
        match atom {
            Atom::Norm2 => {
                let cx = self.canon(x)?;
                let xs = self.as_slice(cx, &x_shape, "norm2")?;
                let t = self.new_variable("norm2", Shape::scalar())?;
                self.cone(ConeKind::SecondOrder, vec![VarSlice::whole(&t, 1), xs]);
                Ok(leaf(&t))
            }
            Atom::SumSquares => {
                let cx = self.canon(x)?;
                let t = self.rotated_cone(cx, &x_shape, num(1.0), "sum_squares")?;
                Ok(leaf(&t))
            }
            Atom::QuadOverLin => {
                let cx = self.canon(x)?;
                let cy = self.canon(arg(args, 1, atom)?)?;
                let t = self.rotated_cone(cx, &x_shape, cy, "quad_over_lin")?;
                Ok(leaf(&t))
            }
            Atom::QuadForm => self.quad_form(x, &x_shape, arg(args, 1, atom)?),
            Atom::Norm1 => {
                let cx = self.canon(x)?;
                let s = self.new_variable("norm1", x_shape)?;
                self.le(cx.clone(), leaf(&s));
                self.le(neg(cx), leaf(&s));
                Ok(Expr::call(Atom::Sum, vec![leaf(&s)], Span::default()))
            }
            Atom::NormInf | Atom::Abs => {
                let cx = self.canon(x)?;
                let tag = if atom == Atom::Abs { "abs" } else { "norm_inf" };
                let t = self.new_variable(tag, shape)?;
                self.le(cx.clone(), leaf(&t));
                self.le(neg(cx), leaf(&t));
                Ok(leaf(&t))
            }
            Atom::Pos | Atom::NegPart => {
                let cx = self.canon(x)?;
                let (tag, cx) = if atom == Atom::Pos {
                    ("pos", cx)
                } else {
                    ("neg_part", neg(cx))
                };
                let t = self.new_variable(tag, shape)?;
                self.le(cx, leaf(&t));
                self.le(num(0.0), leaf(&t));
                Ok(leaf(&t))
            }
            Atom::Maximum | Atom::Minimum => {
                let reduced = args
                    .iter()
                    .map(|a| self.canon(a))
                    .collect::<Result<Vec<_>>>()?;
                let t = self.new_variable(atom.name(), shape)?;
                for a in reduced {
                    if atom == Atom::Maximum {
                        self.le(a, leaf(&t));
                    } else {
                        self.le(leaf(&t), a);
                    }
                }
                Ok(leaf(&t))
            }
            Atom::Exp | Atom::Log | Atom::Entropy => {
                let cx = self.canon(x)?;
                let xs = self.as_slice(cx, &x_shape, atom.name())?;
                let t = self.new_variable(atom.name(), shape)?;
                let ts = VarSlice::whole(&t, x_shape.size());
                let one = self.fixed_scalar(1.0)?;
                for i in 0..x_shape.size() {
                    let (xi, ti) = (xs.element(i), ts.element(i));
                    let members = match atom {
                        Atom::Exp => vec![xi, one.clone(), ti],
                        Atom::Log => vec![ti, one.clone(), xi],
                        _ => vec![ti, xi, one.clone()],
                    };
                    self.cone(ConeKind::Exponential, members);
                }
                Ok(leaf(&t))
            }
            Atom::Sqrt => {
                let cx = self.canon(x)?;
                self.root(cx, &x_shape)
            }
            Atom::Power => self.power(expr, x, &x_shape, args),
            Atom::LambdaMax => {
                let cx = self.canon(x)?;
                if !self.is_symmetric(&cx) {
                    self.eq(cx.clone(), transpose(cx.clone()));
                }
                let t = self.new_variable("lambda_max", Shape::scalar())?;
                let eye = self.eye(x_shape.rows())?;
                let shifted = bin(BinaryOp::Sub, bin(BinaryOp::Mul, leaf(&t), leaf(&eye)), cx);
                let z = self.as_slice(shifted, &x_shape, "lambda_max")?;
                self.cone(ConeKind::Psd, vec![z]);
                Ok(leaf(&t))
            }
            Atom::Sum
            | Atom::Reshape
            | Atom::Transpose
            | Atom::Trace
            | Atom::Diag
            | Atom::Vstack
            | Atom::Hstack => Err(CvxError::Canonicalization(format!(
                "`{atom}` has no conic recipe"
            ))),
        }
    }

    /// `t >= ||x||^2 / y` as the SOC `[t + y, 2x, t - y]`. Returns `t`.
    fn rotated_cone(&mut self, x: Expr, x_shape: &Shape, y: Expr, tag: &str) -> Result<String> {
        let scalar = Shape::scalar();
        let t = self.new_variable(tag, scalar.clone())?;
        let upper = self.as_slice(bin(BinaryOp::Add, leaf(&t), y.clone()), &scalar, tag)?;
        let middle = self.as_slice(bin(BinaryOp::Mul, num(2.0), x), x_shape, tag)?;
        let lower = self.as_slice(bin(BinaryOp::Sub, leaf(&t), y), &scalar, tag)?;
        self.cone(ConeKind::SecondOrder, vec![upper, middle, lower]);
        Ok(t)
    }

    /// Elementwise `t <= sqrt(x)` as the SOCs `[x + 1, 2t, x - 1]`.
    fn root(&mut self, cx: Expr, x_shape: &Shape) -> Result<Expr> {
        let t = self.new_variable("sqrt", x_shape.clone())?;
        let upper = self.as_slice(bin(BinaryOp::Add, cx.clone(), num(1.0)), x_shape, "sqrt")?;
        let middle = self.as_slice(bin(BinaryOp::Mul, num(2.0), leaf(&t)), x_shape, "sqrt")?;
        let lower = self.as_slice(bin(BinaryOp::Sub, cx, num(1.0)), x_shape, "sqrt")?;
        for i in 0..x_shape.size() {
            let members = vec![upper.element(i), middle.element(i), lower.element(i)];
            self.cone(ConeKind::SecondOrder, members);
        }
        Ok(leaf(&t))
    }

    fn power(&mut self, expr: &Expr, x: &Expr, x_shape: &Shape, args: &[Expr]) -> Result<Expr> {
        let p = arg(args, 1, Atom::Power)?.literal_value().ok_or_else(|| {
            CvxError::Canonicalization(format!("`{expr}` has a non-literal exponent"))
        })?;
        let cx = self.canon(x)?;
        match p {
            p if p == 1.0 => Ok(cx),
            p if p == 0.0 => Ok(bin(BinaryOp::Add, bin(BinaryOp::Mul, num(0.0), cx), num(1.0))),
            p if p == 0.5 => self.root(cx, x_shape),
            p if p == 2.0 => {
                let t = self.new_variable("power", x_shape.clone())?;
                let upper = self.as_slice(bin(BinaryOp::Add, leaf(&t), num(1.0)), x_shape, "power")?;
                let middle = self.as_slice(bin(BinaryOp::Mul, num(2.0), cx), x_shape, "power")?;
                let lower = self.as_slice(bin(BinaryOp::Sub, leaf(&t), num(1.0)), x_shape, "power")?;
                for i in 0..x_shape.size() {
                    let members = vec![upper.element(i), middle.element(i), lower.element(i)];
                    self.cone(ConeKind::SecondOrder, members);
                }
                Ok(leaf(&t))
            }
            p if p == -1.0 => {
                // t >= 1/x as x t >= 1: [x + t, 2, x - t].
                let t = self.new_variable("power", x_shape.clone())?;
                let upper = self.as_slice(bin(BinaryOp::Add, cx.clone(), leaf(&t)), x_shape, "power")?;
                let two = self.fixed_scalar(2.0)?;
                let lower = self.as_slice(bin(BinaryOp::Sub, cx, leaf(&t)), x_shape, "power")?;
                for i in 0..x_shape.size() {
                    let members = vec![upper.element(i), two.clone(), lower.element(i)];
                    self.cone(ConeKind::SecondOrder, members);
                }
                Ok(leaf(&t))
            }
            p => Err(CvxError::Canonicalization(format!(
                "`{expr}`: exponent {p} has no conic recipe"
            ))),
        }
    }

    /// `x' P x` through `F x` with `F' F = P` (or `-P` for NSD `P`).
    fn quad_form(&mut self, x: &Expr, x_shape: &Shape, p: &Expr) -> Result<Expr> {
        let lookup = Layered {
            base: self.decls,
            overlay: &self.aux,
        };
        let nsd = match matrix_status(p, &lookup) {
            Some(PsdStatus::Psd) => false,
            Some(PsdStatus::Nsd) => true,
            _ => {
                return Err(CvxError::Canonicalization(format!(
                    "`{p}` is neither psd nor nsd"
                )))
            }
        };
        let f = self.factor(p, nsd)?;
        let cx = self.canon(x)?;
        let op = if x_shape.is_scalar() {
            BinaryOp::Mul
        } else {
            BinaryOp::MatMul
        };
        let t = self.rotated_cone(bin(op, f, cx), x_shape, num(1.0), "quad_form")?;
        Ok(if nsd { neg(leaf(&t)) } else { leaf(&t) })
    }

    /// Square-root factor of the data `p` as an expression.
    fn factor(&mut self, p: &Expr, nsd: bool) -> Result<Expr> {
        if let Some(v) = p.literal_value() {
            let v = if nsd { -v } else { v };
            return Ok(num(v.max(0.0).sqrt()));
        }
        let name = p
            .as_leaf()
            .ok_or_else(|| CvxError::Canonicalization(format!("cannot factor `{p}`")))?;
        if let Some(factor) = self.factors.get(name) {
            return Ok(leaf(factor));
        }
        let source = self
            .lookup(name)
            .cloned()
            .ok_or_else(|| CvxError::Reference {
                name: name.to_string(),
                span: p.span(),
            })?;
        let factor_name = self.unique_name(format!("_{name}_sqrt"));
        let decl = match (&source.value, source.kind) {
            (Some(value), _) => {
                let f = if nsd { nsd_sqrt(value) } else { psd_sqrt(value) };
                let f = f.ok_or_else(|| {
                    CvxError::Canonicalization(format!("`{name}` has no square-root factor"))
                })?;
                Declaration::constant_value(factor_name, f)
            }
            (None, DeclKind::Parameter) | (None, DeclKind::Constant) => {
                let derivation = if nsd {
                    Derivation::NsdSqrt(name.to_string())
                } else {
                    Derivation::PsdSqrt(name.to_string())
                };
                Declaration::parameter(factor_name, source.shape.clone()).derived(derivation)
            }
            (None, DeclKind::Variable) => {
                return Err(CvxError::Canonicalization(format!(
                    "`{name}` is a variable and cannot be factored"
                )))
            }
        };
        let factor_name = self.add_aux(decl)?;
        self.factors.insert(name.to_string(), factor_name.clone());
        Ok(leaf(&factor_name))
    }

    /// Constraints implied by variable attributes, in declaration order.
    fn attribute_constraints(&mut self) -> Result<()> {
        let variables: Vec<Declaration> = self.decls.of_kind(DeclKind::Variable).cloned().collect();
        for decl in &variables {
            self.enter(Fragment::Declaration(decl.name.clone()));
            let x = || leaf(&decl.name);
            let attrs = &decl.attributes;
            if attrs.nonneg {
                self.le(num(0.0), x());
            }
            if attrs.nonpos {
                self.le(x(), num(0.0));
            }
            if let Some(lower) = attrs.lower {
                self.le(num(lower), x());
            }
            if let Some(upper) = attrs.upper {
                self.le(x(), num(upper));
            }
            if attrs.binary {
                self.le(num(0.0), x());
                self.le(x(), num(1.0));
            }
            if attrs.integer || attrs.binary {
                self.integers.push(decl.name.clone());
            }
            if attrs.symmetric || attrs.psd || attrs.nsd {
                self.eq(x(), transpose(x()));
            }
            if attrs.psd {
                self.cone(ConeKind::Psd, vec![VarSlice::whole(&decl.name, decl.shape.size())]);
            }
            if attrs.nsd {
                let m = self.new_variable("nsd", decl.shape.clone())?;
                self.eq(leaf(&m), neg(x()));
                self.cone(ConeKind::Psd, vec![VarSlice::whole(m, decl.shape.size())]);
            }
        }
        Ok(())
    }

    fn objective(&mut self, sense: Sense, objective: &Expr) -> Result<CanonObjective> {
        let reduced = self.canon(objective)?;
        if let Some(offset) = reduced.literal_value() {
            return Ok(CanonObjective {
                sense,
                variable: None,
                offset,
            });
        }
        let direct = reduced
            .as_leaf()
            .and_then(|name| self.lookup(name))
            .filter(|d| d.is_variable() && d.shape.is_scalar())
            .map(|d| d.name.clone());
        let variable = match direct {
            Some(name) => name,
            None => {
                let t = self.new_variable("objective", Shape::scalar())?;
                self.eq(leaf(&t), reduced);
                t
            }
        };
        Ok(CanonObjective {
            sense,
            variable: Some(variable),
            offset: 0.0,
        })
    }

    fn constraint(&mut self, constraint: &Constraint) -> Result<()> {
        let lhs = self.canon(constraint.lhs())?;
        let rhs = self.canon(constraint.rhs())?;
        match constraint.relation() {
            Relation::Eq => self.eq(lhs, rhs),
            Relation::Le => self.le(lhs, rhs),
            Relation::Ge => self.le(rhs, lhs),
        }
        Ok(())
    }
}

/// Re-bind, re-shape and re-check every generated row and cone.
fn verify(decls: &DeclTable, settings: &Settings, out: &mut Canonical) -> Result<()> {
    let lookup = Layered {
        base: decls,
        overlay: &out.auxiliary,
    };
    for row in out.equalities.iter_mut().chain(out.inequalities.iter_mut()) {
        row.lhs.clear_annotations();
        row.rhs.clear_annotations();
        let fail = |e: CvxError| {
            CvxError::Canonicalization(format!(
                "{}: `{}` vs `{}`: {e}",
                row.origin, row.lhs, row.rhs
            ))
        };
        let lhs = verify_affine(&row.lhs, &lookup, settings).map_err(fail)?;
        let rhs = verify_affine(&row.rhs, &lookup, settings).map_err(fail)?;
        if lhs.elementwise(&rhs).is_none() {
            return Err(CvxError::Canonicalization(format!(
                "{}: sides have shapes {lhs} and {rhs}",
                row.origin
            )));
        }
    }
    for cone in &out.cones {
        verify_cone(cone, &lookup)?;
    }
    if let Some(name) = &out.objective.variable {
        if !lookup.lookup(name).is_some_and(|d| d.is_variable() && d.shape.is_scalar()) {
            return Err(CvxError::Canonicalization(format!(
                "objective variable `{name}` is not a scalar variable"
            )));
        }
    }
    Ok(())
}

fn verify_affine(expr: &Expr, lookup: &dyn DeclLookup, settings: &Settings) -> Result<Shape> {
    bind(expr, lookup)?;
    let shape = infer_shapes(expr, lookup)?;
    let (curvature, _) = DcpAnalyzer::new(lookup, settings).analyze(expr)?;
    if !curvature.is_affine() {
        return Err(CvxError::Canonicalization(format!(
            "`{expr}` is {curvature}, not affine"
        )));
    }
    Ok(shape)
}

fn verify_cone(cone: &ConeMembership, lookup: &dyn DeclLookup) -> Result<()> {
    let fail = |message: String| Err(CvxError::Canonicalization(format!("{}: {message}", cone.origin)));
    for member in &cone.members {
        let Some(decl) = lookup.lookup(&member.name).filter(|d| d.is_variable()) else {
            return fail(format!("cone member `{}` is not a variable", member.name));
        };
        if member.len == 0 || member.end() > decl.shape.size() {
            return fail(format!("cone member {member} is out of range for {}", decl.shape));
        }
    }
    match cone.kind {
        ConeKind::None => fail("membership without a cone".into()),
        ConeKind::SecondOrder if cone.dim() < 2 => fail("second-order cone of dimension < 2".into()),
        ConeKind::Exponential if cone.members.len() != 3 || cone.dim() != 3 => {
            fail("exponential cone needs three scalar members".into())
        }
        ConeKind::Psd => {
            let square = match cone.members.as_slice() {
                [m] => lookup
                    .lookup(&m.name)
                    .is_some_and(|d| d.shape.is_square() && m.start == 0 && m.len == d.shape.size()),
                _ => false,
            };
            if square {
                Ok(())
            } else {
                fail("psd cone needs one whole square matrix".into())
            }
        }
        _ => Ok(()),
    }
}
