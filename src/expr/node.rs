//! Expression trees.
//!
//! Every node owns its children. Analysis passes annotate nodes through
//! write-once caches; rewrites always build new trees.

use std::fmt;
use std::sync::OnceLock;

use serde::{Serialize, Serializer};

use super::declaration::DeclKind;
use super::shape::Shape;
use crate::atoms::Atom;
use crate::dcp::{Curvature, Sign};
use crate::error::Span;

/// Reference to a declaration by name.
#[derive(Debug, Clone)]
pub struct Symbol {
    name: String,
    binding: OnceLock<DeclKind>,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol {
            name: name.into(),
            binding: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of the declaration this symbol resolved to, once bound.
    pub fn binding(&self) -> Option<DeclKind> {
        self.binding.get().copied()
    }

    pub(crate) fn bind(&self, kind: DeclKind) {
        let _ = self.binding.set(kind);
    }

    fn clear(&mut self) {
        self.binding = OnceLock::new();
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    MatMul,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::MatMul => "@",
        }
    }
}

/// One end of a slice.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Literal(usize),
    Symbol(Symbol),
}

/// One entry of an index expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Slice {
    /// `x[i]`, drops the dimension.
    Single(Bound),
    /// `x[a:b]`, either end may be omitted.
    Range {
        start: Option<Bound>,
        stop: Option<Bound>,
    },
    /// `x[:]`.
    All,
}

impl Slice {
    /// `start:stop` with literal bounds.
    pub fn range(start: usize, stop: usize) -> Self {
        Slice::Range {
            start: Some(Bound::Literal(start)),
            stop: Some(Bound::Literal(stop)),
        }
    }

    fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        let bounds: [Option<&Bound>; 2] = match self {
            Slice::Single(b) => [Some(b), None],
            Slice::Range { start, stop } => [start.as_ref(), stop.as_ref()],
            Slice::All => [None, None],
        };
        bounds.into_iter().flatten().filter_map(|b| match b {
            Bound::Symbol(s) => Some(s),
            Bound::Literal(_) => None,
        })
    }

    fn symbols_mut(&mut self) -> impl Iterator<Item = &mut Symbol> {
        let bounds: [Option<&mut Bound>; 2] = match self {
            Slice::Single(b) => [Some(b), None],
            Slice::Range { start, stop } => [start.as_mut(), stop.as_mut()],
            Slice::All => [None, None],
        };
        bounds.into_iter().flatten().filter_map(|b| match b {
            Bound::Symbol(s) => Some(s),
            Bound::Literal(_) => None,
        })
    }
}

/// Node variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Reference to a variable, parameter or constant.
    Leaf(Symbol),
    /// Numeric literal.
    Number(f64),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Atom call with ordered arguments.
    Call(Atom, Vec<Expr>),
    Index(Box<Expr>, Vec<Slice>),
}

/// An expression node with its source span and analysis caches.
#[derive(Debug, Clone)]
pub struct Expr {
    kind: ExprKind,
    span: Span,
    shape: OnceLock<Shape>,
    curvature: OnceLock<Curvature>,
    sign: OnceLock<Sign>,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr {
            kind,
            span,
            shape: OnceLock::new(),
            curvature: OnceLock::new(),
            sign: OnceLock::new(),
        }
    }

    pub fn leaf(name: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Leaf(Symbol::new(name)), span)
    }

    pub fn number(value: f64, span: Span) -> Self {
        Self::new(ExprKind::Number(value), span)
    }

    pub fn neg(operand: Expr, span: Span) -> Self {
        Self::new(ExprKind::Unary(UnaryOp::Neg, Box::new(operand)), span)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, span: Span) -> Self {
        Self::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), span)
    }

    pub fn call(atom: Atom, args: Vec<Expr>, span: Span) -> Self {
        Self::new(ExprKind::Call(atom, args), span)
    }

    pub fn index(base: Expr, slices: Vec<Slice>, span: Span) -> Self {
        Self::new(ExprKind::Index(Box::new(base), slices), span)
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Inferred shape, once the shape pass has run.
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.get()
    }

    /// Curvature, once the DCP pass has run.
    pub fn curvature(&self) -> Option<Curvature> {
        self.curvature.get().copied()
    }

    /// Sign, once the DCP pass has run.
    pub fn sign(&self) -> Option<Sign> {
        self.sign.get().copied()
    }

    pub(crate) fn annotate_shape(&self, shape: Shape) {
        let _ = self.shape.set(shape);
    }

    pub(crate) fn annotate_dcp(&self, curvature: Curvature, sign: Sign) {
        let _ = self.curvature.set(curvature);
        let _ = self.sign.set(sign);
    }

    /// Drop every cached annotation and binding in the tree.
    pub fn clear_annotations(&mut self) {
        self.shape = OnceLock::new();
        self.curvature = OnceLock::new();
        self.sign = OnceLock::new();
        match &mut self.kind {
            ExprKind::Leaf(symbol) => symbol.clear(),
            ExprKind::Number(_) => {}
            ExprKind::Unary(_, child) => child.clear_annotations(),
            ExprKind::Binary(_, lhs, rhs) => {
                lhs.clear_annotations();
                rhs.clear_annotations();
            }
            ExprKind::Call(_, args) => args.iter_mut().for_each(Expr::clear_annotations),
            ExprKind::Index(base, slices) => {
                base.clear_annotations();
                slices
                    .iter_mut()
                    .flat_map(Slice::symbols_mut)
                    .for_each(Symbol::clear);
            }
        }
    }

    /// Direct children, left to right. Index bounds are not children.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Leaf(_) | ExprKind::Number(_) => Vec::new(),
            ExprKind::Unary(_, child) => vec![&**child],
            ExprKind::Binary(_, lhs, rhs) => vec![&**lhs, &**rhs],
            ExprKind::Call(_, args) => args.iter().collect(),
            ExprKind::Index(base, _) => vec![&**base],
        }
    }

    /// Every symbol in the tree, including index bounds, left to right.
    pub fn symbols(&self) -> Vec<&Symbol> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols<'a>(&'a self, out: &mut Vec<&'a Symbol>) {
        match &self.kind {
            ExprKind::Leaf(symbol) => out.push(symbol),
            ExprKind::Index(base, slices) => {
                base.collect_symbols(out);
                out.extend(slices.iter().flat_map(Slice::symbols));
            }
            _ => {
                for child in self.children() {
                    child.collect_symbols(out);
                }
            }
        }
    }

    /// True when no leaf refers to a variable. Unbound leaves count as variables.
    pub fn is_data(&self) -> bool {
        match &self.kind {
            ExprKind::Leaf(symbol) => symbol.binding().is_some_and(DeclKind::is_data),
            _ => self.children().into_iter().all(Expr::is_data),
        }
    }

    /// Value of a numeric literal, folding a leading negation.
    pub fn literal_value(&self) -> Option<f64> {
        match &self.kind {
            ExprKind::Number(v) => Some(*v),
            ExprKind::Unary(UnaryOp::Neg, child) => child.literal_value().map(|v| -v),
            _ => None,
        }
    }

    /// Name of the leaf, if this is one.
    pub fn as_leaf(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Leaf(symbol) => Some(symbol.name()),
            _ => None,
        }
    }
}

fn fmt_operand(expr: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match expr.kind {
        ExprKind::Binary(..) | ExprKind::Unary(..) => write!(f, "({expr})"),
        ExprKind::Number(v) if v < 0.0 => write!(f, "({expr})"),
        _ => write!(f, "{expr}"),
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Literal(n) => write!(f, "{n}"),
            Bound::Symbol(s) => write!(f, "{}", s.name()),
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slice::Single(b) => write!(f, "{b}"),
            Slice::Range { start, stop } => {
                if let Some(start) = start {
                    write!(f, "{start}")?;
                }
                write!(f, ":")?;
                if let Some(stop) = stop {
                    write!(f, "{stop}")?;
                }
                Ok(())
            }
            Slice::All => write!(f, ":"),
        }
    }
}

/// Renders parseable source text. Compound operands are parenthesized.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Leaf(symbol) => write!(f, "{}", symbol.name()),
            ExprKind::Number(v) => write!(f, "{v}"),
            ExprKind::Unary(UnaryOp::Neg, child) => {
                write!(f, "-")?;
                fmt_operand(child, f)
            }
            ExprKind::Binary(op, lhs, rhs) => {
                fmt_operand(lhs, f)?;
                write!(f, " {} ", op.symbol())?;
                fmt_operand(rhs, f)
            }
            ExprKind::Call(atom, args) => {
                write!(f, "{}(", atom.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            ExprKind::Index(base, slices) => {
                fmt_operand(base, f)?;
                write!(f, "[")?;
                for (i, slice) in slices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{slice}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::leaf("x", Span::default())
    }

    #[test]
    fn test_display_parenthesizes_operands() {
        let sum = Expr::binary(BinaryOp::Add, x(), Expr::number(1.0, Span::default()), Span::default());
        let scaled = Expr::binary(
            BinaryOp::Mul,
            Expr::number(2.0, Span::default()),
            sum,
            Span::default(),
        );
        assert_eq!(scaled.to_string(), "2 * (x + 1)");

        let call = Expr::call(Atom::Norm2, vec![Expr::neg(x(), Span::default())], Span::default());
        assert_eq!(call.to_string(), "norm2(-x)");

        let idx = Expr::index(x(), vec![Slice::range(0, 10), Slice::All], Span::default());
        assert_eq!(idx.to_string(), "x[0:10, :]");
    }

    #[test]
    fn test_caches_are_write_once() {
        let e = x();
        assert!(e.shape().is_none());
        e.annotate_shape(Shape::vector(3));
        e.annotate_shape(Shape::vector(4));
        assert_eq!(e.shape(), Some(&Shape::vector(3)));
    }

    #[test]
    fn test_clear_annotations() {
        let mut e = Expr::neg(x(), Span::default());
        e.annotate_dcp(Curvature::Affine, Sign::Unknown);
        e.symbols()[0].bind(DeclKind::Variable);
        e.clear_annotations();
        assert!(e.curvature().is_none());
        assert!(e.symbols()[0].binding().is_none());
    }

    #[test]
    fn test_is_data() {
        let p = Expr::leaf("p", Span::default());
        p.symbols()[0].bind(DeclKind::Parameter);
        let v = x();
        v.symbols()[0].bind(DeclKind::Variable);
        assert!(p.is_data());
        assert!(!v.is_data());
        assert!(Expr::number(3.0, Span::default()).is_data());
        assert!(!Expr::binary(BinaryOp::Mul, p, v, Span::default()).is_data());
    }

    #[test]
    fn test_literal_value_folds_negation() {
        let e = Expr::neg(Expr::number(1.0, Span::default()), Span::default());
        assert_eq!(e.literal_value(), Some(-1.0));
        assert_eq!(x().literal_value(), None);
    }
}
