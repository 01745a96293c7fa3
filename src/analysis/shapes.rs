//! Shape inference.
//!
//! Shapes are computed bottom-up and cached on every node. Index bounds are
//! checked statically where they are known; a Parameter bound is accepted for
//! a single index and checked by whoever supplies its value.

use super::binder::slice_bounds;
use crate::atoms::{Atom, ShapeRule};
use crate::error::{CvxError, Result};
use crate::expr::{BinaryOp, Bound, DeclKind, DeclLookup, Expr, ExprKind, Shape, Slice};

/// Infer and record the shape of every node in `expr`.
pub fn infer_shapes(expr: &Expr, decls: &dyn DeclLookup) -> Result<Shape> {
    if let Some(shape) = expr.shape() {
        return Ok(shape.clone());
    }
    let shape = match expr.kind() {
        ExprKind::Leaf(symbol) => decls
            .lookup(symbol.name())
            .map(|d| d.shape.clone())
            .ok_or_else(|| CvxError::Reference {
                name: symbol.name().to_string(),
                span: expr.span(),
            })?,
        ExprKind::Number(_) => Shape::scalar(),
        ExprKind::Unary(_, operand) => infer_shapes(operand, decls)?,
        ExprKind::Binary(op, lhs, rhs) => {
            let l = infer_shapes(lhs, decls)?;
            let r = infer_shapes(rhs, decls)?;
            binary_shape(expr, *op, &l, &r)?
        }
        ExprKind::Call(atom, args) => {
            let shapes = args
                .iter()
                .map(|a| infer_shapes(a, decls))
                .collect::<Result<Vec<_>>>()?;
            call_shape(expr, *atom, args, &shapes)?
        }
        ExprKind::Index(base, slices) => {
            let base_shape = infer_shapes(base, decls)?;
            index_shape(expr, &base_shape, slices, decls)?
        }
    };
    expr.annotate_shape(shape.clone());
    Ok(shape)
}

fn binary_shape(expr: &Expr, op: BinaryOp, l: &Shape, r: &Shape) -> Result<Shape> {
    let result = match op {
        BinaryOp::MatMul => l.matmul(r),
        _ => l.elementwise(r),
    };
    result.ok_or_else(|| {
        CvxError::shape(
            expr.span(),
            format!("`{}` operands have incompatible shapes {l} and {r}", op.symbol()),
        )
    })
}

/// Nonnegative integer value of a literal argument.
fn literal_usize(expr: &Expr) -> Option<usize> {
    expr.literal_value()
        .filter(|v| *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as usize)
}

fn call_shape(expr: &Expr, atom: Atom, args: &[Expr], shapes: &[Shape]) -> Result<Shape> {
    let err = |message: String| Err(CvxError::shape(expr.span(), format!("`{atom}`: {message}")));
    let Some(first) = shapes.first() else {
        return err("no arguments".into());
    };
    match atom.spec().shape {
        ShapeRule::Scalar => Ok(Shape::scalar()),
        ShapeRule::Elementwise => Ok(first.clone()),
        ShapeRule::Broadcast => {
            let mut acc = first.clone();
            for s in &shapes[1..] {
                match acc.elementwise(s) {
                    Some(next) => acc = next,
                    None => {
                        return err(format!("arguments have incompatible shapes {acc} and {s}"))
                    }
                }
            }
            Ok(acc)
        }
        ShapeRule::Sum => match args.get(1) {
            None => Ok(Shape::scalar()),
            Some(axis) => {
                let Some(axis) = literal_usize(axis) else {
                    return err(format!("axis `{axis}` is not a nonnegative integer"));
                };
                match first.drop_axis(axis) {
                    Some(shape) => Ok(shape),
                    None => err(format!("axis {axis} is out of range for shape {first}")),
                }
            }
        },
        ShapeRule::Reshape => {
            let dims = (args.get(1).and_then(literal_usize), args.get(2).and_then(literal_usize));
            let (Some(m), Some(n)) = dims else {
                return err("dimensions must be nonnegative integers".into());
            };
            if m.checked_mul(n) != Some(first.size()) {
                return err(format!("cannot reshape {first} into ({m}, {n})"));
            }
            Ok(Shape::matrix(m, n))
        }
        ShapeRule::Transpose => Ok(first.transpose()),
        ShapeRule::SquareToScalar => {
            if first.is_square() {
                Ok(Shape::scalar())
            } else {
                err(format!("requires a square matrix, found {first}"))
            }
        }
        ShapeRule::Diag => match first.dims() {
            [n] => Ok(Shape::matrix(*n, *n)),
            [m, n] if m == n => Ok(Shape::vector(*n)),
            _ => err(format!("requires a vector or a square matrix, found {first}")),
        },
        ShapeRule::Vstack => {
            let cols = row_block_cols(first);
            let mut rows = 0;
            for s in shapes {
                if row_block_cols(s) != cols {
                    return err(format!("column counts differ: {first} and {s}"));
                }
                rows += if s.is_matrix() { s.rows() } else { 1 };
            }
            Ok(Shape::matrix(rows, cols))
        }
        ShapeRule::Hstack => {
            if shapes.iter().all(|s| s.ndim() <= 1) {
                return Ok(Shape::vector(shapes.iter().map(Shape::size).sum()));
            }
            if !shapes.iter().all(Shape::is_matrix) {
                return err("cannot mix matrices with vectors or scalars".into());
            }
            let rows = first.rows();
            if let Some(s) = shapes.iter().find(|s| s.rows() != rows) {
                return err(format!("row counts differ: {first} and {s}"));
            }
            Ok(Shape::matrix(rows, shapes.iter().map(Shape::cols).sum()))
        }
        ShapeRule::QuadForm => {
            let Some(p) = shapes.get(1) else {
                return err("missing P".into());
            };
            match (first.dims(), p.dims()) {
                ([], []) => Ok(Shape::scalar()),
                ([n], [a, b]) if n == a && a == b => Ok(Shape::scalar()),
                _ => err(format!("x has shape {first} but P has shape {p}")),
            }
        }
        ShapeRule::QuadOverLin => match shapes.get(1) {
            Some(y) if y.is_scalar() => Ok(Shape::scalar()),
            Some(y) => err(format!("y must be a scalar, found {y}")),
            None => err("missing y".into()),
        },
    }
}

/// Columns of a shape promoted to a row block (scalar and vector as one row).
fn row_block_cols(shape: &Shape) -> usize {
    match shape.dims() {
        [] => 1,
        [n] => *n,
        [_, n, ..] => *n,
    }
}

/// One end of a range, or the bound that keeps it from being static.
fn range_end<'b>(
    bound: &'b Option<Bound>,
    default: usize,
    decls: &dyn DeclLookup,
) -> std::result::Result<usize, &'b Bound> {
    match bound {
        None => Ok(default),
        Some(b) => static_bound(b, decls).ok_or(b),
    }
}

/// Statically known value of an index bound.
///
/// Literals and Constants with a scalar integral value resolve; anything else
/// is `None`.
pub fn static_bound(bound: &Bound, decls: &dyn DeclLookup) -> Option<usize> {
    match bound {
        Bound::Literal(n) => Some(*n),
        Bound::Symbol(symbol) => {
            let decl = decls.lookup(symbol.name())?;
            if decl.kind != DeclKind::Constant {
                return None;
            }
            let v = decl.value.as_ref()?.as_scalar()?;
            (v >= 0.0 && v.fract() == 0.0).then_some(v as usize)
        }
    }
}

fn index_shape(
    expr: &Expr,
    base: &Shape,
    slices: &[Slice],
    decls: &dyn DeclLookup,
) -> Result<Shape> {
    let err = |message: String| Err(CvxError::shape(expr.span(), message));
    if slices.len() > base.ndim() {
        return err(format!(
            "{} indices given for an expression of shape {base}",
            slices.len()
        ));
    }
    for slice in slices {
        for bound in slice_bounds(slice) {
            if let Bound::Symbol(symbol) = bound {
                let kind = decls.lookup(symbol.name()).map(|d| d.kind);
                if kind == Some(DeclKind::Variable) {
                    return err(format!("index `{}` is a variable", symbol.name()));
                }
            }
        }
    }

    let mut dims = Vec::with_capacity(base.ndim());
    for (axis, (slice, &len)) in slices.iter().zip(base.dims()).enumerate() {
        match slice {
            Slice::All => dims.push(len),
            Slice::Single(bound) => match static_bound(bound, decls) {
                Some(i) if i >= len => {
                    return err(format!(
                        "index {i} is out of range for axis {axis} of length {len}"
                    ));
                }
                Some(_) => {}
                None => {
                    let scalar = match bound {
                        Bound::Symbol(s) => {
                            decls.lookup(s.name()).is_some_and(|d| d.shape.is_scalar())
                        }
                        Bound::Literal(_) => true,
                    };
                    if !scalar {
                        return err(format!("index `{bound}` is not a scalar"));
                    }
                }
            },
            Slice::Range { start, stop } => {
                let ends = (range_end(start, 0, decls), range_end(stop, len, decls));
                let (lo, hi) = match ends {
                    (Ok(lo), Ok(hi)) => (lo, hi),
                    (Err(b), _) | (_, Err(b)) => {
                        return err(format!("the length of range `{slice}` depends on `{b}`"));
                    }
                };
                if hi > len {
                    return err(format!(
                        "range {lo}:{hi} is out of range for axis {axis} of length {len}"
                    ));
                }
                if lo >= hi {
                    return err(format!("range {lo}:{hi} is empty"));
                }
                dims.push(hi - lo);
            }
        }
    }
    dims.extend_from_slice(&base.dims()[slices.len()..]);
    Ok(Shape::from_dims(dims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::bind;
    use crate::error::ErrorKind;
    use crate::expr::{DeclTable, Declaration};
    use crate::frontend::parse_expression;

    fn table() -> DeclTable {
        let mut t = DeclTable::new();
        for d in [
            Declaration::variable("x", 10),
            Declaration::variable("y", 3),
            Declaration::variable("s", ()),
            Declaration::variable("X", (3, 4)),
            Declaration::variable("S", (3, 3)),
            Declaration::parameter("A", (4, 10)),
            Declaration::parameter("k", ()),
            Declaration::parameter("P", (10, 10)).psd(),
            Declaration::constant_value("two", 2.0),
            Declaration::constant("c", ()),
        ] {
            t.insert(d).unwrap();
        }
        t
    }

    fn shape_of(src: &str) -> Result<Shape> {
        let t = table();
        let e = parse_expression(src).unwrap();
        bind(&e, &t)?;
        infer_shapes(&e, &t)
    }

    struct TestCase {
        src: &'static str,
        shape: Shape,
    }

    #[test]
    fn test_valid_shapes() {
        let cases = [
            TestCase { src: "x + 1", shape: Shape::vector(10) },
            TestCase { src: "2 * x - x", shape: Shape::vector(10) },
            TestCase { src: "A @ x", shape: Shape::vector(4) },
            TestCase { src: "x @ x", shape: Shape::scalar() },
            TestCase { src: "X @ A", shape: Shape::matrix(3, 10) },
            TestCase { src: "y @ X", shape: Shape::vector(4) },
            TestCase { src: "sum(X)", shape: Shape::scalar() },
            TestCase { src: "sum(X, 0)", shape: Shape::vector(4) },
            TestCase { src: "sum(X, 1)", shape: Shape::vector(3) },
            TestCase { src: "reshape(X, 2, 6)", shape: Shape::matrix(2, 6) },
            TestCase { src: "transpose(X)", shape: Shape::matrix(4, 3) },
            TestCase { src: "transpose(x)", shape: Shape::vector(10) },
            TestCase { src: "trace(S)", shape: Shape::scalar() },
            TestCase { src: "diag(y)", shape: Shape::matrix(3, 3) },
            TestCase { src: "diag(S)", shape: Shape::vector(3) },
            TestCase { src: "vstack(y, y, S)", shape: Shape::matrix(5, 3) },
            TestCase { src: "vstack(s, s)", shape: Shape::matrix(2, 1) },
            TestCase { src: "hstack(x, y, s)", shape: Shape::vector(14) },
            TestCase { src: "hstack(X, S)", shape: Shape::matrix(3, 7) },
            TestCase { src: "norm2(X)", shape: Shape::scalar() },
            TestCase { src: "abs(X)", shape: Shape::matrix(3, 4) },
            TestCase { src: "maximum(x, 0, s)", shape: Shape::vector(10) },
            TestCase { src: "quad_form(x, P)", shape: Shape::scalar() },
            TestCase { src: "quad_form(s, 2)", shape: Shape::scalar() },
            TestCase { src: "quad_over_lin(X, s)", shape: Shape::scalar() },
            TestCase { src: "x ** 2", shape: Shape::vector(10) },
            TestCase { src: "lambda_max(S)", shape: Shape::scalar() },
            TestCase { src: "x[0:10]", shape: Shape::vector(10) },
            TestCase { src: "x[2:]", shape: Shape::vector(8) },
            TestCase { src: "x[:two]", shape: Shape::vector(2) },
            TestCase { src: "x[3]", shape: Shape::scalar() },
            TestCase { src: "x[k]", shape: Shape::scalar() },
            TestCase { src: "x[c]", shape: Shape::scalar() },
            TestCase { src: "X[1, :]", shape: Shape::vector(4) },
            TestCase { src: "X[:, 0:2]", shape: Shape::matrix(3, 2) },
            TestCase { src: "X[0:2]", shape: Shape::matrix(2, 4) },
        ];
        for case in cases {
            let shape = shape_of(case.src).unwrap_or_else(|e| panic!("{}: {e}", case.src));
            assert_eq!(shape, case.shape, "{}", case.src);
        }
    }

    #[test]
    fn test_shape_errors() {
        let cases = [
            ("x + y", "incompatible shapes (10,) and (3,)"),
            ("s @ x", "`@`"),
            ("A @ y", "`@`"),
            ("sum(X, 2)", "axis 2"),
            ("reshape(X, 5, 2)", "cannot reshape"),
            ("sum(reshape(x, 10000000000, 10000000000))", "cannot reshape"),
            ("trace(X)", "square matrix"),
            ("diag(X)", "square matrix"),
            ("vstack(x, y)", "column counts"),
            ("hstack(X, y)", "cannot mix"),
            ("hstack(X, A)", "row counts"),
            ("quad_form(y, P)", "P has shape"),
            ("quad_over_lin(x, y)", "y must be a scalar"),
            ("maximum(x, y)", "incompatible"),
            ("x[10]", "out of range"),
            ("x[0:11]", "out of range"),
            ("x[4:4]", "empty"),
            ("x[0:k]", "depends on `k`"),
            ("x[s]", "variable"),
            ("s[0]", "indices given"),
            ("X[0, 0, 0]", "indices given"),
        ];
        for (src, fragment) in cases {
            let err = shape_of(src).expect_err(src);
            assert_eq!(err.kind(), ErrorKind::Shape, "{src}");
            assert!(err.to_string().contains(fragment), "{src}: {err}");
        }
    }

    #[test]
    fn test_every_node_is_annotated() {
        let t = table();
        let e = parse_expression("norm2(A @ x - 1) + sum(x[0:4])").unwrap();
        bind(&e, &t).unwrap();
        infer_shapes(&e, &t).unwrap();
        fn walk(e: &Expr) {
            assert!(e.shape().is_some(), "{e}");
            e.children().into_iter().for_each(walk);
        }
        walk(&e);
    }
}
