//! Name resolution.

use crate::error::{CvxError, Result};
use crate::expr::{Bound, DeclLookup, Expr, ExprKind, Slice, Symbol};

/// Resolve every identifier in `expr`, leaves and index bounds alike.
///
/// Records the declaration kind on each symbol. Stops at the first undeclared
/// name.
pub fn bind(expr: &Expr, decls: &dyn DeclLookup) -> Result<()> {
    match expr.kind() {
        ExprKind::Leaf(symbol) => bind_symbol(symbol, expr, decls),
        ExprKind::Index(base, slices) => {
            bind(base, decls)?;
            for slice in slices {
                for bound in slice_bounds(slice) {
                    if let Bound::Symbol(symbol) = bound {
                        bind_symbol(symbol, expr, decls)?;
                    }
                }
            }
            Ok(())
        }
        _ => expr.children().into_iter().try_for_each(|c| bind(c, decls)),
    }
}

fn bind_symbol(symbol: &Symbol, at: &Expr, decls: &dyn DeclLookup) -> Result<()> {
    let decl = decls.lookup(symbol.name()).ok_or_else(|| CvxError::Reference {
        name: symbol.name().to_string(),
        span: at.span(),
    })?;
    symbol.bind(decl.kind);
    Ok(())
}

pub(crate) fn slice_bounds(slice: &Slice) -> impl Iterator<Item = &Bound> {
    let bounds: [Option<&Bound>; 2] = match slice {
        Slice::Single(b) => [Some(b), None],
        Slice::Range { start, stop } => [start.as_ref(), stop.as_ref()],
        Slice::All => [None, None],
    };
    bounds.into_iter().flatten()
}
