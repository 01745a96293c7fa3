//! Cone memberships and affine constraints produced by canonicalization.

use std::fmt;

use serde::Serialize;

use crate::expr::Expr;

/// Kind of cone a membership constrains its members to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConeKind {
    /// No cone; the recipe only adds linear constraints.
    None,
    /// `||rest||_2 <= first` over the concatenated members.
    SecondOrder,
    /// `(x, y, z)` with `y * exp(x / y) <= z`, `y > 0`.
    Exponential,
    /// A single square member constrained positive semidefinite.
    Psd,
}

/// Contiguous range of a variable's entries, column-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarSlice {
    pub name: String,
    pub start: usize,
    pub len: usize,
}

impl VarSlice {
    /// The whole variable.
    pub fn whole(name: impl Into<String>, len: usize) -> Self {
        VarSlice {
            name: name.into(),
            start: 0,
            len,
        }
    }

    /// Entry `i` of this slice as a slice of length one.
    pub fn element(&self, i: usize) -> VarSlice {
        VarSlice {
            name: self.name.clone(),
            start: self.start + i,
            len: 1,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

impl fmt::Display for VarSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}:{}]", self.name, self.start, self.end())
    }
}

/// Members constrained to lie in a cone, in cone order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConeMembership {
    pub kind: ConeKind,
    pub members: Vec<VarSlice>,
    /// Where the membership came from, for diagnostics.
    pub origin: String,
}

impl ConeMembership {
    /// Total number of entries across members.
    pub fn dim(&self) -> usize {
        self.members.iter().map(|m| m.len).sum()
    }
}

/// `lhs == rhs` or `lhs <= rhs` between affine expressions.
#[derive(Debug, Clone, Serialize)]
pub struct AffineConstraint {
    pub lhs: Expr,
    pub rhs: Expr,
    pub origin: String,
}

impl AffineConstraint {
    pub fn new(lhs: Expr, rhs: Expr, origin: impl Into<String>) -> Self {
        AffineConstraint {
            lhs,
            rhs,
            origin: origin.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slices() {
        let x = VarSlice::whole("x", 4);
        assert_eq!(x.element(2), VarSlice { name: "x".into(), start: 2, len: 1 });
        assert_eq!(x.to_string(), "x[0:4]");

        let soc = ConeMembership {
            kind: ConeKind::SecondOrder,
            members: vec![VarSlice::whole("t", 1), x],
            origin: "test".into(),
        };
        assert_eq!(soc.dim(), 5);
    }

    #[test]
    fn test_cone_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ConeKind::SecondOrder).unwrap();
        assert_eq!(json, "\"second_order\"");
    }
}
