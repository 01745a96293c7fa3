//! Constraint types for optimization problems.
//!
//! A constraint relates two expressions with `==`, `<=` or `>=`:
//! - `==` requires both sides affine
//! - `<=` requires a convex left side and a concave right side
//! - `>=` requires a concave left side and a convex right side

use std::fmt;

use serde::Serialize;

use crate::dcp::Curvature;
use crate::error::Span;
use crate::expr::Expr;

/// Relational operator of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Relation {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl Relation {
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Eq => "==",
            Relation::Le => "<=",
            Relation::Ge => ">=",
        }
    }

    /// Whether sides with these curvatures satisfy the DCP rule.
    pub fn admits(self, lhs: Curvature, rhs: Curvature) -> bool {
        match self {
            Relation::Eq => lhs.is_affine() && rhs.is_affine(),
            Relation::Le => lhs.is_convex() && rhs.is_concave(),
            Relation::Ge => lhs.is_concave() && rhs.is_convex(),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A constraint in an optimization problem.
#[derive(Debug, Clone)]
pub struct Constraint {
    name: Option<String>,
    relation: Relation,
    lhs: Expr,
    rhs: Expr,
}

impl Constraint {
    pub fn new(lhs: Expr, relation: Relation, rhs: Expr) -> Self {
        Constraint {
            name: None,
            relation,
            lhs,
            rhs,
        }
    }

    /// Create an equality constraint: lhs == rhs.
    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        Self::new(lhs, Relation::Eq, rhs)
    }

    /// Create an inequality constraint: lhs <= rhs.
    pub fn leq(lhs: Expr, rhs: Expr) -> Self {
        Self::new(lhs, Relation::Le, rhs)
    }

    /// Create an inequality constraint: lhs >= rhs.
    pub fn geq(lhs: Expr, rhs: Expr) -> Self {
        Self::new(lhs, Relation::Ge, rhs)
    }

    /// Attach a name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn lhs(&self) -> &Expr {
        &self.lhs
    }

    pub fn rhs(&self) -> &Expr {
        &self.rhs
    }

    /// Both sides, left first.
    pub fn expressions(&self) -> [&Expr; 2] {
        [&self.lhs, &self.rhs]
    }

    pub(crate) fn expressions_mut(&mut self) -> [&mut Expr; 2] {
        [&mut self.lhs, &mut self.rhs]
    }

    pub fn span(&self) -> Span {
        self.lhs.span().join(self.rhs.span())
    }

    /// Check if this constraint is DCP-compliant.
    ///
    /// Reads the curvature annotations, so it is false until the DCP pass has
    /// run over both sides.
    pub fn is_dcp(&self) -> bool {
        match (self.lhs.curvature(), self.rhs.curvature()) {
            (Some(lhs), Some(rhs)) => self.relation.admits(lhs, rhs),
            _ => false,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.relation, self.rhs)
    }
}

/// Extension trait for creating constraints from expressions.
pub trait ConstraintExt {
    /// Create equality constraint: self == rhs.
    fn equals(&self, rhs: &Expr) -> Constraint;

    /// Create inequality constraint: self <= rhs.
    fn leq(&self, rhs: &Expr) -> Constraint;

    /// Create inequality constraint: self >= rhs.
    fn geq(&self, rhs: &Expr) -> Constraint;
}

impl ConstraintExt for Expr {
    fn equals(&self, rhs: &Expr) -> Constraint {
        Constraint::eq(self.clone(), rhs.clone())
    }

    fn leq(&self, rhs: &Expr) -> Constraint {
        Constraint::leq(self.clone(), rhs.clone())
    }

    fn geq(&self, rhs: &Expr) -> Constraint {
        Constraint::geq(self.clone(), rhs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcp::Sign;

    fn annotated(name: &str, curvature: Curvature) -> Expr {
        let e = Expr::leaf(name, Span::default());
        e.annotate_dcp(curvature, Sign::Unknown);
        e
    }

    #[test]
    fn test_relation_rules() {
        use Curvature::*;
        assert!(Relation::Eq.admits(Affine, Constant));
        assert!(!Relation::Eq.admits(Convex, Constant));
        assert!(Relation::Le.admits(Convex, Concave));
        assert!(!Relation::Le.admits(Concave, Constant));
        assert!(Relation::Ge.admits(Concave, Convex));
        assert!(!Relation::Ge.admits(Convex, Affine));
    }

    #[test]
    fn test_unanalyzed_constraint_is_not_dcp() {
        let c = Expr::leaf("x", Span::default()).leq(&Expr::number(1.0, Span::default()));
        assert!(!c.is_dcp());
    }

    #[test]
    fn test_non_dcp_constraint() {
        // norm(x) >= 1 is not DCP: convex on the concave side.
        let c = Constraint::geq(
            annotated("t", Curvature::Convex),
            annotated("one", Curvature::Constant),
        );
        assert!(!c.is_dcp());
        let c = Constraint::leq(
            annotated("t", Curvature::Convex),
            annotated("one", Curvature::Constant),
        );
        assert!(c.is_dcp());
    }

    #[test]
    fn test_display_and_name() {
        let c = Constraint::eq(
            Expr::leaf("x", Span::default()),
            Expr::number(2.0, Span::default()),
        )
        .named("budget");
        assert_eq!(c.to_string(), "x == 2");
        assert_eq!(c.name(), Some("budget"));
    }
}
