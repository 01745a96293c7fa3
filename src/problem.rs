//! Problem definition and analysis API.
//!
//! The `Problem` struct represents an optimization problem with:
//! - A declaration table (variables, parameters, constants)
//! - An objective (minimize or maximize)
//! - A set of constraints
//!
//! Use the builder pattern to construct problems:
//! ```
//! use cvxcore::prelude::*;
//!
//! let problem = Problem::minimize("norm2(x - c)")
//!     .declare(Declaration::variable("x", 3))
//!     .declare(Declaration::parameter("c", 3))
//!     .subject_to(["sum(x) == 1", "x >= 0"])
//!     .build()?;
//!
//! let conic = problem.canonicalize()?;
//! assert_eq!(conic.dims().soc.len(), 1);
//! # Ok::<(), cvxcore::CvxError>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{bind, infer_shapes};
use crate::canon::canonicalize;
use crate::conic::{assemble, ConicProblem};
use crate::constraints::Constraint;
use crate::dcp::{check_constraint, check_objective, DcpAnalyzer};
use crate::document::ProblemDocument;
use crate::error::{CvxError, Fragment, Result};
use crate::expr::{DeclTable, Declaration, Expr};
use crate::frontend::Parser;
use crate::settings::Settings;

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    Minimize,
    Maximize,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Minimize => write!(f, "minimize"),
            Sense::Maximize => write!(f, "maximize"),
        }
    }
}

/// An analyzed-on-demand optimization problem.
///
/// Owns its declarations and expression trees. Analysis annotates the trees
/// in place through their write-once caches, so every query takes `&self`.
#[derive(Debug, Clone)]
pub struct Problem {
    name: Option<String>,
    settings: Settings,
    decls: DeclTable,
    sense: Sense,
    objective: Expr,
    constraints: Vec<Constraint>,
}

/// Builder for [`Problem`]. Nothing is parsed until [`ProblemBuilder::build`].
#[derive(Debug, Clone)]
pub struct ProblemBuilder {
    name: Option<String>,
    settings: Settings,
    sense: Sense,
    objective: String,
    decls: Vec<Declaration>,
    constraints: Vec<(Option<String>, String)>,
}

impl Problem {
    /// Create a minimization problem.
    pub fn minimize(objective: impl Into<String>) -> ProblemBuilder {
        ProblemBuilder::new(Sense::Minimize, objective.into())
    }

    /// Create a maximization problem.
    pub fn maximize(objective: impl Into<String>) -> ProblemBuilder {
        ProblemBuilder::new(Sense::Maximize, objective.into())
    }

    /// Build a problem from a parsed document.
    pub fn from_document(doc: &ProblemDocument, settings: Settings) -> Result<Problem> {
        let mut builder = ProblemBuilder::new(doc.objective.sense, doc.objective.expression.clone())
            .settings(settings);
        builder.name = doc.name.clone();
        builder.decls = doc.declarations()?;
        builder.constraints = doc
            .constraints
            .iter()
            .map(|c| (c.name().map(str::to_string), c.expression().to_string()))
            .collect();
        builder.build()
    }

    /// Build a problem from document text with default settings.
    pub fn from_json(text: &str) -> Result<Problem> {
        Self::from_document(&ProblemDocument::from_json(text)?, Settings::default())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn declarations(&self) -> &DeclTable {
        &self.decls
    }

    pub fn objective(&self) -> &Expr {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Every fragment with its tag, objective first.
    fn fragments(&self) -> impl Iterator<Item = (Fragment, &Expr)> {
        let objective = std::iter::once((Fragment::Objective, &self.objective));
        let constraints = self.constraints.iter().enumerate().flat_map(|(index, c)| {
            let fragment = Fragment::Constraint {
                index,
                name: c.name().map(str::to_string),
            };
            c.expressions().map(move |e| (fragment.clone(), e))
        });
        objective.chain(constraints)
    }

    /// Run binding, shape inference and DCP analysis over every fragment.
    ///
    /// Passes run one at a time over all fragments, so a reference error
    /// anywhere is reported before a shape error anywhere. The first error
    /// wins and is tagged with its fragment.
    pub fn analyze(&self) -> Result<()> {
        for (fragment, expr) in self.fragments() {
            bind(expr, &self.decls).map_err(|e| e.in_fragment(fragment))?;
        }
        debug!("bound all fragments");

        for (fragment, expr) in self.fragments() {
            infer_shapes(expr, &self.decls).map_err(|e| e.in_fragment(fragment))?;
        }
        let objective_shape = infer_shapes(&self.objective, &self.decls)?;
        if !objective_shape.is_scalar() {
            return Err(CvxError::shape(
                self.objective.span(),
                format!("objective must be a scalar, found shape {objective_shape}"),
            )
            .in_fragment(Fragment::Objective));
        }
        debug!("inferred all shapes");

        DcpAnalyzer::new(&self.decls, &self.settings)
            .analyze(&self.objective)
            .and_then(|_| check_objective(self.sense, &self.objective))
            .map_err(|e| e.in_fragment(Fragment::Objective))?;
        for (index, constraint) in self.constraints.iter().enumerate() {
            check_constraint(constraint, &self.decls, &self.settings).map_err(|e| {
                e.in_fragment(Fragment::Constraint {
                    index,
                    name: constraint.name().map(str::to_string),
                })
            })?;
        }
        debug!(constraints = self.constraints.len(), "problem is DCP");
        Ok(())
    }

    /// Check if this problem is DCP-compliant.
    ///
    /// A problem is DCP if:
    /// - Minimize: objective is convex
    /// - Maximize: objective is concave
    /// - All constraints are DCP
    pub fn is_dcp(&self) -> bool {
        self.analyze().is_ok()
    }

    /// Analyze, canonicalize and assemble the conic form.
    pub fn canonicalize(&self) -> Result<ConicProblem> {
        self.analyze()?;
        let canonical = canonicalize(
            &self.decls,
            &self.settings,
            self.sense,
            &self.objective,
            &self.constraints,
        )?;
        assemble(self.name(), &self.decls, canonical)
    }

    /// Replace a declaration (typically a parameter whose shape or value
    /// changed) and drop every analysis result.
    pub fn redeclare(&mut self, decl: Declaration) -> Result<()> {
        let name = decl.name.clone();
        self.decls
            .replace(decl)
            .map_err(|e| e.in_fragment(Fragment::Declaration(name)))?;
        self.objective.clear_annotations();
        for constraint in &mut self.constraints {
            for side in constraint.expressions_mut() {
                side.clear_annotations();
            }
        }
        Ok(())
    }
}

impl ProblemBuilder {
    fn new(sense: Sense, objective: String) -> Self {
        ProblemBuilder {
            name: None,
            settings: Settings::default(),
            sense,
            objective,
            decls: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a declaration.
    pub fn declare(mut self, decl: Declaration) -> Self {
        self.decls.push(decl);
        self
    }

    /// Add several declarations.
    pub fn declare_all(mut self, decls: impl IntoIterator<Item = Declaration>) -> Self {
        self.decls.extend(decls);
        self
    }

    /// Add constraints.
    pub fn subject_to<S: Into<String>>(mut self, constraints: impl IntoIterator<Item = S>) -> Self {
        self.constraints
            .extend(constraints.into_iter().map(|c| (None, c.into())));
        self
    }

    /// Add a named constraint.
    pub fn constraint(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.constraints.push((Some(name.into()), source.into()));
        self
    }

    /// Parse every fragment and build the problem.
    ///
    /// Declarations are validated here; binding and analysis run later, in
    /// [`Problem::analyze`].
    pub fn build(self) -> Result<Problem> {
        let mut decls = DeclTable::new();
        for decl in self.decls {
            let fragment = Fragment::Declaration(decl.name.clone());
            decls.insert(decl).map_err(|e| e.in_fragment(fragment))?;
        }

        let (prefix, objective) = Parser::new(&self.objective, &self.settings)
            .parse_objective()
            .map_err(|e| e.in_fragment(Fragment::Objective))?;
        if let Some(prefix) = prefix.filter(|p| *p != self.sense) {
            return Err(CvxError::InvalidProblem(format!(
                "objective text says `{prefix}` but the problem is built to {}",
                self.sense
            )));
        }

        let mut constraints = Vec::with_capacity(self.constraints.len());
        for (index, (name, source)) in self.constraints.into_iter().enumerate() {
            let fragment = Fragment::Constraint {
                index,
                name: name.clone(),
            };
            let constraint = Parser::new(&source, &self.settings)
                .parse_constraint()
                .map_err(|e| e.in_fragment(fragment))?;
            constraints.push(match name {
                Some(name) => constraint.named(name),
                None => constraint,
            });
        }

        debug!(
            declarations = decls.len(),
            constraints = constraints.len(),
            "built problem"
        );
        Ok(Problem {
            name: self.name,
            settings: self.settings,
            decls,
            sense: self.sense,
            objective,
            constraints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn portfolio() -> ProblemBuilder {
        Problem::maximize("mu @ w - gamma * quad_form(w, Sigma)")
            .declare(Declaration::variable("w", 3).nonneg())
            .declare(Declaration::parameter("mu", 3))
            .declare(Declaration::parameter("gamma", ()).nonneg())
            .declare(Declaration::parameter("Sigma", (3, 3)).psd())
            .subject_to(["sum(w) == 1"])
            .constraint("cap", "w <= 0.3")
    }

    #[test]
    fn test_problem_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Problem>();
        assert_send_sync::<ConicProblem>();
    }

    #[test]
    fn test_portfolio_is_dcp() {
        let problem = portfolio().build().unwrap();
        assert!(problem.is_dcp());
        assert_eq!(problem.constraints()[1].name(), Some("cap"));
        assert!(problem.objective().curvature().is_some_and(|c| c.is_concave()));
    }

    #[test]
    fn test_sense_prefix_must_agree() {
        let ok = Problem::minimize("minimize sum(x)")
            .declare(Declaration::variable("x", 2))
            .build();
        assert!(ok.is_ok());
        let err = Problem::minimize("maximize sum(x)")
            .declare(Declaration::variable("x", 2))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidProblem);
    }

    #[test]
    fn test_errors_carry_fragment() {
        let problem = Problem::minimize("sum(x)")
            .declare(Declaration::variable("x", 2))
            .subject_to(["x >= 0", "y <= 1"])
            .build()
            .unwrap();
        let err = problem.analyze().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(
            err.fragment(),
            Some(&Fragment::Constraint {
                index: 1,
                name: None
            })
        );
    }

    #[test]
    fn test_reference_errors_before_shape_errors() {
        let problem = Problem::minimize("sum(x + ones3)")
            .declare(Declaration::variable("x", 2))
            .declare(Declaration::constant("ones3", 3))
            .subject_to(["z >= 0"])
            .build()
            .unwrap();
        assert_eq!(problem.analyze().unwrap_err().kind(), ErrorKind::Reference);
    }

    #[test]
    fn test_objective_must_be_scalar() {
        let problem = Problem::minimize("x")
            .declare(Declaration::variable("x", 2))
            .build()
            .unwrap();
        let err = problem.analyze().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_redeclare_clears_analysis() {
        let mut problem = Problem::minimize("sum(A @ x)")
            .declare(Declaration::variable("x", 3))
            .declare(Declaration::parameter("A", (2, 3)))
            .build()
            .unwrap();
        problem.analyze().unwrap();
        problem
            .redeclare(Declaration::parameter("A", (2, 4)))
            .unwrap();
        assert!(problem.objective().shape().is_none());
        assert_eq!(problem.analyze().unwrap_err().kind(), ErrorKind::Shape);
        assert!(problem.redeclare(Declaration::parameter("B", ())).is_err());
    }

    #[test]
    fn test_canonicalize_portfolio() {
        let conic = portfolio().name("portfolio").build().unwrap().canonicalize().unwrap();
        assert_eq!(conic.name(), Some("portfolio"));
        assert_eq!(conic.sense(), Sense::Maximize);
        assert_eq!(conic.dims().soc.len(), 1);
        assert!(conic.parameters().iter().any(|p| p == "_Sigma_sqrt"));
        assert_eq!(conic.variables().get("w"), Some((0, 3)));
        assert_eq!(conic.objective().iter().filter(|&&c| c == 1.0).count(), 1);
    }
}
