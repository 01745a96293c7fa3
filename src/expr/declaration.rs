//! Declarations of variables, parameters and constants.
//!
//! Expression leaves refer to declarations by name. A problem owns one
//! [`DeclTable`]; the canonicalizer layers its auxiliary declarations on top
//! of it through [`Layered`] without copying the problem's table.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::array::Array;
use super::shape::Shape;
use crate::dcp::Sign;
use crate::error::{CvxError, Result};

/// What a declared name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    /// Unknown solved for by the solver.
    Variable,
    /// Externally supplied data, fixed during one analysis.
    Parameter,
    /// Fixed literal data.
    Constant,
}

impl DeclKind {
    /// Parameters and constants are data; variables are not.
    pub fn is_data(self) -> bool {
        !matches!(self, DeclKind::Variable)
    }
}

impl std::fmt::Display for DeclKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclKind::Variable => write!(f, "variable"),
            DeclKind::Parameter => write!(f, "parameter"),
            DeclKind::Constant => write!(f, "constant"),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Attribute set of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    #[serde(skip_serializing_if = "is_false")]
    pub nonneg: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub nonpos: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    #[serde(skip_serializing_if = "is_false")]
    pub integer: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub binary: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub symmetric: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub psd: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub nsd: bool,
}

impl Attributes {
    /// Sign implied by the attributes alone.
    pub fn sign(&self) -> Sign {
        let nonneg = self.nonneg || self.binary || self.lower.is_some_and(|l| l >= 0.0);
        let nonpos = self.nonpos || self.upper.is_some_and(|u| u <= 0.0);
        match (nonneg, nonpos) {
            (true, true) => Sign::Zero,
            (true, false) => Sign::Nonnegative,
            (false, true) => Sign::Nonpositive,
            (false, false) => Sign::Unknown,
        }
    }
}

/// Data computed from another declaration by whoever loads parameter values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "of", rename_all = "snake_case")]
pub enum Derivation {
    /// `F` with `F^T F = P` for a PSD parameter `P`.
    PsdSqrt(String),
    /// `F` with `F^T F = -P` for an NSD parameter `P`.
    NsdSqrt(String),
}

/// A declared variable, parameter or constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub shape: Shape,
    #[serde(flatten)]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Array>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivation: Option<Derivation>,
}

impl Declaration {
    /// Create a declaration of the given kind with no attributes.
    pub fn new(name: impl Into<String>, kind: DeclKind, shape: impl Into<Shape>) -> Self {
        Declaration {
            name: name.into(),
            kind,
            shape: shape.into(),
            attributes: Attributes::default(),
            value: None,
            derivation: None,
        }
    }

    /// Create a variable declaration.
    ///
    /// ```
    /// use cvxcore::expr::Declaration;
    ///
    /// let x = Declaration::variable("x", 5).nonneg();
    /// let y = Declaration::variable("Y", (3, 3)).symmetric();
    /// assert!(x.attributes.nonneg);
    /// assert!(y.shape.is_square());
    /// ```
    pub fn variable(name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        Self::new(name, DeclKind::Variable, shape)
    }

    /// Create a parameter declaration.
    pub fn parameter(name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        Self::new(name, DeclKind::Parameter, shape)
    }

    /// Create a constant declaration without a known value.
    pub fn constant(name: impl Into<String>, shape: impl Into<Shape>) -> Self {
        Self::new(name, DeclKind::Constant, shape)
    }

    /// Create a constant declaration holding `value`; the shape follows the value.
    pub fn constant_value(name: impl Into<String>, value: impl Into<Array>) -> Self {
        let value = value.into();
        let mut decl = Self::new(name, DeclKind::Constant, value.shape());
        decl.value = Some(value);
        decl
    }

    /// Constrain to be non-negative.
    pub fn nonneg(mut self) -> Self {
        self.attributes.nonneg = true;
        self
    }

    /// Constrain to be non-positive.
    pub fn nonpos(mut self) -> Self {
        self.attributes.nonpos = true;
        self
    }

    /// Elementwise lower bound.
    pub fn lower(mut self, lower: f64) -> Self {
        self.attributes.lower = Some(lower);
        self
    }

    /// Elementwise upper bound.
    pub fn upper(mut self, upper: f64) -> Self {
        self.attributes.upper = Some(upper);
        self
    }

    pub fn integer(mut self) -> Self {
        self.attributes.integer = true;
        self
    }

    pub fn binary(mut self) -> Self {
        self.attributes.binary = true;
        self
    }

    pub fn symmetric(mut self) -> Self {
        self.attributes.symmetric = true;
        self
    }

    /// Positive semidefinite matrix.
    pub fn psd(mut self) -> Self {
        self.attributes.psd = true;
        self
    }

    /// Negative semidefinite matrix.
    pub fn nsd(mut self) -> Self {
        self.attributes.nsd = true;
        self
    }

    /// Attach a value, keeping the declared shape.
    pub fn with_value(mut self, value: impl Into<Array>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn derived(mut self, derivation: Derivation) -> Self {
        self.derivation = Some(derivation);
        self
    }

    /// Sign from the value when known, else from the attributes.
    pub fn sign(&self) -> Sign {
        match &self.value {
            Some(value) => value.sign(),
            None => self.attributes.sign(),
        }
    }

    pub fn is_variable(&self) -> bool {
        self.kind == DeclKind::Variable
    }

    /// Check the attribute set and value against the shape.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CvxError::InvalidProblem(format!("`{}`: {msg}", self.name)));
        let attrs = &self.attributes;

        if self.name.is_empty() {
            return Err(CvxError::InvalidProblem("empty declaration name".into()));
        }
        if self.shape.ndim() > 2 {
            return invalid(format!("shape {} has more than two dimensions", self.shape));
        }
        if self.shape.dims().contains(&0) {
            return invalid(format!("shape {} has a zero dimension", self.shape));
        }
        if attrs.nonneg && attrs.nonpos {
            return invalid("cannot be both nonneg and nonpos".into());
        }
        if let (Some(lower), Some(upper)) = (attrs.lower, attrs.upper) {
            if lower > upper {
                return invalid(format!("lower bound {lower} exceeds upper bound {upper}"));
            }
        }
        if attrs.psd && attrs.nsd {
            return invalid("cannot be both psd and nsd".into());
        }
        if (attrs.psd || attrs.nsd || attrs.symmetric) && !self.shape.is_square() {
            return invalid(format!(
                "symmetric, psd and nsd require a square matrix, found {}",
                self.shape
            ));
        }
        if attrs.binary
            && (attrs.nonpos
                || attrs.lower.is_some_and(|l| l > 0.0)
                || attrs.upper.is_some_and(|u| u < 1.0))
        {
            return invalid("binary conflicts with its sign or bound attributes".into());
        }
        if (attrs.integer || attrs.binary) && self.kind != DeclKind::Variable {
            return invalid(format!("integrality only applies to variables, not a {}", self.kind));
        }
        if let Some(value) = &self.value {
            if self.kind == DeclKind::Variable {
                return invalid("variables cannot carry a value".into());
            }
            if value.shape() != self.shape {
                return invalid(format!(
                    "value has shape {} but the declared shape is {}",
                    value.shape(),
                    self.shape
                ));
            }
        }
        Ok(())
    }
}

/// Name resolution for the binder and later passes.
pub trait DeclLookup {
    fn lookup(&self, name: &str) -> Option<&Declaration>;
}

/// Insertion-ordered declaration table.
#[derive(Debug, Clone, Default)]
pub struct DeclTable {
    decls: IndexMap<String, Declaration>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a declaration. Names must be unique.
    pub fn insert(&mut self, decl: Declaration) -> Result<()> {
        decl.validate()?;
        if self.decls.contains_key(&decl.name) {
            return Err(CvxError::InvalidProblem(format!(
                "`{}` is declared more than once",
                decl.name
            )));
        }
        self.decls.insert(decl.name.clone(), decl);
        Ok(())
    }

    /// Replace an existing declaration, e.g. after a parameter's shape changed.
    pub fn replace(&mut self, decl: Declaration) -> Result<()> {
        decl.validate()?;
        match self.decls.get_mut(&decl.name) {
            Some(slot) => {
                *slot = decl;
                Ok(())
            }
            None => Err(CvxError::InvalidProblem(format!(
                "`{}` is not declared",
                decl.name
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.decls.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decls.contains_key(name)
    }

    /// Declarations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.decls.values()
    }

    pub fn of_kind(&self, kind: DeclKind) -> impl Iterator<Item = &Declaration> {
        self.decls.values().filter(move |d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

impl DeclLookup for DeclTable {
    fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.get(name)
    }
}

/// A base table with an overlay consulted after it.
#[derive(Debug, Clone, Copy)]
pub struct Layered<'a> {
    pub base: &'a DeclTable,
    pub overlay: &'a DeclTable,
}

impl DeclLookup for Layered<'_> {
    fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.base.get(name).or_else(|| self.overlay.get(name))
    }
}
