//! In-memory problem documents.
//!
//! A document is JSON text the caller has already read:
//!
//! ```json
//! {
//!   "format": "cvx",
//!   "version": "1.0",
//!   "variables": {"w": {"shape": 3, "nonneg": true}},
//!   "parameters": {"mu": {"shape": [3]}},
//!   "constants": {"gamma": {"value": 0.5}},
//!   "objective": {"sense": "maximize", "expression": "mu @ w - gamma * sum_squares(w)"},
//!   "constraints": ["sum(w) == 1", {"name": "cap", "expression": "w <= 0.3"}]
//! }
//! ```
//!
//! Parameter `data` and document `metadata` are carried through untouched.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{CvxError, Result};
use crate::expr::{Array, Attributes, DeclKind, Declaration, Shape};
use crate::problem::Sense;

/// The only accepted `format` tag.
pub const FORMAT: &str = "cvx";

/// A shape given as a single length or a list of dimensions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ShapeDoc {
    Length(usize),
    Dims(Vec<usize>),
}

impl Default for ShapeDoc {
    fn default() -> Self {
        ShapeDoc::Dims(Vec::new())
    }
}

impl From<&ShapeDoc> for Shape {
    fn from(doc: &ShapeDoc) -> Self {
        match doc {
            ShapeDoc::Length(n) => Shape::vector(*n),
            ShapeDoc::Dims(dims) => Shape::from_dims(dims.clone()),
        }
    }
}

/// A numeric value as nested arrays.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ValueDoc {
    Scalar(f64),
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl ValueDoc {
    fn to_array(&self, name: &str) -> Result<Array> {
        match self {
            ValueDoc::Scalar(v) => Ok(Array::from(*v)),
            ValueDoc::Vector(v) => Ok(Array::from(v.clone())),
            ValueDoc::Matrix(rows) => Array::from_rows(rows).ok_or_else(|| {
                CvxError::InvalidProblem(format!("`{name}`: value has ragged rows"))
            }),
        }
    }
}

/// One entry of `variables`, `parameters` or `constants`, keyed by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclarationDoc {
    #[serde(default)]
    pub shape: Option<ShapeDoc>,
    #[serde(flatten)]
    pub attributes: Attributes,
    #[serde(default)]
    pub value: Option<ValueDoc>,
    /// Opaque parameter payload for the data loader.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl DeclarationDoc {
    /// Build the declaration. A missing shape follows the value, else scalar.
    pub fn to_declaration(&self, name: &str, kind: DeclKind) -> Result<Declaration> {
        let value = self
            .value
            .as_ref()
            .map(|v| v.to_array(name))
            .transpose()?;
        let shape = match (&self.shape, &value) {
            (Some(doc), _) => Shape::from(doc),
            (None, Some(value)) => value.shape(),
            (None, None) => Shape::scalar(),
        };
        let mut decl = Declaration::new(name, kind, shape);
        decl.attributes = self.attributes.clone();
        decl.value = value;
        Ok(decl)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveDoc {
    pub sense: Sense,
    pub expression: String,
}

/// A constraint as bare text or with a name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConstraintDoc {
    Text(String),
    Named {
        expression: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl ConstraintDoc {
    pub fn expression(&self) -> &str {
        match self {
            ConstraintDoc::Text(expression) | ConstraintDoc::Named { expression, .. } => expression,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ConstraintDoc::Text(_) => None,
            ConstraintDoc::Named { name, .. } => name.as_deref(),
        }
    }
}

/// A whole problem document.
#[derive(Debug, Clone, Deserialize)]
pub struct ProblemDocument {
    pub format: String,
    #[serde(default)]
    pub version: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub variables: IndexMap<String, DeclarationDoc>,
    #[serde(default)]
    pub parameters: IndexMap<String, DeclarationDoc>,
    #[serde(default)]
    pub constants: IndexMap<String, DeclarationDoc>,
    pub objective: ObjectiveDoc,
    #[serde(default)]
    pub constraints: Vec<ConstraintDoc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ProblemDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: ProblemDocument = serde_json::from_str(text)?;
        if doc.format != FORMAT {
            return Err(CvxError::InvalidProblem(format!(
                "unsupported document format `{}`, expected `{FORMAT}`",
                doc.format
            )));
        }
        Ok(doc)
    }

    /// All declarations: variables, then parameters, then constants, each
    /// in document order.
    pub fn declarations(&self) -> Result<Vec<Declaration>> {
        let kinds = [
            (&self.variables, DeclKind::Variable),
            (&self.parameters, DeclKind::Parameter),
            (&self.constants, DeclKind::Constant),
        ];
        kinds
            .into_iter()
            .flat_map(|(docs, kind)| {
                docs.iter()
                    .map(move |(name, doc)| doc.to_declaration(name, kind))
            })
            .collect()
    }
}
