//! Problem assembly: lays out columns and collects the canonical pieces.
//!
//! Declared variables take the first columns in declaration order, then
//! auxiliaries in creation order. Cone blocks and integer markers are
//! expressed over these global column ranges.

use indexmap::IndexMap;
use nalgebra::DVector;
use serde::Serialize;
use tracing::info;

use crate::canon::{AffineConstraint, Canonical, ConeKind};
use crate::error::{CvxError, Result};
use crate::expr::{DeclKind, DeclLookup, DeclTable, Declaration, Layered, Shape};
use crate::problem::Sense;

/// Cone dimensions for a conic solver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConeDims {
    /// Number of zero cone (equality) rows.
    pub zero: usize,
    /// Number of nonnegative cone rows.
    pub nonneg: usize,
    /// Second-order cone dimensions (each entry is the cone dimension).
    pub soc: Vec<usize>,
    /// Number of exponential cones (each is 3D).
    pub exp: usize,
    /// Side length of each PSD cone.
    pub psd: Vec<usize>,
}

impl ConeDims {
    /// Total number of constraint rows, PSD cones counted by their triangle.
    pub fn total(&self) -> usize {
        self.zero
            + self.nonneg
            + self.soc.iter().sum::<usize>()
            + self.exp * 3
            + self.psd.iter().map(|n| n * (n + 1) / 2).sum::<usize>()
    }
}

/// Mapping from variable names to column ranges in the stacked variable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VariableMap {
    /// Name to (start_col, size).
    columns: IndexMap<String, (usize, usize)>,
    total: usize,
}

impl VariableMap {
    /// Create from variable declarations, in order.
    pub fn from_decls<'a>(decls: impl IntoIterator<Item = &'a Declaration>) -> Self {
        let mut columns = IndexMap::new();
        let mut offset = 0;

        for decl in decls {
            let size = decl.shape.size();
            columns.insert(decl.name.clone(), (offset, size));
            offset += size;
        }

        VariableMap {
            columns,
            total: offset,
        }
    }

    /// Get the column range for a variable.
    pub fn get(&self, name: &str) -> Option<(usize, usize)> {
        self.columns.get(name).copied()
    }

    /// Total number of scalar columns.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Variables in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, (usize, usize))> {
        self.columns.iter().map(|(name, range)| (name.as_str(), *range))
    }

    fn require(&self, name: &str) -> Result<(usize, usize)> {
        self.get(name).ok_or_else(|| {
            CvxError::Canonicalization(format!("`{name}` has no column range"))
        })
    }
}

/// One cone over global column ranges `(start, len)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConeBlock {
    pub kind: ConeKind,
    pub columns: Vec<(usize, usize)>,
    pub origin: String,
}

/// Solver-ready conic program. Immutable once assembled.
#[derive(Debug, Clone, Serialize)]
pub struct ConicProblem {
    name: Option<String>,
    sense: Sense,
    variables: VariableMap,
    objective: DVector<f64>,
    offset: f64,
    equalities: Vec<AffineConstraint>,
    inequalities: Vec<AffineConstraint>,
    cones: Vec<ConeBlock>,
    dims: ConeDims,
    integer_columns: Vec<usize>,
    auxiliary: Vec<Declaration>,
    parameters: Vec<String>,
}

impl ConicProblem {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// Objective coefficients over all columns, in the problem's sense.
    pub fn objective(&self) -> &DVector<f64> {
        &self.objective
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// `lhs == rhs` rows over problem and auxiliary names.
    pub fn equalities(&self) -> &[AffineConstraint] {
        &self.equalities
    }

    /// `lhs <= rhs` rows, the combined inequality system.
    pub fn inequalities(&self) -> &[AffineConstraint] {
        &self.inequalities
    }

    pub fn cones(&self) -> &[ConeBlock] {
        &self.cones
    }

    pub fn dims(&self) -> &ConeDims {
        &self.dims
    }

    pub fn integer_columns(&self) -> &[usize] {
        &self.integer_columns
    }

    /// Auxiliary variables, derived parameters and generated constants.
    pub fn auxiliary(&self) -> &[Declaration] {
        &self.auxiliary
    }

    /// Parameters the data loader must supply, derived ones last.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn num_columns(&self) -> usize {
        self.variables.total()
    }
}

fn row_count(row: &AffineConstraint) -> Result<usize> {
    let (Some(lhs), Some(rhs)) = (row.lhs.shape(), row.rhs.shape()) else {
        return Err(CvxError::Canonicalization(format!(
            "{}: row has not been shaped",
            row.origin
        )));
    };
    lhs.elementwise(rhs)
        .as_ref()
        .map(Shape::size)
        .ok_or_else(|| CvxError::Canonicalization(format!("{}: mismatched row shapes", row.origin)))
}

/// Collect a verified canonical form into a [`ConicProblem`].
pub fn assemble(name: Option<&str>, decls: &DeclTable, canonical: Canonical) -> Result<ConicProblem> {
    let Canonical {
        objective,
        auxiliary,
        equalities,
        inequalities,
        cones: memberships,
        integers,
    } = canonical;

    let variables = VariableMap::from_decls(
        decls
            .of_kind(DeclKind::Variable)
            .chain(auxiliary.of_kind(DeclKind::Variable)),
    );
    let lookup = Layered {
        base: decls,
        overlay: &auxiliary,
    };

    let mut coefficients = DVector::zeros(variables.total());
    if let Some(var) = &objective.variable {
        let (col, _) = variables.require(var)?;
        coefficients[col] = 1.0;
    }

    let mut dims = ConeDims {
        zero: equalities.iter().map(row_count).sum::<Result<usize>>()?,
        nonneg: inequalities.iter().map(row_count).sum::<Result<usize>>()?,
        ..ConeDims::default()
    };

    let mut cones = Vec::with_capacity(memberships.len());
    for membership in memberships {
        let mut columns = Vec::with_capacity(membership.members.len());
        for member in &membership.members {
            let (start, _) = variables.require(&member.name)?;
            columns.push((start + member.start, member.len));
        }
        match membership.kind {
            ConeKind::SecondOrder => dims.soc.push(membership.dim()),
            ConeKind::Exponential => dims.exp += 1,
            ConeKind::Psd => {
                let side = membership
                    .members
                    .first()
                    .and_then(|m| lookup.lookup(&m.name))
                    .map_or(0, |d| d.shape.rows());
                dims.psd.push(side);
            }
            ConeKind::None => {}
        }
        cones.push(ConeBlock {
            kind: membership.kind,
            columns,
            origin: membership.origin,
        });
    }

    let mut integer_columns = Vec::new();
    for name in &integers {
        let (start, size) = variables.require(name)?;
        integer_columns.extend(start..start + size);
    }

    let parameters = decls
        .of_kind(DeclKind::Parameter)
        .chain(auxiliary.of_kind(DeclKind::Parameter))
        .map(|d| d.name.clone())
        .collect();

    let problem = ConicProblem {
        name: name.map(str::to_string),
        sense: objective.sense,
        variables,
        objective: coefficients,
        offset: objective.offset,
        equalities,
        inequalities,
        cones,
        dims,
        integer_columns,
        auxiliary: auxiliary.iter().cloned().collect(),
        parameters,
    };
    info!(
        columns = problem.num_columns(),
        zero = problem.dims.zero,
        nonneg = problem.dims.nonneg,
        soc = problem.dims.soc.len(),
        exp = problem.dims.exp,
        psd = problem.dims.psd.len(),
        "assembled conic problem"
    );
    Ok(problem)
}
