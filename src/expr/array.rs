//! Dense numeric values carried by Constant declarations.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::ser::{Serialize, SerializeSeq, Serializer};

use super::shape::Shape;
use crate::dcp::Sign;

/// Relative tolerance used for symmetry and eigenvalue sign checks.
const SYMMETRY_TOL: f64 = 1e-9;

/// Dense array value (scalar, vector or matrix).
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    /// Scalar value.
    Scalar(f64),
    /// Vector value.
    Vector(DVector<f64>),
    /// Matrix value.
    Matrix(DMatrix<f64>),
}

impl Array {
    /// n x n identity matrix.
    pub fn identity(n: usize) -> Self {
        Array::Matrix(DMatrix::identity(n, n))
    }

    /// Build a matrix from rows, rejecting ragged input.
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != ncols) {
            return None;
        }
        Some(Array::Matrix(DMatrix::from_fn(rows.len(), ncols, |i, j| {
            rows[i][j]
        })))
    }

    /// Get the shape of the array.
    pub fn shape(&self) -> Shape {
        match self {
            Array::Scalar(_) => Shape::scalar(),
            Array::Vector(v) => Shape::vector(v.len()),
            Array::Matrix(m) => Shape::matrix(m.nrows(), m.ncols()),
        }
    }

    /// Get the total number of elements.
    pub fn size(&self) -> usize {
        self.values().len()
    }

    /// All elements (column-major for matrices).
    pub fn values(&self) -> &[f64] {
        match self {
            Array::Scalar(v) => std::slice::from_ref(v),
            Array::Vector(v) => v.as_slice(),
            Array::Matrix(m) => m.as_slice(),
        }
    }

    /// Try to get as a scalar value.
    pub fn as_scalar(&self) -> Option<f64> {
        match self.values() {
            [v] => Some(*v),
            _ => None,
        }
    }

    /// Check if all elements are non-negative.
    pub fn is_nonneg(&self) -> bool {
        self.values().iter().all(|&v| v >= 0.0)
    }

    /// Check if all elements are non-positive.
    pub fn is_nonpos(&self) -> bool {
        self.values().iter().all(|&v| v <= 0.0)
    }

    /// Sign shared by every element.
    pub fn sign(&self) -> Sign {
        match (self.is_nonneg(), self.is_nonpos()) {
            (true, true) => Sign::Zero,
            (true, false) => Sign::Nonnegative,
            (false, true) => Sign::Nonpositive,
            (false, false) => Sign::Unknown,
        }
    }

    /// Square matrix equal to its transpose up to a relative tolerance.
    pub fn is_symmetric(&self) -> bool {
        match self {
            Array::Scalar(_) => true,
            Array::Vector(_) => false,
            Array::Matrix(m) => {
                if !m.is_square() {
                    return false;
                }
                let tol = SYMMETRY_TOL * m.amax().max(1.0);
                (0..m.nrows()).all(|i| (0..i).all(|j| (m[(i, j)] - m[(j, i)]).abs() <= tol))
            }
        }
    }

    /// Eigen-decomposition of a symmetric matrix value.
    pub fn symmetric_eigen(&self) -> Option<SymmetricEigen<f64, nalgebra::Dyn>> {
        match self {
            Array::Matrix(m) if self.is_symmetric() => Some(m.clone().symmetric_eigen()),
            _ => None,
        }
    }

    /// Tolerance below which an eigenvalue counts as zero.
    pub fn eigen_tolerance(&self) -> f64 {
        SYMMETRY_TOL * self.values().iter().fold(1.0_f64, |acc, v| acc.max(v.abs()))
    }
}

impl From<f64> for Array {
    fn from(v: f64) -> Self {
        Array::Scalar(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::Vector(DVector::from_vec(v))
    }
}

impl From<DMatrix<f64>> for Array {
    fn from(m: DMatrix<f64>) -> Self {
        Array::Matrix(m)
    }
}

/// Serializes as nested JSON-style arrays, rows first for matrices.
impl Serialize for Array {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Array::Scalar(v) => serializer.serialize_f64(*v),
            Array::Vector(v) => v.as_slice().serialize(serializer),
            Array::Matrix(m) => {
                let mut seq = serializer.serialize_seq(Some(m.nrows()))?;
                for row in m.row_iter() {
                    let row: Vec<f64> = row.iter().copied().collect();
                    seq.serialize_element(&row)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_sign() {
        let a = Array::from(vec![1.0, 0.0, 2.0]);
        assert_eq!(a.shape(), Shape::vector(3));
        assert_eq!(a.sign(), Sign::Nonnegative);
        assert_eq!(Array::Scalar(0.0).sign(), Sign::Zero);
        assert_eq!(Array::Scalar(-2.0).sign(), Sign::Nonpositive);
        assert_eq!(Array::from(vec![1.0, -1.0]).sign(), Sign::Unknown);
    }

    #[test]
    fn test_from_rows() {
        let m = Array::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.shape(), Shape::matrix(2, 2));
        assert!(!m.is_symmetric());
        assert!(Array::from_rows(&[vec![1.0], vec![3.0, 4.0]]).is_none());
    }

    #[test]
    fn test_serialize_rows_first() {
        let m = Array::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "[[1.0,2.0],[3.0,4.0]]");
    }
}
