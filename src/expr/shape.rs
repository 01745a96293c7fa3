//! Shape representation for expressions.
//!
//! Shapes follow NumPy conventions:
//! - `()` or `[]` is a scalar
//! - `(n,)` or `[n]` is a vector of length n
//! - `(m, n)` or `[m, n]` is an m x n matrix

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of an expression (row-major like NumPy).
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Create a scalar shape.
    pub fn scalar() -> Self {
        Shape(vec![])
    }

    /// Create a vector shape.
    pub fn vector(n: usize) -> Self {
        Shape(vec![n])
    }

    /// Create a matrix shape.
    pub fn matrix(m: usize, n: usize) -> Self {
        Shape(vec![m, n])
    }

    /// Create a shape from dimensions.
    pub fn from_dims(dims: impl Into<Vec<usize>>) -> Self {
        Shape(dims.into())
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    /// Number of dimensions (0 for scalar, 1 for vector, 2 for matrix).
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Get the dimensions as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn is_scalar(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_vector(&self) -> bool {
        self.0.len() == 1
    }

    pub fn is_matrix(&self) -> bool {
        self.0.len() == 2
    }

    /// Matrix with as many rows as columns.
    pub fn is_square(&self) -> bool {
        self.is_matrix() && self.0[0] == self.0[1]
    }

    /// Number of rows (1 for scalar, n for vector, m for matrix).
    pub fn rows(&self) -> usize {
        match self.0.len() {
            0 => 1,
            _ => self.0[0],
        }
    }

    /// Number of columns (1 for scalar and vector, n for matrix).
    pub fn cols(&self) -> usize {
        match self.0.len() {
            0 | 1 => 1,
            _ => self.0[1],
        }
    }

    /// Reverse the dimensions. Scalars and vectors are unchanged.
    pub fn transpose(&self) -> Self {
        let mut dims = self.0.clone();
        dims.reverse();
        Shape(dims)
    }

    /// Result shape of an elementwise operation.
    ///
    /// Only scalar broadcasting is allowed: the shapes must be equal or one of
    /// them must be a scalar.
    pub fn elementwise(&self, other: &Shape) -> Option<Shape> {
        if self == other || other.is_scalar() {
            Some(self.clone())
        } else if self.is_scalar() {
            Some(other.clone())
        } else {
            None
        }
    }

    /// Check if matrix multiplication is valid and return result shape.
    ///
    /// Requires `self[-1] == other[0]`; the contracted dimension is dropped
    /// from both sides. Scalars are not valid operands.
    pub fn matmul(&self, other: &Shape) -> Option<Shape> {
        let (&inner, outer_left) = self.0.split_last()?;
        let (&first, outer_right) = other.0.split_first()?;
        if inner != first {
            return None;
        }
        let dims: Vec<usize> = outer_left.iter().chain(outer_right).copied().collect();
        if dims.len() > 2 {
            return None;
        }
        Some(Shape(dims))
    }

    /// Shape after reducing along `axis`.
    pub fn drop_axis(&self, axis: usize) -> Option<Shape> {
        if axis >= self.0.len() {
            return None;
        }
        let mut dims = self.0.clone();
        dims.remove(axis);
        Some(Shape(dims))
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "()"),
            [n] => write!(f, "({n},)"),
            dims => {
                let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

// Conversion traits
impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape::scalar()
    }
}

impl From<usize> for Shape {
    fn from(n: usize) -> Self {
        Shape::vector(n)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((m, n): (usize, usize)) -> Self {
        Shape::matrix(m, n)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar() {
        let s = Shape::scalar();
        assert!(s.is_scalar());
        assert_eq!(s.size(), 1);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.rows(), 1);
        assert_eq!(s.cols(), 1);
    }

    #[test]
    fn test_matrix() {
        let s = Shape::matrix(3, 4);
        assert!(s.is_matrix());
        assert!(!s.is_square());
        assert_eq!(s.size(), 12);
        assert_eq!(s.rows(), 3);
        assert_eq!(s.cols(), 4);
        assert!(Shape::matrix(2, 2).is_square());
    }

    #[test]
    fn test_transpose() {
        assert_eq!(Shape::scalar().transpose(), Shape::scalar());
        assert_eq!(Shape::vector(3).transpose(), Shape::vector(3));
        assert_eq!(Shape::matrix(3, 4).transpose(), Shape::matrix(4, 3));
    }

    #[test]
    fn test_elementwise() {
        assert_eq!(
            Shape::vector(3).elementwise(&Shape::vector(3)),
            Some(Shape::vector(3))
        );
        assert_eq!(
            Shape::scalar().elementwise(&Shape::matrix(3, 4)),
            Some(Shape::matrix(3, 4))
        );
        // No NumPy-style row broadcasting.
        assert_eq!(Shape::vector(4).elementwise(&Shape::matrix(3, 4)), None);
        assert_eq!(Shape::vector(3).elementwise(&Shape::vector(4)), None);
    }

    #[test]
    fn test_matmul() {
        assert_eq!(
            Shape::matrix(3, 4).matmul(&Shape::matrix(4, 5)),
            Some(Shape::matrix(3, 5))
        );
        assert_eq!(
            Shape::matrix(3, 4).matmul(&Shape::vector(4)),
            Some(Shape::vector(3))
        );
        assert_eq!(
            Shape::vector(3).matmul(&Shape::matrix(3, 2)),
            Some(Shape::vector(2))
        );
        assert_eq!(
            Shape::vector(3).matmul(&Shape::vector(3)),
            Some(Shape::scalar())
        );
        assert_eq!(Shape::matrix(3, 4).matmul(&Shape::vector(3)), None);
        assert_eq!(Shape::scalar().matmul(&Shape::vector(3)), None);
    }

    #[test]
    fn test_drop_axis() {
        assert_eq!(Shape::matrix(3, 4).drop_axis(0), Some(Shape::vector(4)));
        assert_eq!(Shape::matrix(3, 4).drop_axis(1), Some(Shape::vector(3)));
        assert_eq!(Shape::vector(3).drop_axis(1), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::scalar().to_string(), "()");
        assert_eq!(Shape::vector(5).to_string(), "(5,)");
        assert_eq!(Shape::matrix(2, 3).to_string(), "(2, 3)");
    }
}
