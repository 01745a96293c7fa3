//! Square-root factors of semidefinite data.

use nalgebra::DMatrix;

use crate::expr::Array;

/// `F` with `F^T F = P` for a PSD value `P`.
///
/// Computed from the symmetric eigen-decomposition `P = Q diag(l) Q^T` as
/// `F = diag(sqrt(max(l, 0))) Q^T`. Returns `None` for vectors and
/// non-symmetric matrices.
pub fn psd_sqrt(p: &Array) -> Option<Array> {
    match p {
        Array::Scalar(v) => Some(Array::Scalar(v.max(0.0).sqrt())),
        Array::Vector(_) => None,
        Array::Matrix(_) => {
            let eigen = p.symmetric_eigen()?;
            let roots = eigen.eigenvalues.map(|l| l.max(0.0).sqrt());
            let f: DMatrix<f64> = DMatrix::from_diagonal(&roots) * eigen.eigenvectors.transpose();
            Some(Array::Matrix(f))
        }
    }
}

/// `F` with `F^T F = -P` for an NSD value `P`.
pub fn nsd_sqrt(p: &Array) -> Option<Array> {
    let negated = match p {
        Array::Scalar(v) => Array::Scalar(-v),
        Array::Vector(v) => Array::Vector(-v),
        Array::Matrix(m) => Array::Matrix(-m),
    };
    psd_sqrt(&negated)
}
