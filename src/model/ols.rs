//! Least squares via SVD.
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Singular values below `rcond * σ_max` are treated as zero, so the minimum
//! norm solution is returned for rank-deficient designs (return features are
//! often nearly collinear). The default `rcond` is `ε * max(rows, cols)`.

use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquares {
    pub beta: DVector<f64>,
    /// Singular values kept by the cutoff.
    pub rank: usize,
}

/// Solve a least squares problem; `None` when the design is empty, all zero,
/// or the solution is not finite.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<LeastSquares> {
    if x.nrows() == 0 || x.ncols() == 0 || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    if sigma_max.is_nan() || sigma_max <= 0.0 {
        return None;
    }

    let rcond = f64::EPSILON * x.nrows().max(x.ncols()) as f64;
    let cutoff = rcond * sigma_max;
    let rank = svd.singular_values.iter().filter(|s| **s > cutoff).count();

    let beta = svd.solve(y, cutoff).ok()?;
    beta.iter()
        .all(|v| v.is_finite())
        .then_some(LeastSquares { beta, rank })
}
