//! Estimators behind the `Regressor` seam.
//!
//! Serving and evaluation only see `Regressor`; the linear model is the
//! estimator the training command produces.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Series, Table};
use crate::error::AppError;
use crate::model::ols::solve_least_squares;

/// A fitted estimator over a fixed, ordered set of named features.
pub trait Regressor {
    /// Features in the order `predict_row` expects them.
    fn feature_names(&self) -> &[String];

    fn predict_row(&self, row: &[f64]) -> Result<f64, AppError>;

    /// Predict every row of `features`, selecting columns by name.
    fn predict(&self, features: &Table) -> Result<Vec<f64>, AppError> {
        let ordered = features.select_columns(self.feature_names())?;
        (0..ordered.n_rows())
            .map(|r| self.predict_row(&ordered.row(r)))
            .collect()
    }
}

/// Ordinary least squares with an intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    /// Fit on the rows where every feature and the label are present.
    pub fn fit(features: &Table, labels: &Series) -> Result<Self, AppError> {
        if features.index() != &labels.index {
            return Err(AppError::input(format!(
                "Labels '{}' are not aligned with the feature rows.",
                labels.name
            )));
        }
        if features.n_cols() == 0 {
            return Err(AppError::input("Cannot fit a model without feature columns."));
        }

        let rows: Vec<usize> = (0..features.n_rows())
            .filter(|&r| labels.values[r].is_finite() && features.row(r).iter().all(|v| v.is_finite()))
            .collect();
        if rows.is_empty() {
            return Err(AppError::input("No complete rows to fit the model on."));
        }

        let p = features.n_cols();
        let mut design = DMatrix::<f64>::zeros(rows.len(), p + 1);
        let mut target = DVector::<f64>::zeros(rows.len());
        for (i, &r) in rows.iter().enumerate() {
            design[(i, 0)] = 1.0;
            for (j, v) in features.row(r).into_iter().enumerate() {
                design[(i, j + 1)] = v;
            }
            target[i] = labels.values[r];
        }

        let ls = solve_least_squares(&design, &target)
            .ok_or_else(|| AppError::external("Least squares solve failed (ill-conditioned features)."))?;
        if ls.rank < p + 1 {
            warn!(rank = ls.rank, columns = p + 1, "design matrix is rank deficient");
        }
        debug!(
            rows = rows.len(),
            skipped = features.n_rows() - rows.len(),
            features = p,
            "fitted linear model"
        );
        let beta = ls.beta;

        Ok(Self {
            feature_names: features.columns().to_vec(),
            intercept: beta[0],
            coefficients: beta.iter().skip(1).copied().collect(),
        })
    }
}

impl Regressor for LinearModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64, AppError> {
        if row.len() != self.coefficients.len() {
            return Err(AppError::input(format!(
                "Expected {} features, got {}.",
                self.coefficients.len(),
                row.len()
            )));
        }
        let y = self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>();
        if !y.is_finite() {
            return Err(AppError::external("Non-finite model prediction."));
        }
        Ok(y)
    }
}
