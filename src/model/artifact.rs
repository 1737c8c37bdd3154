//! The persisted production model.
//!
//! Layout (JSON):
//!
//! ```text
//! {
//!   "model_data": { "model_name": "...", "model_object": { ...estimator... } },
//!   "target": "BMRI.JK",
//!   "label": "BMRI.JK Return D+2",
//!   "feature_names": [...],
//!   "trained_at": "...",
//!   "metrics": { "train": {...}, "valid": {...}, "test": {...} }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Series, Table};
use crate::error::AppError;
use crate::model::linear::{LinearModel, Regressor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    pub model_name: String,
    pub model_object: LinearModel,
}

/// Error statistics of a model on one split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub rmse: f64,
    pub mae: f64,
    /// `None` when the labels are constant.
    pub r2: Option<f64>,
    pub n: usize,
}

impl Metrics {
    /// Evaluate on the rows with complete features and a present label.
    pub fn evaluate<M: Regressor + ?Sized>(
        model: &M,
        features: &Table,
        labels: &Series,
    ) -> Result<Metrics, AppError> {
        let ordered = features.select_columns(model.feature_names())?;
        if ordered.n_rows() != labels.len() {
            return Err(AppError::input("Feature and label row counts differ."));
        }

        let mut pairs = Vec::with_capacity(labels.len());
        for r in 0..ordered.n_rows() {
            let row = ordered.row(r);
            let y = labels.values[r];
            if !y.is_finite() || row.iter().any(|v| !v.is_finite()) {
                continue;
            }
            pairs.push((y, model.predict_row(&row)?));
        }
        if pairs.is_empty() {
            return Err(AppError::input(format!(
                "No complete rows to evaluate '{}' on.",
                labels.name
            )));
        }

        let n = pairs.len() as f64;
        let sse: f64 = pairs.iter().map(|(y, p)| (y - p).powi(2)).sum();
        let mae = pairs.iter().map(|(y, p)| (y - p).abs()).sum::<f64>() / n;
        let mean = pairs.iter().map(|(y, _)| y).sum::<f64>() / n;
        let sst: f64 = pairs.iter().map(|(y, _)| (y - mean).powi(2)).sum();

        Ok(Metrics {
            rmse: (sse / n).sqrt(),
            mae,
            r2: (sst > 0.0).then(|| 1.0 - sse / sst),
            n: pairs.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub train: Metrics,
    pub valid: Metrics,
    pub test: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_data: ModelData,
    pub target: String,
    pub label: String,
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub metrics: SplitMetrics,
}

impl ModelArtifact {
    pub fn model(&self) -> &LinearModel {
        &self.model_data.model_object
    }
}

/// Training inputs for one split.
pub struct LabeledSet<'a> {
    pub features: &'a Table,
    pub labels: &'a Series,
}

/// Fit on train and score on all three splits.
pub fn train_model(
    target: &str,
    train: LabeledSet<'_>,
    valid: LabeledSet<'_>,
    test: LabeledSet<'_>,
) -> Result<ModelArtifact, AppError> {
    let model = LinearModel::fit(train.features, train.labels)?;
    let metrics = SplitMetrics {
        train: Metrics::evaluate(&model, train.features, train.labels)?,
        valid: Metrics::evaluate(&model, valid.features, valid.labels)?,
        test: Metrics::evaluate(&model, test.features, test.labels)?,
    };

    Ok(ModelArtifact {
        feature_names: model.feature_names.clone(),
        label: train.labels.name.clone(),
        target: target.to_string(),
        trained_at: Utc::now(),
        metrics,
        model_data: ModelData {
            model_name: "linear_regression".to_string(),
            model_object: model,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RowIndex;

    fn set(n: usize, offset: f64) -> (Table, Series) {
        let idx = RowIndex::Positional(n);
        let x: Vec<f64> = (0..n).map(|i| i as f64 + offset).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        (
            Table::from_columns(idx.clone(), vec![("A.JK".to_string(), x)]).unwrap(),
            Series::new("T Return D+2", idx, y).unwrap(),
        )
    }

    #[test]
    fn trains_and_scores_every_split() {
        let (xt, yt) = set(20, 0.0);
        let (xv, yv) = set(5, 20.0);
        let (xs, ys) = set(5, 25.0);
        let artifact = train_model(
            "T",
            LabeledSet { features: &xt, labels: &yt },
            LabeledSet { features: &xv, labels: &yv },
            LabeledSet { features: &xs, labels: &ys },
        )
        .unwrap();

        assert_eq!(artifact.feature_names, vec!["A.JK".to_string()]);
        assert_eq!(artifact.label, "T Return D+2");
        assert!(artifact.metrics.test.rmse < 1e-8);
        assert_eq!(artifact.metrics.valid.n, 5);
        assert!((artifact.metrics.train.r2.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let (xt, yt) = set(10, 0.0);
        let artifact = train_model(
            "T",
            LabeledSet { features: &xt, labels: &yt },
            LabeledSet { features: &xt, labels: &yt },
            LabeledSet { features: &xt, labels: &yt },
        )
        .unwrap();
        let json = serde_json::to_string(&artifact).unwrap();
        assert!(json.contains("\"model_object\""));
        let back: ModelArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn constant_labels_have_no_r2() {
        let idx = RowIndex::Positional(3);
        let x = Table::from_columns(idx.clone(), vec![("a".to_string(), vec![1.0, 2.0, 3.0])]).unwrap();
        let y = Series::new("y", idx, vec![1.0, 1.0, 1.0]).unwrap();
        let m = LinearModel::fit(&x, &y).unwrap();
        let metrics = Metrics::evaluate(&m, &x, &y).unwrap();
        assert!(metrics.r2.is_none());
    }
}
