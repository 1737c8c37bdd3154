//! Return features and correlation-based selection.
//!
//! Prices are turned into percentage returns with the backward delta
//!
//! ```text
//! return[t] = (price[t-1] - price[t]) * 100 / price[t]
//! ```
//!
//! so a price rise from `t-1` to `t` gives a negative value. Downstream column
//! names and trained models depend on this convention.
//!
//! The label is the target's return two rows ahead, stored on row `t` as
//! `"<target> Return D+2"`.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::debug;

use crate::config::target_return_column;
use crate::domain::{Series, Table, shift};
use crate::error::AppError;

/// Output of `keep_correlated_features`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSelection {
    /// Selected columns and their train correlation, ascending.
    pub correlations: Vec<(String, f64)>,
    pub train: Table,
    pub valid: Table,
    pub test: Table,
}

impl FeatureSelection {
    pub fn columns(&self) -> Vec<String> {
        self.correlations.iter().map(|(c, _)| c.clone()).collect()
    }
}

/// Convert prices to backward percentage returns and append the D+2 label.
///
/// Rows where the target return or the label is undefined are dropped; other
/// missing values are kept.
pub fn transform_to_stock_return(prices: &Table, target: &str) -> Result<Table, AppError> {
    prices.require_column(target)?;

    let returns = prices.map_columns(backward_returns);
    let target_returns = returns.require_column(target)?;
    let label = shift(target_returns, -2);

    let label_name = target_return_column(target);
    let with_label = returns.with_column(label_name.clone(), label)?;

    let target_col = with_label.require_column(target)?;
    let label_col = with_label.require_column(&label_name)?;
    let out = with_label.filter_rows(|r| !target_col[r].is_nan() && !label_col[r].is_nan());

    debug!(
        rows_in = prices.n_rows(),
        rows_out = out.n_rows(),
        columns = out.n_cols(),
        "computed return table"
    );
    Ok(out)
}

fn backward_returns(prices: &[f64]) -> Vec<f64> {
    let prev = shift(prices, 1);
    prev.iter()
        .zip(prices)
        .map(|(p, c)| (p - c) * 100.0 / c)
        .collect()
}

/// Pearson correlation over the rows where both values are present.
///
/// `None` when fewer than two pairs remain or either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Keep the `k` train columns most correlated (signed) with the label.
///
/// Ranking uses the train table only; validation and test are projected onto
/// the same columns in the same order.
pub fn keep_correlated_features(
    train: &Table,
    valid: &Table,
    test: &Table,
    target: &str,
    k: usize,
) -> Result<FeatureSelection, AppError> {
    let label_name = target_return_column(target);
    let label = train.require_column(&label_name)?;
    valid.require_column(&label_name)?;
    test.require_column(&label_name)?;

    let columns: Vec<(&str, &[f64])> = train.iter_columns().collect();
    let scored: Vec<(usize, String, f64)> = columns
        .par_iter()
        .enumerate()
        .filter_map(|(pos, (name, values))| {
            pearson(values, label).map(|r| (pos, name.to_string(), r))
        })
        .collect();

    let correlations = rank_top_k(scored, k);
    debug!(selected = correlations.len(), "ranked correlated features");

    let names: Vec<String> = correlations.iter().map(|(c, _)| c.clone()).collect();
    Ok(FeatureSelection {
        train: train.select_columns(&names)?,
        valid: valid.select_columns(&names)?,
        test: test.select_columns(&names)?,
        correlations,
    })
}

/// Top `k` by descending correlation, then re-sorted ascending. Both sorts are
/// stable on column position.
fn rank_top_k(mut scored: Vec<(usize, String, f64)>, k: usize) -> Vec<(String, f64)> {
    scored.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored.sort_by(|a, b| {
        a.2.partial_cmp(&b.2)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.into_iter().map(|(_, name, r)| (name, r)).collect()
}

/// Split a table into its feature columns and the `label` series.
pub fn split_features_labels(table: &Table, label: &str) -> Result<(Table, Series), AppError> {
    let labels = table.series(label)?;
    let features = table.drop_columns(&[label.to_string()])?;
    Ok((features, labels))
}
