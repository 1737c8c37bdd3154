//! Read-only dashboards over persisted artifacts.
//!
//! - `summarize_dataset`: index coverage plus the spread of per-column
//!   statistics across tickers (a wide table has too many columns to print a
//!   full describe)
//! - `forecast_panel`: latest actual price of the target next to the latest
//!   predicted D+2 return, the price it implies and the difference
//! - `recent_days`: the last few rows of the clean table, newest first, target
//!   against every other ticker on a scale centred on zero
//! - `ticker_performance`: percent change of each ticker over the last days

pub mod format;

pub use format::*;

use chrono::NaiveDate;

use crate::domain::{Series, Table};
use crate::error::AppError;

/// Per-column statistics, in display order.
pub const STAT_NAMES: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

/// Column statistics of the non-missing values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

impl Describe {
    pub fn of(values: &[f64]) -> Option<Describe> {
        let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
        if v.is_empty() {
            return None;
        }
        v.sort_by(f64::total_cmp);

        let n = v.len() as f64;
        let mean = v.iter().sum::<f64>() / n;
        let std = if v.len() > 1 {
            (v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };

        Some(Describe {
            count: v.len(),
            mean,
            std,
            min: v[0],
            q25: quantile(&v, 0.25),
            q50: quantile(&v, 0.50),
            q75: quantile(&v, 0.75),
            max: v[v.len() - 1],
        })
    }

    /// Values in `STAT_NAMES` order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.count as f64,
            self.mean,
            self.std,
            self.min,
            self.q25,
            self.q50,
            self.q75,
            self.max,
        ]
    }
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// `(stat, min across columns, max across columns)` in `STAT_NAMES` order.
    pub stats: Vec<(&'static str, f64, f64)>,
}

pub fn summarize_dataset(table: &Table) -> DatasetSummary {
    let described: Vec<[f64; 8]> = table
        .iter_columns()
        .filter_map(|(_, values)| Describe::of(values))
        .map(|d| d.values())
        .collect();

    let stats = STAT_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values = described.iter().map(|d| d[i]).filter(|v| !v.is_nan());
            let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
            if lo.is_finite() {
                (*name, lo, hi)
            } else {
                (*name, f64::NAN, f64::NAN)
            }
        })
        .collect();

    let dates = table.index().dates();
    DatasetSummary {
        rows: table.n_rows(),
        columns: table.n_cols(),
        first_date: dates.and_then(|d| d.first().copied()),
        last_date: dates.and_then(|d| d.last().copied()),
        stats,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPanel {
    pub target: String,
    pub actual_date: Option<NaiveDate>,
    pub actual_price: f64,
    /// Fractional change from the previous close.
    pub actual_change: f64,
    pub predicted_date: Option<NaiveDate>,
    /// Predicted return D+2 in percent, backward-delta convention.
    pub predicted_return: f64,
    /// Price the predicted return implies from the latest close.
    pub predicted_price: f64,
    /// Fractional change of `predicted_price` from the previous close.
    pub predicted_change: f64,
}

impl ForecastPanel {
    pub fn price_difference(&self) -> f64 {
        self.predicted_price - self.actual_price
    }

    pub fn change_difference(&self) -> f64 {
        self.predicted_change - self.actual_change
    }
}

/// Latest actual price and change of `target` next to the latest prediction.
pub fn forecast_panel(prices: &Table, predictions: &Series, target: &str) -> Result<ForecastPanel, AppError> {
    let series = prices.series(target)?;
    let dates = series.index.dates();
    let valid: Vec<usize> = (0..series.len())
        .filter(|&i| series.values[i].is_finite())
        .collect();
    let [.., prev, last] = valid.as_slice() else {
        return Err(AppError::input(format!(
            "Need at least two prices of {target} for the forecast panel."
        )));
    };

    let latest = series.values[*last];
    let previous = series.values[*prev];
    let (predicted_date, predicted_return) = predictions
        .last_valid()
        .ok_or_else(|| AppError::input("Prediction series has no values."))?;

    // r = (earlier - later) * 100 / later, solved for the later price.
    let predicted_price = latest / (1.0 + predicted_return / 100.0);
    if !predicted_price.is_finite() {
        return Err(AppError::external(format!(
            "Predicted return {predicted_return}% does not give a finite price."
        )));
    }

    Ok(ForecastPanel {
        target: target.to_string(),
        actual_date: dates.map(|d| d[*last]),
        actual_price: latest,
        actual_change: (latest - previous) / previous,
        predicted_date,
        predicted_return,
        predicted_price,
        predicted_change: (predicted_price - previous) / previous,
    })
}

/// One row of the clean table.
#[derive(Debug, Clone, PartialEq)]
pub struct DayCrossSection {
    pub date: Option<NaiveDate>,
    pub target_value: f64,
    /// Every other column, in table order.
    pub others: Vec<(String, f64)>,
    /// `max(|min|, |max|)` over the row, target included; `NaN` when the row
    /// has no finite value.
    pub symmetric_range: f64,
}

/// The last `n` rows of `table`, newest first.
pub fn recent_days(table: &Table, target: &str, n: usize) -> Result<Vec<DayCrossSection>, AppError> {
    let target_pos = table
        .column_position(target)
        .ok_or_else(|| AppError::input(format!("Column '{target}' not found.")))?;
    let dates = table.index().dates();

    let first = table.n_rows().saturating_sub(n);
    let days = (first..table.n_rows())
        .rev()
        .map(|r| {
            let row = table.row(r);
            let (lo, hi) = row
                .iter()
                .filter(|v| v.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
            let symmetric_range = if lo.is_finite() {
                lo.abs().max(hi.abs())
            } else {
                f64::NAN
            };
            let others = table
                .columns()
                .iter()
                .zip(&row)
                .enumerate()
                .filter(|(i, _)| *i != target_pos)
                .map(|(_, (name, v))| (name.clone(), *v))
                .collect();
            DayCrossSection {
                date: dates.map(|d| d[r]),
                target_value: row[target_pos],
                others,
                symmetric_range,
            }
        })
        .collect();
    Ok(days)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerPerformance {
    pub ticker: String,
    /// Percent change from the previous row to the last row.
    pub last_day: f64,
    /// Percent change from the first row of the window to the last row.
    pub period: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformancePanel {
    /// Rows between the window's first and last row; shorter than requested
    /// when the table is.
    pub days: usize,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub tickers: Vec<TickerPerformance>,
}

/// Percent change of each ticker over the last `days` rows of a price table.
///
/// Changes here are forward, `(later - earlier) * 100 / earlier`, as a price
/// move is usually read. An empty `tickers` means every column.
pub fn ticker_performance(table: &Table, tickers: &[String], days: usize) -> Result<PerformancePanel, AppError> {
    if days == 0 {
        return Err(AppError::input("Performance window must be at least one day."));
    }
    let n = table.n_rows();
    if n < 2 {
        return Err(AppError::input(format!(
            "Need at least two rows for the performance panel (got {n})."
        )));
    }
    let days = days.min(n - 1);
    let (start, prev, last) = (n - 1 - days, n - 2, n - 1);

    let names: Vec<String> = if tickers.is_empty() {
        table.columns().to_vec()
    } else {
        tickers.to_vec()
    };
    let pct = |from: f64, to: f64| (to - from) * 100.0 / from;
    let tickers = names
        .into_iter()
        .map(|ticker| {
            let values = table.require_column(&ticker)?;
            Ok(TickerPerformance {
                last_day: pct(values[prev], values[last]),
                period: pct(values[start], values[last]),
                ticker,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let dates = table.index().dates();
    Ok(PerformancePanel {
        days,
        from: dates.map(|d| d[start]),
        to: dates.map(|d| d[last]),
        tickers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RowIndex;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn describe_matches_reference_values() {
        let d = Describe::of(&[4.0, 1.0, f64::NAN, 3.0, 2.0]).unwrap();
        assert_eq!(d.count, 4);
        assert!((d.mean - 2.5).abs() < 1e-12);
        assert!((d.std - 1.2909944487358056).abs() < 1e-12);
        assert_eq!((d.min, d.max), (1.0, 4.0));
        assert!((d.q25 - 1.75).abs() < 1e-12);
        assert!((d.q50 - 2.5).abs() < 1e-12);
        assert!((d.q75 - 3.25).abs() < 1e-12);
        assert!(Describe::of(&[f64::NAN]).is_none());
    }

    #[test]
    fn summary_spans_columns() {
        let t = Table::from_columns(
            RowIndex::Dates(vec![d(1), d(2), d(3)]),
            vec![
                ("A".to_string(), vec![1.0, 2.0, 3.0]),
                ("B".to_string(), vec![10.0, 20.0, 30.0]),
            ],
        )
        .unwrap();
        let s = summarize_dataset(&t);
        assert_eq!((s.rows, s.columns), (3, 2));
        assert_eq!(s.first_date, Some(d(1)));
        assert_eq!(s.last_date, Some(d(3)));
        let max = s.stats.iter().find(|(n, _, _)| *n == "max").unwrap();
        assert_eq!((max.1, max.2), (3.0, 30.0));
    }

    #[test]
    fn panel_uses_latest_values() {
        let prices = Table::from_columns(
            RowIndex::Dates(vec![d(1), d(2), d(3)]),
            vec![("T".to_string(), vec![100.0, 110.0, f64::NAN])],
        )
        .unwrap();
        let preds = Series::new("T Return D+2", RowIndex::Dates(vec![d(1), d(2)]), vec![0.5, -1.25]).unwrap();
        let panel = forecast_panel(&prices, &preds, "T").unwrap();
        assert_eq!(panel.actual_date, Some(d(2)));
        assert_eq!(panel.actual_price, 110.0);
        assert!((panel.actual_change - 0.1).abs() < 1e-12);
        assert_eq!(panel.predicted_date, Some(d(2)));
        assert_eq!(panel.predicted_return, -1.25);
        // 110 / (1 - 0.0125)
        assert!((panel.predicted_price - 111.39240506329114).abs() < 1e-9);
        assert!((panel.predicted_change - 0.1139240506329114).abs() < 1e-12);
        assert!((panel.price_difference() - 1.39240506329114).abs() < 1e-9);
        assert!((panel.change_difference() - 0.0139240506329114).abs() < 1e-12);
    }

    #[test]
    fn panel_rejects_total_loss_prediction() {
        let prices = Table::from_columns(
            RowIndex::Dates(vec![d(1), d(2)]),
            vec![("T".to_string(), vec![100.0, 110.0])],
        )
        .unwrap();
        let preds = Series::new("p", RowIndex::Positional(1), vec![-100.0]).unwrap();
        assert!(forecast_panel(&prices, &preds, "T").is_err());
    }

    #[test]
    fn recent_days_are_newest_first_with_symmetric_range() {
        let t = Table::from_columns(
            RowIndex::Dates(vec![d(1), d(2), d(3)]),
            vec![
                ("A".to_string(), vec![1.0, -4.0, 2.0]),
                ("T".to_string(), vec![0.5, 3.0, f64::NAN]),
                ("B".to_string(), vec![-0.5, 1.0, -1.0]),
            ],
        )
        .unwrap();
        let days = recent_days(&t, "T", 2).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, Some(d(3)));
        assert!(days[0].target_value.is_nan());
        assert_eq!(days[0].symmetric_range, 2.0);
        assert_eq!(days[1].date, Some(d(2)));
        assert_eq!(days[1].target_value, 3.0);
        assert_eq!(days[1].symmetric_range, 4.0);
        assert_eq!(
            days[1].others,
            vec![("A".to_string(), -4.0), ("B".to_string(), 1.0)]
        );

        assert_eq!(recent_days(&t, "T", 10).unwrap().len(), 3);
        assert!(recent_days(&t, "X", 2).is_err());
    }

    #[test]
    fn performance_over_window() {
        let t = Table::from_columns(
            RowIndex::Dates(vec![d(1), d(2), d(3), d(4)]),
            vec![
                ("A".to_string(), vec![100.0, 80.0, 100.0, 110.0]),
                ("B".to_string(), vec![50.0, 50.0, 40.0, 30.0]),
            ],
        )
        .unwrap();
        let panel = ticker_performance(&t, &[], 2).unwrap();
        assert_eq!(panel.days, 2);
        assert_eq!((panel.from, panel.to), (Some(d(2)), Some(d(4))));
        let a = &panel.tickers[0];
        assert_eq!(a.ticker, "A");
        assert!((a.last_day - 10.0).abs() < 1e-12);
        assert!((a.period - 37.5).abs() < 1e-12);
        assert!((panel.tickers[1].period + 40.0).abs() < 1e-12);

        // A window longer than the table is clipped to the whole table.
        let panel = ticker_performance(&t, &["B".to_string()], 10).unwrap();
        assert_eq!(panel.days, 3);
        assert_eq!(panel.tickers.len(), 1);
        assert!((panel.tickers[0].period + 40.0).abs() < 1e-12);

        assert!(ticker_performance(&t, &["X".to_string()], 2).is_err());
        assert!(ticker_performance(&t, &[], 0).is_err());
    }

    #[test]
    fn panel_needs_two_prices() {
        let prices = Table::from_columns(
            RowIndex::Dates(vec![d(1)]),
            vec![("T".to_string(), vec![100.0])],
        )
        .unwrap();
        let preds = Series::new("p", RowIndex::Positional(1), vec![1.0]).unwrap();
        assert!(forecast_panel(&prices, &preds, "T").is_err());
    }
}
