//! Terminal output for every command.
//!
//! Formatting lives here so pipeline and model code only return values.

use crate::data::yahoo::FetchReport;
use crate::model::{Metrics, ModelArtifact};
use crate::pipeline::clean::CleanOutcome;
use crate::pipeline::features::FeatureSelection;
use crate::report::{DatasetSummary, DayCrossSection, ForecastPanel, PerformancePanel};

/// Dataset coverage plus the min/max of each statistic across columns.
pub fn format_dataset_summary(title: &str, summary: &DatasetSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {title} ===\n"));
    out.push_str(&format!("Shape: {} rows x {} columns\n", summary.rows, summary.columns));
    match (summary.first_date, summary.last_date) {
        (Some(first), Some(last)) => {
            out.push_str(&format!("Dates: {first} .. {last} (count={})\n", summary.rows));
        }
        _ => out.push_str(&format!("Index: positional (count={})\n", summary.rows)),
    }

    out.push('\n');
    out.push_str(format!("{:<8} {:>14} {:>14}\n", "stat", "min", "max").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<8} {:-<14} {:-<14}\n", "", "", "").trim_end());
    out.push('\n');
    for (name, lo, hi) in &summary.stats {
        out.push_str(format!("{:<8} {:>14} {:>14}\n", name, fmt_num(*lo), fmt_num(*hi)).trim_end());
        out.push('\n');
    }

    out
}

pub fn format_forecast_panel(panel: &ForecastPanel) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== {} forecast ===\n", panel.target));
    out.push_str(&format!(
        "Actual price ({}): {:.2} ({:+.2}%)\n",
        fmt_date(panel.actual_date),
        panel.actual_price,
        panel.actual_change * 100.0
    ));
    out.push_str(&format!(
        "Predicted return D+2 ({}): {:+.4}%\n",
        fmt_date(panel.predicted_date),
        panel.predicted_return
    ));
    out.push_str(&format!(
        "Predicted price: {:.2} ({:+.2}%)\n",
        panel.predicted_price,
        panel.predicted_change * 100.0
    ));
    out.push_str(&format!(
        "Difference: {:+.2} ({:+.2}%)\n",
        panel.price_difference(),
        panel.change_difference() * 100.0
    ));

    out
}

/// One block per day: the target, the shared scale, then the other tickers.
pub fn format_recent_days(target: &str, days: &[DayCrossSection]) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Last {} days ===\n", days.len()));
    for day in days {
        out.push_str(&format!(
            "{}  {} {}  (scale +/-{})\n",
            fmt_date(day.date),
            target,
            fmt_num(day.target_value),
            fmt_num(day.symmetric_range)
        ));
        let others: Vec<String> = day
            .others
            .iter()
            .map(|(name, v)| format!("{name} {}", fmt_num(*v)))
            .collect();
        if !others.is_empty() {
            out.push_str(&format!("  others: {}\n", fmt_list(&others, 8)));
        }
    }

    out
}

pub fn format_performance(panel: &PerformancePanel) -> String {
    let mut out = String::new();

    match (panel.from, panel.to) {
        (Some(from), Some(to)) => {
            out.push_str(&format!("=== Performance over {} days ({from} .. {to}) ===\n", panel.days));
        }
        _ => out.push_str(&format!("=== Performance over {} rows ===\n", panel.days)),
    }
    out.push_str(format!("{:<12} {:>10} {:>10}\n", "ticker", "last day", "period").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<10} {:-<10}\n", "", "", "").trim_end());
    out.push('\n');
    for t in &panel.tickers {
        out.push_str(
            format!("{:<12} {:>10} {:>10}\n", truncate(&t.ticker, 12), fmt_pct(t.last_day), fmt_pct(t.period))
                .trim_end(),
        );
        out.push('\n');
    }

    out
}

pub fn format_fetch_report(report: &FetchReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Fetched {} tickers over {} dates.\n",
        report.table.n_cols(),
        report.table.n_rows()
    ));
    if report.is_partial() {
        out.push_str(&format!("Failed tickers ({}):\n", report.failures.len()));
        for f in &report.failures {
            out.push_str(&format!("- {:<12} {}\n", f.ticker, f.reason));
        }
    }

    out
}

pub fn format_clean_outcome(outcome: &CleanOutcome) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Clean dataset: {} rows x {} columns ({} rows dropped)\n",
        outcome.table.n_rows(),
        outcome.table.n_cols(),
        outcome.rows_dropped
    ));
    if !outcome.sparse_columns.is_empty() {
        out.push_str(&format!(
            "Dropped for missing data: {}\n",
            fmt_list(&outcome.sparse_columns, 12)
        ));
    }
    if !outcome.rejected_columns.is_empty() {
        out.push_str(&format!(
            "Dropped by validation: {}\n",
            fmt_list(&outcome.rejected_columns, 12)
        ));
    }

    out
}

pub fn format_feature_selection(selection: &FeatureSelection) -> String {
    let mut out = String::new();

    out.push_str(&format!("Selected features ({}):\n", selection.correlations.len()));
    for (name, corr) in &selection.correlations {
        out.push_str(&format!("  {:<24} {:>8.4}\n", truncate(name, 24), corr));
    }

    out
}

pub fn format_training(artifact: &ModelArtifact) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Model: {} | target={} | features={}\n",
        artifact.model_data.model_name,
        artifact.target,
        artifact.feature_names.len()
    ));
    out.push_str(format!("{:<6} {:>6} {:>10} {:>10} {:>8}\n", "split", "n", "rmse", "mae", "r2").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<6} {:-<10} {:-<10} {:-<8}\n", "", "", "", "", "").trim_end());
    out.push('\n');
    for (name, m) in [
        ("train", &artifact.metrics.train),
        ("valid", &artifact.metrics.valid),
        ("test", &artifact.metrics.test),
    ] {
        out.push_str(&metrics_row(name, m));
    }

    out
}

fn metrics_row(name: &str, m: &Metrics) -> String {
    let r2 = m.r2.map(|v| format!("{v:.4}")).unwrap_or_else(|| "-".to_string());
    let mut line = format!("{:<6} {:>6} {:>10.4} {:>10.4} {:>8}", name, m.n, m.rmse, m.mae, r2)
        .trim_end()
        .to_string();
    line.push('\n');
    line
}

fn fmt_num(v: f64) -> String {
    if v.is_nan() {
        "-".to_string()
    } else {
        format!("{v:.4}")
    }
}

fn fmt_pct(v: f64) -> String {
    if v.is_finite() {
        format!("{v:+.2}%")
    } else {
        "-".to_string()
    }
}

fn fmt_date(d: Option<chrono::NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_else(|| "latest".to_string())
}

fn fmt_list(items: &[String], max: usize) -> String {
    if items.len() <= max {
        return items.join(", ");
    }
    format!("{}, ... (+{} more)", items[..max].join(", "), items.len() - max)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::report::TickerPerformance;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn summary_lists_every_stat() {
        let summary = DatasetSummary {
            rows: 3,
            columns: 2,
            first_date: Some(d(1)),
            last_date: Some(d(3)),
            stats: vec![("count", 3.0, 3.0), ("std", f64::NAN, f64::NAN)],
        };
        let text = format_dataset_summary("clean", &summary);
        assert!(text.starts_with("=== clean ===\n"));
        assert!(text.contains("Dates: 2024-05-01 .. 2024-05-03 (count=3)"));
        assert!(text.contains("count            3.0000         3.0000"));
        assert!(text.lines().any(|l| l.starts_with("std") && l.ends_with('-')));
    }

    #[test]
    fn panel_shows_signed_values() {
        let panel = ForecastPanel {
            target: "BMRI.JK".to_string(),
            actual_date: Some(d(2)),
            actual_price: 5112.0,
            actual_change: -0.0125,
            predicted_date: None,
            predicted_return: 0.75,
            predicted_price: 5150.0,
            predicted_change: 0.0,
        };
        let text = format_forecast_panel(&panel);
        assert!(text.contains("Actual price (2024-05-02): 5112.00 (-1.25%)"));
        assert!(text.contains("Predicted return D+2 (latest): +0.7500%"));
        assert!(text.contains("Predicted price: 5150.00 (+0.00%)"));
        assert!(text.contains("Difference: +38.00 (+1.25%)"));
    }

    #[test]
    fn recent_days_list_target_then_others() {
        let days = vec![
            DayCrossSection {
                date: Some(d(3)),
                target_value: -2.0,
                others: vec![("A".to_string(), 1.5), ("B".to_string(), f64::NAN)],
                symmetric_range: 2.0,
            },
            DayCrossSection {
                date: Some(d(2)),
                target_value: 1.0,
                others: Vec::new(),
                symmetric_range: 1.0,
            },
        ];
        let text = format_recent_days("T", &days);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=== Last 2 days ===");
        assert_eq!(lines[1], "2024-05-03  T -2.0000  (scale +/-2.0000)");
        assert_eq!(lines[2], "  others: A 1.5000, B -");
        assert_eq!(lines[3], "2024-05-02  T 1.0000  (scale +/-1.0000)");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn performance_rows_are_signed_percentages() {
        let panel = PerformancePanel {
            days: 10,
            from: Some(d(1)),
            to: Some(d(14)),
            tickers: vec![
                TickerPerformance {
                    ticker: "BBCA.JK".to_string(),
                    last_day: 0.5,
                    period: -3.25,
                },
                TickerPerformance {
                    ticker: "GONE.JK".to_string(),
                    last_day: f64::NAN,
                    period: f64::NAN,
                },
            ],
        };
        let text = format_performance(&panel);
        assert!(text.starts_with("=== Performance over 10 days (2024-05-01 .. 2024-05-14) ===\n"));
        assert!(text.contains("BBCA.JK          +0.50%     -3.25%"));
        assert!(text.lines().any(|l| l.starts_with("GONE.JK") && l.ends_with('-')));
    }

    #[test]
    fn long_lists_are_shortened() {
        let items: Vec<String> = (0..5).map(|i| format!("T{i}")).collect();
        assert_eq!(fmt_list(&items, 2), "T0, T1, ... (+3 more)");
        assert_eq!(truncate("ABCDEFGH", 4), "ABC.");
        assert_eq!(truncate("ABC", 4), "ABC");
    }
}
