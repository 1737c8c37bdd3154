//! Schema and range validation for price tables.
//!
//! Detection is separate from repair: `check_data` only reports which columns
//! are bad. Dropping or patching them is the caller's decision (see
//! `pipeline::clean`), typically by re-running the check with printing off
//! and consuming `offending_columns()`.
//!
//! Two kinds of problems are distinguished:
//! - a structural one (the row index is not of the expected kind), which stops
//!   the check immediately and is carried as `structural`
//! - column violations, which are collected for every column

use tracing::debug;

use crate::config::Config;
use crate::domain::{IndexKind, Table};

/// What a table must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    pub index: IndexKind,
    /// Require every value to be `>= 0` (prices). Return-valued feature vectors
    /// are signed and turn this off.
    pub non_negative: bool,
}

impl ValidationRules {
    /// Rules for persisted price tables.
    pub fn prices(config: &Config) -> Self {
        Self {
            index: config.datetime_index,
            non_negative: true,
        }
    }

    /// Rules for a single submitted feature vector.
    pub fn feature_vector() -> Self {
        Self {
            index: IndexKind::Positional,
            non_negative: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Contains values that are not real numbers (`±inf`).
    NonReal,
    /// Contains negative or missing values.
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnViolation {
    pub column: String,
    pub kind: ViolationKind,
}

impl ColumnViolation {
    pub fn message(&self) -> String {
        match self.kind {
            ViolationKind::NonReal => format!("Column ({}) has a non-float data type", self.column),
            ViolationKind::OutOfRange => format!("an error occurs in {} column", self.column),
        }
    }
}

/// The row index is not of the expected kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralError {
    pub expected: IndexKind,
    pub found: IndexKind,
}

impl std::fmt::Display for StructuralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "an error occurs in index format, should be {} (found {}).",
            self.expected.display_name(),
            self.found.display_name()
        )
    }
}

/// Outcome of `check_data`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub n_columns: usize,
    pub violations: Vec<ColumnViolation>,
    pub structural: Option<StructuralError>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.structural.is_none()
    }

    pub fn structural(&self) -> Option<&StructuralError> {
        self.structural.as_ref()
    }

    /// Offending column names, first-seen order, each listed once.
    pub fn offending_columns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for v in &self.violations {
            if !out.contains(&v.column) {
                out.push(v.column.clone());
            }
        }
        out
    }

    /// Human-readable summary; empty when clean.
    pub fn summary(&self) -> String {
        if let Some(err) = &self.structural {
            return err.to_string();
        }
        if self.violations.is_empty() {
            return String::new();
        }
        let mut out = format!(
            "Total errors: {} errors out of {}",
            self.violations.len(),
            self.n_columns
        );
        for v in &self.violations {
            out.push('\n');
            out.push_str(&v.message());
        }
        out
    }
}

/// Check `table` against `rules`.
///
/// With `print_errors` set, a non-clean report is printed before returning.
/// The returned report is the same either way.
pub fn check_data(table: &Table, rules: ValidationRules, print_errors: bool) -> ValidationReport {
    let report = collect(table, rules);
    debug!(
        columns = report.n_columns,
        violations = report.violations.len(),
        structural = report.structural.is_some(),
        "validated table"
    );
    if print_errors && !report.is_clean() {
        println!("\n{}", report.summary());
    }
    report
}

fn collect(table: &Table, rules: ValidationRules) -> ValidationReport {
    let mut report = ValidationReport {
        n_columns: table.n_cols(),
        ..ValidationReport::default()
    };

    let found = table.index().kind();
    if found != rules.index {
        report.structural = Some(StructuralError {
            expected: rules.index,
            found,
        });
        return report;
    }

    for (name, values) in table.iter_columns() {
        if values.iter().any(|v| v.is_infinite()) {
            report.violations.push(ColumnViolation {
                column: name.to_string(),
                kind: ViolationKind::NonReal,
            });
        }
        if rules.non_negative && !values.iter().all(|v| *v >= 0.0) {
            report.violations.push(ColumnViolation {
                column: name.to_string(),
                kind: ViolationKind::OutOfRange,
            });
        }
    }

    report
}
