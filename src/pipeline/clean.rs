//! Raw dataset cleaning.
//!
//! Steps, in order:
//! 1. sort rows by date
//! 2. drop rows with fewer than 1% of columns present
//! 3. drop columns with fewer than 1% of rows present
//! 4. drop columns that still have a missing value
//! 5. validate, drop the offending columns, validate again
//! 6. overwrite the configured known-bad data points

use tracing::{debug, info, warn};

use crate::config::{Config, Patch};
use crate::domain::Table;
use crate::error::AppError;
use crate::pipeline::validate::{ValidationReport, ValidationRules, check_data};

/// Minimum share of present values a row or column needs to be kept.
const PRESENCE_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table: Table,
    pub rows_dropped: usize,
    /// Columns removed for missing data.
    pub sparse_columns: Vec<String>,
    /// Columns removed by the validator.
    pub rejected_columns: Vec<String>,
    /// Validation of the final table.
    pub report: ValidationReport,
}

/// Run the full cleaning sequence on a raw price table.
pub fn clean_raw_dataset(raw: &Table, config: &Config) -> Result<CleanOutcome, AppError> {
    let rules = ValidationRules::prices(config);

    let Pruned {
        table,
        rows_dropped,
        sparse_columns,
    } = prune_missing(raw)?;

    // Show the problems, then act on the list with printing suppressed.
    let first = check_data(&table, rules, config.print_debug);
    if let Some(err) = first.structural() {
        return Err(AppError::structural(err.to_string()));
    }
    let rejected_columns = check_data(&table, rules, false).offending_columns();
    for column in &rejected_columns {
        warn!(column = %column, "dropping column rejected by validation");
    }
    let mut table = table.drop_columns(&rejected_columns)?;

    let report = check_data(&table, rules, config.print_debug);
    apply_patches(&mut table, &config.patches);

    Ok(CleanOutcome {
        table,
        rows_dropped,
        sparse_columns,
        rejected_columns,
        report,
    })
}

/// A raw table after steps 1-4.
#[derive(Debug, Clone)]
pub struct Pruned {
    pub table: Table,
    pub rows_dropped: usize,
    pub sparse_columns: Vec<String>,
}

/// Sort by date and drop sparse rows, sparse columns and incomplete columns.
///
/// `fetch` persists this form of the raw table; cleaning runs it again, which
/// changes nothing on an already pruned table.
pub fn prune_missing(raw: &Table) -> Result<Pruned, AppError> {
    let table = raw.sort_by_index();
    let row_min = min_present(table.n_cols());
    let rows = table.filter_rows(|r| table.row_count_valid(r) >= row_min);
    let rows_dropped = table.n_rows() - rows.n_rows();

    let col_min = min_present(rows.n_rows());
    let mut sparse_columns = Vec::new();
    for (name, values) in rows.iter_columns() {
        let present = values.iter().filter(|v| !v.is_nan()).count();
        if present < col_min || present < values.len() {
            sparse_columns.push(name.to_string());
        }
    }
    let table = rows.drop_columns(&sparse_columns)?;
    info!(
        rows = table.n_rows(),
        columns = table.n_cols(),
        rows_dropped,
        sparse_columns = sparse_columns.len(),
        "dropped missing data"
    );
    Ok(Pruned {
        table,
        rows_dropped,
        sparse_columns,
    })
}

/// Smallest count that meets the presence threshold of `total`.
fn min_present(total: usize) -> usize {
    (PRESENCE_THRESHOLD * total as f64).ceil() as usize
}

/// Overwrite known-bad data points with corrected values.
///
/// Patches for a ticker or date the table does not hold are skipped; returns
/// how many were applied.
pub fn apply_patches(table: &mut Table, patches: &[Patch]) -> usize {
    let mut applied = 0;
    for patch in patches {
        match table.set_value(&patch.ticker, patch.date, patch.value) {
            Ok(()) => {
                applied += 1;
                debug!(ticker = %patch.ticker, date = %patch.date, value = patch.value, "patched data point");
            }
            Err(e) => {
                warn!(ticker = %patch.ticker, date = %patch.date, reason = %e.message(), "patch skipped");
            }
        }
    }
    applied
}
