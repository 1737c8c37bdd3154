//! Export tables to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream
//! scripts: a `date` (or `row`) column followed by one column per ticker.
//! Missing values are written as empty cells.

use std::path::Path;

use crate::domain::{RowIndex, Table};
use crate::error::AppError;

/// Write `table` to a CSV file.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::input(format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;

    let index_header = match table.index() {
        RowIndex::Dates(_) => "date",
        RowIndex::Positional(_) => "row",
    };
    let mut header = vec![index_header.to_string()];
    header.extend(table.columns().iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| AppError::input(format!("Failed to write export CSV header: {e}")))?;

    for r in 0..table.n_rows() {
        let label = match table.index() {
            RowIndex::Dates(dates) => dates[r].to_string(),
            RowIndex::Positional(_) => r.to_string(),
        };
        let mut record = vec![label];
        record.extend(table.row(r).into_iter().map(format_cell));
        writer
            .write_record(&record)
            .map_err(|e| AppError::input(format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

fn format_cell(v: f64) -> String {
    if v.is_nan() { String::new() } else { v.to_string() }
}
