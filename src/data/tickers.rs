//! Ticker list ingest.
//!
//! The list is a CSV with one exchange code per row in a `Kode` column (other
//! columns are ignored). Each code gets the market suffix appended, e.g.
//! `BMRI` + `.JK`.

use std::io::Read;
use std::path::Path;

use crate::error::AppError;

const CODE_COLUMN: &str = "Kode";

/// Read ticker codes from `path` and append `ext` to each.
pub fn read_ticker_list(path: &Path, ext: &str) -> Result<Vec<String>, AppError> {
    let file = std::fs::File::open(path).map_err(|e| {
        AppError::input(format!("Failed to open ticker list '{}': {e}", path.display()))
    })?;
    parse_ticker_list(file, ext)
}

pub fn parse_ticker_list<R: Read>(reader: R, ext: &str) -> Result<Vec<String>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read ticker list headers: {e}")))?
        .clone();
    let col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(CODE_COLUMN))
        .ok_or_else(|| AppError::input(format!("Ticker list has no '{CODE_COLUMN}' column.")))?;

    let mut tickers = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // Line numbers are 1-based and the header is line 1.
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::input(format!("Ticker list line {line}: {e}")))?;
        let Some(code) = record.get(col).filter(|c| !c.is_empty()) else {
            continue;
        };
        let ticker = format!("{code}{ext}");
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }

    if tickers.is_empty() {
        return Err(AppError::input("Ticker list is empty."));
    }
    Ok(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_extension_and_skips_blanks() {
        let csv = "No,Kode,Nama\n1,BMRI,Bank Mandiri\n2,,Blank\n3, MYOR ,Mayora\n4,BMRI,Dup\n";
        let tickers = parse_ticker_list(csv.as_bytes(), ".JK").unwrap();
        assert_eq!(tickers, vec!["BMRI.JK".to_string(), "MYOR.JK".to_string()]);
    }

    #[test]
    fn missing_code_column_is_an_error() {
        let err = parse_ticker_list("Ticker\nBMRI\n".as_bytes(), ".JK").unwrap_err();
        assert!(err.message().contains("Kode"));
    }
}
