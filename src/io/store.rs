//! Read/write persisted artifacts.
//!
//! Every artifact is a JSON document:
//! - tables: `{ index, columns, data }` (column-major, `NaN` as `null`)
//! - series: `{ name, index, values }`
//! - feature/label pairs: one table file plus one series file
//!
//! Reloading an artifact gives back a value equal to the one written.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::PairPaths;
use crate::domain::{Series, Table};
use crate::error::AppError;

pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::input(format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer(BufWriter::new(file), value)
        .map_err(|e| AppError::input(format!("Failed to write '{}': {e}", path.display())))?;
    debug!(path = %path.display(), "saved artifact");
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::input(format!("Invalid artifact '{}': {e}", path.display())))
}

pub fn save_table(table: &Table, path: &Path) -> Result<(), AppError> {
    save_json(table, path)
}

pub fn load_table(path: &Path) -> Result<Table, AppError> {
    load_json(path)
}

pub fn save_series(series: &Series, path: &Path) -> Result<(), AppError> {
    save_json(series, path)
}

pub fn load_series(path: &Path) -> Result<Series, AppError> {
    load_json(path)
}

pub fn save_pair(features: &Table, labels: &Series, paths: &PairPaths) -> Result<(), AppError> {
    save_table(features, &paths.features)?;
    save_series(labels, &paths.labels)
}

pub fn load_pair(paths: &PairPaths) -> Result<(Table, Series), AppError> {
    Ok((load_table(&paths.features)?, load_series(&paths.labels)?))
}

/// Load a pair and join the labels back onto the features as the last column.
pub fn load_joined(paths: &PairPaths) -> Result<Table, AppError> {
    let (features, labels) = load_pair(paths)?;
    features.with_series(&labels)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::RowIndex;

    fn table() -> Table {
        let d = |day| NaiveDate::from_ymd_opt(2023, 6, day).unwrap();
        Table::from_columns(
            RowIndex::Dates(vec![d(12), d(13), d(14)]),
            vec![
                ("MYOR.JK".to_string(), vec![1602.730957, 1610.0, f64::NAN]),
                ("BMRI.JK".to_string(), vec![-0.1, 0.1 + 0.2, 1e-300]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn table_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/raw.json");
        let t = table();
        save_table(&t, &path).unwrap();
        assert_eq!(load_table(&path).unwrap(), t);
    }

    #[test]
    fn pair_round_trips_and_joins() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PairPaths {
            features: dir.path().join("x.json"),
            labels: dir.path().join("y.json"),
        };
        let t = table();
        let features = t.drop_columns(&["BMRI.JK".to_string()]).unwrap();
        let labels = t.series("BMRI.JK").unwrap();
        save_pair(&features, &labels, &paths).unwrap();

        let (f2, l2) = load_pair(&paths).unwrap();
        assert_eq!(f2, features);
        assert_eq!(l2, labels);
        assert_eq!(load_joined(&paths).unwrap(), t);
    }

    #[test]
    fn corrupt_artifact_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"index\": {\"positional\": 2}, \"columns\": [\"a\"], \"data\": [[1.0]]}").unwrap();
        let err = load_table(&path).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
