//! Date-indexed column tables.
//!
//! `Table` is the one tabular type the pipeline passes around: raw prices, the
//! cleaned dataset, return tables and feature sets are all `Table`s. Data is
//! stored column-major because every transform in the pipeline works one
//! column at a time.
//!
//! Missing observations are `f64::NAN`. Equality treats two `NaN` cells as
//! equal so that persisted artifacts compare equal after a reload.

use std::collections::HashSet;
use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Kind of row index a table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// One trading date per row.
    Datetime,
    /// Plain row positions (`0..n`), e.g. a feature vector built from a request.
    Positional,
}

impl IndexKind {
    pub fn display_name(self) -> &'static str {
        match self {
            IndexKind::Datetime => "datetime",
            IndexKind::Positional => "positional",
        }
    }
}

/// Row labels of a table or series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowIndex {
    Dates(Vec<NaiveDate>),
    Positional(usize),
}

impl RowIndex {
    pub fn len(&self) -> usize {
        match self {
            RowIndex::Dates(dates) => dates.len(),
            RowIndex::Positional(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            RowIndex::Dates(_) => IndexKind::Datetime,
            RowIndex::Positional(_) => IndexKind::Positional,
        }
    }

    pub fn dates(&self) -> Option<&[NaiveDate]> {
        match self {
            RowIndex::Dates(dates) => Some(dates),
            RowIndex::Positional(_) => None,
        }
    }

    /// Keep the labels at `rows`, in that order.
    ///
    /// A positional index is renumbered, matching what a fresh table built from
    /// the selected rows would carry.
    fn take(&self, rows: &[usize]) -> RowIndex {
        match self {
            RowIndex::Dates(dates) => RowIndex::Dates(rows.iter().map(|&r| dates[r]).collect()),
            RowIndex::Positional(_) => RowIndex::Positional(rows.len()),
        }
    }
}

/// A named column with its own row index (labels, predictions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "repr::SeriesRepr", into = "repr::SeriesRepr")]
pub struct Series {
    pub name: String,
    pub index: RowIndex,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, index: RowIndex, values: Vec<f64>) -> Result<Self, AppError> {
        let name = name.into();
        if index.len() != values.len() {
            return Err(AppError::input(format!(
                "Series '{name}' has {} values for an index of {} rows.",
                values.len(),
                index.len()
            )));
        }
        Ok(Self { name, index, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last `(date, value)` pair with a finite value.
    pub fn last_valid(&self) -> Option<(Option<NaiveDate>, f64)> {
        let dates = self.index.dates();
        self.values
            .iter()
            .enumerate()
            .rev()
            .find(|(_, v)| v.is_finite())
            .map(|(i, v)| (dates.map(|d| d[i]), *v))
    }
}

impl PartialEq for Series {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.index == other.index && cells_equal(&self.values, &other.values)
    }
}

/// Column-major table with a shared row index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "repr::TableRepr", into = "repr::TableRepr")]
pub struct Table {
    index: RowIndex,
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl Table {
    pub fn new(index: RowIndex, columns: Vec<String>, data: Vec<Vec<f64>>) -> Result<Self, AppError> {
        if columns.len() != data.len() {
            return Err(AppError::input(format!(
                "Table has {} column names but {} columns of data.",
                columns.len(),
                data.len()
            )));
        }
        let mut seen = HashSet::new();
        for (name, values) in columns.iter().zip(&data) {
            if !seen.insert(name.as_str()) {
                return Err(AppError::input(format!("Duplicate column '{name}'.")));
            }
            if values.len() != index.len() {
                return Err(AppError::input(format!(
                    "Column '{name}' has {} values for an index of {} rows.",
                    values.len(),
                    index.len()
                )));
            }
        }
        Ok(Self { index, columns, data })
    }

    pub fn from_columns(index: RowIndex, columns: Vec<(String, Vec<f64>)>) -> Result<Self, AppError> {
        let (names, data) = columns.into_iter().unzip();
        Self::new(index, names, data)
    }

    pub fn index(&self) -> &RowIndex {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_cols())
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_position(name).map(|i| self.data[i].as_slice())
    }

    pub fn require_column(&self, name: &str) -> Result<&[f64], AppError> {
        self.column(name)
            .ok_or_else(|| AppError::input(format!("Column '{name}' not found.")))
    }

    /// Iterate `(name, values)` in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.data.iter().map(Vec::as_slice))
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.iter().map(|col| col[row]).collect()
    }

    pub fn series(&self, name: &str) -> Result<Series, AppError> {
        let values = self.require_column(name)?.to_vec();
        Series::new(name, self.index.clone(), values)
    }

    /// Project onto `names`, in that order.
    pub fn select_columns(&self, names: &[String]) -> Result<Table, AppError> {
        let mut data = Vec::with_capacity(names.len());
        for name in names {
            data.push(self.require_column(name)?.to_vec());
        }
        Table::new(self.index.clone(), names.to_vec(), data)
    }

    pub fn drop_columns(&self, names: &[String]) -> Result<Table, AppError> {
        for name in names {
            self.require_column(name)?;
        }
        let keep: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !names.contains(c))
            .cloned()
            .collect();
        self.select_columns(&keep)
    }

    /// Append a column; the name must be new.
    pub fn with_column(&self, name: impl Into<String>, values: Vec<f64>) -> Result<Table, AppError> {
        let mut columns = self.columns.clone();
        let mut data = self.data.clone();
        columns.push(name.into());
        data.push(values);
        Table::new(self.index.clone(), columns, data)
    }

    /// Append a series that shares this table's index.
    pub fn with_series(&self, series: &Series) -> Result<Table, AppError> {
        if series.index != self.index {
            return Err(AppError::input(format!(
                "Series '{}' is not aligned with the table index.",
                series.name
            )));
        }
        self.with_column(series.name.clone(), series.values.clone())
    }

    /// Apply `f` to every column, keeping names and index.
    pub fn map_columns<F>(&self, f: F) -> Table
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        Table {
            index: self.index.clone(),
            columns: self.columns.clone(),
            data: self.data.iter().map(|col| f(col)).collect(),
        }
    }

    /// Keep the rows at `rows`, in that order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            index: self.index.take(rows),
            columns: self.columns.clone(),
            data: self
                .data
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
        }
    }

    pub fn slice_rows(&self, range: Range<usize>) -> Table {
        let rows: Vec<usize> = range.collect();
        self.take_rows(&rows)
    }

    /// Keep rows for which `keep(row)` is true.
    pub fn filter_rows<F>(&self, keep: F) -> Table
    where
        F: Fn(usize) -> bool,
    {
        let rows: Vec<usize> = (0..self.n_rows()).filter(|&r| keep(r)).collect();
        self.take_rows(&rows)
    }

    /// Sort rows by date ascending (stable). Positional tables are unchanged.
    pub fn sort_by_index(&self) -> Table {
        match &self.index {
            RowIndex::Dates(dates) => {
                let mut rows: Vec<usize> = (0..dates.len()).collect();
                rows.sort_by_key(|&r| dates[r]);
                self.take_rows(&rows)
            }
            RowIndex::Positional(_) => self.clone(),
        }
    }

    /// Non-missing cells in `row`.
    pub fn row_count_valid(&self, row: usize) -> usize {
        self.data.iter().filter(|col| !col[row].is_nan()).count()
    }

    /// Overwrite one cell, addressed by column name and date.
    pub fn set_value(&mut self, column: &str, date: NaiveDate, value: f64) -> Result<(), AppError> {
        let col = self
            .column_position(column)
            .ok_or_else(|| AppError::input(format!("Column '{column}' not found.")))?;
        let row = self
            .index
            .dates()
            .and_then(|dates| dates.iter().position(|d| *d == date))
            .ok_or_else(|| AppError::input(format!("Date {date} not found in the table index.")))?;
        self.data[col][row] = value;
        Ok(())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.columns == other.columns
            && self.data.len() == other.data.len()
            && self.data.iter().zip(&other.data).all(|(a, b)| cells_equal(a, b))
    }
}

/// Shift values by `periods` rows, filling vacated cells with `NaN`.
///
/// Positive periods move values later (row `t` receives row `t - periods`);
/// negative periods pull future values back.
pub fn shift(values: &[f64], periods: isize) -> Vec<f64> {
    let n = values.len() as isize;
    (0..n)
        .map(|t| {
            let src = t - periods;
            if (0..n).contains(&src) {
                values[src as usize]
            } else {
                f64::NAN
            }
        })
        .collect()
}

fn cells_equal(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}

/// On-disk representation: `NaN` is `null`, infinities are strings.
pub(crate) mod repr {
    use serde::{Deserialize, Serialize};

    use super::{RowIndex, Series, Table};
    use crate::error::AppError;

    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    pub(crate) enum Special {
        #[serde(rename = "inf")]
        PosInf,
        #[serde(rename = "-inf")]
        NegInf,
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    #[serde(untagged)]
    pub(crate) enum Cell {
        Finite(f64),
        Special(Special),
    }

    pub(crate) fn encode(values: &[f64]) -> Vec<Option<Cell>> {
        values
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    None
                } else if v == f64::INFINITY {
                    Some(Cell::Special(Special::PosInf))
                } else if v == f64::NEG_INFINITY {
                    Some(Cell::Special(Special::NegInf))
                } else {
                    Some(Cell::Finite(v))
                }
            })
            .collect()
    }

    pub(crate) fn decode(cells: Vec<Option<Cell>>) -> Vec<f64> {
        cells
            .into_iter()
            .map(|c| match c {
                None => f64::NAN,
                Some(Cell::Finite(v)) => v,
                Some(Cell::Special(Special::PosInf)) => f64::INFINITY,
                Some(Cell::Special(Special::NegInf)) => f64::NEG_INFINITY,
            })
            .collect()
    }

    #[derive(Serialize, Deserialize)]
    pub(crate) struct TableRepr {
        index: RowIndex,
        columns: Vec<String>,
        data: Vec<Vec<Option<Cell>>>,
    }

    impl From<Table> for TableRepr {
        fn from(table: Table) -> Self {
            Self {
                data: table.data.iter().map(|col| encode(col)).collect(),
                index: table.index,
                columns: table.columns,
            }
        }
    }

    impl TryFrom<TableRepr> for Table {
        type Error = AppError;

        fn try_from(repr: TableRepr) -> Result<Self, Self::Error> {
            let data = repr.data.into_iter().map(decode).collect();
            Table::new(repr.index, repr.columns, data)
        }
    }

    #[derive(Serialize, Deserialize)]
    pub(crate) struct SeriesRepr {
        name: String,
        index: RowIndex,
        values: Vec<Option<Cell>>,
    }

    impl From<Series> for SeriesRepr {
        fn from(series: Series) -> Self {
            Self {
                values: encode(&series.values),
                name: series.name,
                index: series.index,
            }
        }
    }

    impl TryFrom<SeriesRepr> for Series {
        type Error = AppError;

        fn try_from(repr: SeriesRepr) -> Result<Self, Self::Error> {
            Series::new(repr.name, repr.index, decode(repr.values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn sample() -> Table {
        Table::from_columns(
            RowIndex::Dates(vec![d(3), d(1), d(2)]),
            vec![
                ("A".to_string(), vec![3.0, 1.0, 2.0]),
                ("B".to_string(), vec![30.0, f64::NAN, 20.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_ragged_and_duplicate_columns() {
        let idx = RowIndex::Positional(2);
        assert!(Table::new(idx.clone(), vec!["A".into()], vec![vec![1.0]]).is_err());
        assert!(
            Table::new(
                idx,
                vec!["A".into(), "A".into()],
                vec![vec![1.0, 2.0], vec![3.0, 4.0]]
            )
            .is_err()
        );
    }

    #[test]
    fn sort_by_index_reorders_every_column() {
        let sorted = sample().sort_by_index();
        assert_eq!(sorted.index().dates().unwrap(), &[d(1), d(2), d(3)]);
        assert_eq!(sorted.column("A").unwrap(), &[1.0, 2.0, 3.0]);
        let b = sorted.column("B").unwrap();
        assert!(b[0].is_nan());
        assert_eq!(&b[1..], &[20.0, 30.0]);
    }

    #[test]
    fn shift_matches_both_directions() {
        let v = [1.0, 2.0, 3.0, 4.0];
        let back = shift(&v, 1);
        assert!(back[0].is_nan());
        assert_eq!(&back[1..], &[1.0, 2.0, 3.0]);

        let fwd = shift(&v, -2);
        assert_eq!(&fwd[..2], &[3.0, 4.0]);
        assert!(fwd[2].is_nan() && fwd[3].is_nan());
    }

    #[test]
    fn equality_treats_nan_cells_as_equal() {
        assert_eq!(sample(), sample());
        let mut other = sample();
        other.set_value("A", d(1), 9.0).unwrap();
        assert_ne!(sample(), other);
    }

    #[test]
    fn select_and_drop_columns_keep_requested_order() {
        let t = sample();
        let s = t.select_columns(&["B".to_string(), "A".to_string()]).unwrap();
        assert_eq!(s.columns(), &["B".to_string(), "A".to_string()]);
        let dropped = t.drop_columns(&["A".to_string()]).unwrap();
        assert_eq!(dropped.columns(), &["B".to_string()]);
        assert!(t.drop_columns(&["Z".to_string()]).is_err());
    }

    #[test]
    fn set_value_requires_known_date() {
        let mut t = sample();
        assert!(t.set_value("A", d(9), 1.0).is_err());
        assert!(t.set_value("Z", d(1), 1.0).is_err());
    }

    #[test]
    fn serde_preserves_nan_and_infinities() {
        let t = Table::from_columns(
            RowIndex::Positional(3),
            vec![("X".to_string(), vec![f64::NAN, f64::INFINITY, -0.125])],
        )
        .unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
        assert_eq!(back.column("X").unwrap()[1], f64::INFINITY);
    }
}
