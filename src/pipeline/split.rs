//! Chronological train/validation/test split.
//!
//! Forward-chaining cross-validation with `n_splits` folds cuts the series into
//! `n_splits + 1` equal blocks (the remainder goes to the first training
//! prefix). Fold `k` trains on everything before block `k + 1` and holds out
//! that block. Only the last fold is used, so its boundaries are computed
//! directly:
//!
//! ```text
//! fold  = n_rows / (n_splits + 1)
//! train = [0, n_rows - fold)
//! held  = [n_rows - fold, n_rows)   -> first half validation, rest test
//! ```
//!
//! Rows are never shuffled. The validation block must hold at least
//! `MIN_BLOCK_ROWS` rows, so every split keeps a row after return engineering.

use std::ops::Range;

use crate::domain::Table;
use crate::error::AppError;

/// Smallest validation block. Return engineering loses three rows per split
/// (the first return and the two label rows at the end), so four leaves one.
pub const MIN_BLOCK_ROWS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Range<usize>,
    pub valid: Range<usize>,
    pub test: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Table,
    pub valid: Table,
    pub test: Table,
}

/// Row ranges of the last forward-chaining fold.
pub fn forward_chaining_split(n_rows: usize, n_splits: usize) -> Result<SplitIndices, AppError> {
    if n_splits < 2 {
        return Err(AppError::input(format!("n_splits must be >= 2 (got {n_splits}).")));
    }
    let fold = n_rows / (n_splits + 1);
    if fold / 2 < MIN_BLOCK_ROWS {
        return Err(AppError::structural(format!(
            "Cannot split {n_rows} rows into {n_splits} forward-chaining folds: need at least {} rows.",
            min_rows(n_splits)
        )));
    }

    let held_start = n_rows - fold;
    let valid_end = held_start + fold / 2;

    Ok(SplitIndices {
        train: 0..held_start,
        valid: held_start..valid_end,
        test: valid_end..n_rows,
    })
}

/// Fewest rows `forward_chaining_split` accepts for `n_splits`.
pub fn min_rows(n_splits: usize) -> usize {
    2 * MIN_BLOCK_ROWS * (n_splits + 1)
}

/// Split a chronologically sorted table.
pub fn split_table(table: &Table, n_splits: usize) -> Result<Split, AppError> {
    if let Some(dates) = table.index().dates() {
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::structural(
                "Table index must be strictly increasing before splitting.",
            ));
        }
    }

    let idx = forward_chaining_split(table.n_rows(), n_splits)?;
    Ok(Split {
        train: table.slice_rows(idx.train),
        valid: table.slice_rows(idx.valid),
        test: table.slice_rows(idx.test),
    })
}
