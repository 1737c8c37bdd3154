//! Domain types used throughout the pipeline.
//!
//! - `Table` / `Series`: date-indexed price, return and feature data
//! - `RowIndex` / `IndexKind`: row labels and the kind the validator asserts

pub mod table;

pub use table::*;
