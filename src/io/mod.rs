//! Input/output helpers.
//!
//! - JSON artifacts for tables, series and models (`store`)
//! - CSV exports (`export`)

pub mod export;
pub mod store;

pub use export::*;
pub use store::*;
