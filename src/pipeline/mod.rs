//! Data pipeline stages.
//!
//! `validate` -> `clean` -> `split` -> `features`. Each stage takes tables by
//! reference and returns new ones.

pub mod clean;
pub mod features;
pub mod split;
pub mod validate;

pub use clean::*;
pub use features::*;
pub use split::*;
pub use validate::*;
