//! Regression model: estimator, solver and the persisted artifact.

pub mod artifact;
pub mod linear;
pub mod ols;

pub use artifact::*;
pub use linear::*;
pub use ols::*;
