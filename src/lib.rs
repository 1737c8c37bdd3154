//! `stock-forecast` library crate.
//!
//! The binary (`sf`) is a thin wrapper around this library so that:
//!
//! - every pipeline stage is testable without spawning processes
//! - the serving endpoint and the batch commands share one code path
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod serve;
