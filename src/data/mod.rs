//! Price data sources.
//!
//! - `tickers`: the list of symbols to download
//! - `yahoo`: the market-data client and batch assembly into a raw table
//! - `sample`: deterministic synthetic prices for offline runs

pub mod sample;
pub mod tickers;
pub mod yahoo;

pub use sample::*;
pub use tickers::*;
pub use yahoo::*;
