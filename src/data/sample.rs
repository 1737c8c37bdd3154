//! Synthetic price tables for offline runs.
//!
//! Prices follow a one-factor jump-diffusion: every ticker's daily log return
//! is a loading on a shared market shock plus its own noise, with occasional
//! jumps. The table has one row per weekday, like an exchange calendar without
//! holidays. Output is fully determined by the settings.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{RowIndex, Table};
use crate::error::AppError;

/// Daily log-return volatility of the shared market factor.
const MARKET_VOL: f64 = 0.011;
/// Daily idiosyncratic volatility.
const IDIO_VOL: f64 = 0.014;
const JUMP_PROB: f64 = 0.01;
const JUMP_SIZE: f64 = 0.06;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleSettings {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    /// Number of trading days (rows).
    pub days: usize,
    pub seed: u64,
}

/// Generate a weekday-indexed price table.
pub fn generate_price_table(settings: &SampleSettings) -> Result<Table, AppError> {
    if settings.tickers.is_empty() {
        return Err(AppError::input("Sample needs at least one ticker."));
    }
    if settings.days < 2 {
        return Err(AppError::input("Sample needs at least two trading days."));
    }

    let mut rng = StdRng::seed_from_u64(sample_seed(settings));
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::external(format!("Noise distribution error: {e}")))?;

    let dates = trading_days(settings.start, settings.days);

    // Per-ticker loading on the market factor and starting price.
    let params: Vec<(f64, f64)> = settings
        .tickers
        .iter()
        .map(|_| (rng.gen_range(0.2..1.4), rng.gen_range(50.0..10_000.0)))
        .collect();

    let mut columns: Vec<Vec<f64>> = params
        .iter()
        .map(|(_, p0)| {
            let mut v = Vec::with_capacity(settings.days);
            v.push(round_tick(*p0));
            v
        })
        .collect();
    let mut levels: Vec<f64> = params.iter().map(|(_, p0)| *p0).collect();

    for _ in 1..settings.days {
        let market = MARKET_VOL * normal.sample(&mut rng);
        for (i, (beta, _)) in params.iter().enumerate() {
            let idio = IDIO_VOL * normal.sample(&mut rng);
            let jump = sample_jump(&mut rng);
            let drift = -0.5 * (beta * beta * MARKET_VOL * MARKET_VOL + IDIO_VOL * IDIO_VOL);
            levels[i] *= (drift + beta * market + idio + jump).exp();
            columns[i].push(round_tick(levels[i]));
        }
    }

    Table::from_columns(
        RowIndex::Dates(dates),
        settings.tickers.iter().cloned().zip(columns).collect(),
    )
}

/// The first `n` weekdays on or after `start`.
fn trading_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = start;
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d += Duration::days(1);
    }
    out
}

fn sample_jump(rng: &mut StdRng) -> f64 {
    let roll: f64 = rng.r#gen();
    if roll < JUMP_PROB / 2.0 {
        JUMP_SIZE
    } else if roll < JUMP_PROB {
        -JUMP_SIZE
    } else {
        0.0
    }
}

// Quotes are kept to 6 decimals, like the adjusted closes the data source serves.
fn round_tick(price: f64) -> f64 {
    (price * 1e6).round() / 1e6
}

fn sample_seed(settings: &SampleSettings) -> u64 {
    let mut hasher = DefaultHasher::new();
    settings.tickers.hash(&mut hasher);
    settings.start.hash(&mut hasher);
    settings.days.hash(&mut hasher);
    settings.seed.hash(&mut hasher);
    hasher.finish()
}
