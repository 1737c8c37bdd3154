//! Yahoo Finance chart API integration for daily adjusted closes.
//!
//! A failed ticker does not abort the batch: `fetch_price_table` records the
//! failure and moves on, and the caller decides what to do with the report.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{RowIndex, Table};
use crate::error::AppError;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; stock-forecast/0.1)";

/// Date range and sampling interval of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRange {
    pub start: NaiveDate,
    /// Exclusive.
    pub end: NaiveDate,
    pub interval: String,
}

impl FetchRange {
    pub fn from_config(config: &Config, today: NaiveDate) -> Self {
        Self {
            start: config.start_date,
            end: config.end_date.unwrap_or(today),
            interval: config.interval_date.clone(),
        }
    }
}

/// Anything that can produce a daily price series for one ticker.
pub trait PriceSource {
    fn fetch_series(&self, ticker: &str, range: &FetchRange) -> Result<Vec<(NaiveDate, f64)>, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub ticker: String,
    pub reason: String,
}

/// Assembled table plus the tickers that could not be fetched.
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub table: Table,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Fetch every ticker and outer-join the series on date.
///
/// Dates are sorted ascending; a ticker without an observation on a date gets
/// `NaN`. Tickers that fail or return nothing are left out of the table and
/// listed in `failures`.
pub fn fetch_price_table<S: PriceSource + ?Sized>(
    source: &S,
    tickers: &[String],
    range: &FetchRange,
) -> Result<FetchReport, AppError> {
    let mut fetched: Vec<(String, BTreeMap<NaiveDate, f64>)> = Vec::new();
    let mut failures = Vec::new();

    for (i, ticker) in tickers.iter().enumerate() {
        match source.fetch_series(ticker, range) {
            Ok(obs) if obs.is_empty() => {
                warn!(ticker = %ticker, "no observations returned");
                failures.push(FetchFailure {
                    ticker: ticker.clone(),
                    reason: "no observations returned".to_string(),
                });
            }
            Ok(obs) => {
                debug!(ticker = %ticker, n = obs.len(), progress = i + 1, total = tickers.len(), "fetched");
                fetched.push((ticker.clone(), obs.into_iter().collect()));
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "fetch failed");
                failures.push(FetchFailure {
                    ticker: ticker.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if fetched.is_empty() {
        return Err(AppError::external(format!(
            "No price data could be fetched for any of {} tickers.",
            tickers.len()
        )));
    }

    let dates: BTreeSet<NaiveDate> = fetched.iter().flat_map(|(_, m)| m.keys().copied()).collect();
    let dates: Vec<NaiveDate> = dates.into_iter().collect();
    let columns = fetched
        .into_iter()
        .map(|(ticker, map)| {
            let values = dates
                .iter()
                .map(|d| map.get(d).copied().unwrap_or(f64::NAN))
                .collect();
            (ticker, values)
        })
        .collect();

    let table = Table::from_columns(RowIndex::Dates(dates), columns)?;
    info!(
        rows = table.n_rows(),
        columns = table.n_cols(),
        failures = failures.len(),
        "assembled raw price table"
    );
    Ok(FetchReport { table, failures })
}

pub struct YahooClient {
    client: Client,
}

impl YahooClient {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::external(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(Duration::from_secs(config.fetch_timeout_secs))
    }
}

impl PriceSource for YahooClient {
    fn fetch_series(&self, ticker: &str, range: &FetchRange) -> Result<Vec<(NaiveDate, f64)>, AppError> {
        let period1 = unix_seconds(range.start);
        let period2 = unix_seconds(range.end);

        let resp = self
            .client
            .get(format!("{BASE_URL}/{ticker}"))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", range.interval.clone()),
                ("events", "div,splits".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .send()
            .map_err(|e| AppError::external(format!("Request for {ticker} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::external(format!(
                "Request for {ticker} failed with status {}.",
                resp.status()
            )));
        }

        let body: ChartResponse = resp
            .json()
            .map_err(|e| AppError::external(format!("Failed to parse response for {ticker}: {e}")))?;

        parse_chart(ticker, body)
    }
}

fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn parse_chart(ticker: &str, body: ChartResponse) -> Result<Vec<(NaiveDate, f64)>, AppError> {
    if let Some(err) = body.chart.error {
        return Err(AppError::external(format!(
            "{ticker}: {} ({})",
            err.description, err.code
        )));
    }
    let result = body
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AppError::external(format!("{ticker}: empty chart result.")))?;

    let closes = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let mut out = Vec::with_capacity(result.timestamp.len());
    for (ts, close) in result.timestamp.iter().zip(closes) {
        let Some(value) = close.filter(|v| v.is_finite()) else {
            continue;
        };
        let date = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0)
            .ok_or_else(|| AppError::external(format!("{ticker}: invalid timestamp {ts}.")))?
            .date_naive();
        out.push((date, value));
    }
    // The last bar of a live session can repeat the previous trading date.
    out.dedup_by_key(|(d, _)| *d);
    Ok(out)
}
