//! Daily OHLCV bars, before and after normalization.
//!
//! [`RawBar`] is what a [`QuoteSource`](crate::providers::QuoteSource) hands back:
//! any field may be missing. [`PriceBar`] is the cleaned, gap-free form produced by
//! [`clean_price_series`](crate::normalize::clean_price_series).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily bar as reported by the upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    /// Trading date (exchange local).
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl RawBar {
    /// Convenience constructor for a fully populated bar.
    pub fn full(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }
}

/// A cleaned daily bar with derived risk fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading date (exchange local).
    pub date: NaiveDate,

    /// Opening price.
    pub open: f64,

    /// Highest price of the session.
    pub high: f64,

    /// Lowest price of the session.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Shares traded. `None` when the source never reported volume for the series.
    pub volume: Option<i64>,

    /// Fractional change of close versus the previous bar (0 for the first bar).
    pub daily_return: f64,

    /// Trailing 20-bar sample standard deviation of `daily_return` (0 during warm-up).
    pub volatility: f64,
}

impl PriceBar {
    /// Traded value estimate (close × volume), when volume is known.
    pub fn traded_value(&self) -> Option<f64> {
        self.volume.map(|v| self.close * v as f64)
    }
}
