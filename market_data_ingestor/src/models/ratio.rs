//! Financial ratio rows as reported upstream, and the condensed per-symbol snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One fiscal-period row of a ratio-history response.
///
/// Field names follow the upstream JSON; every ratio is optional because sources
/// omit what they do not compute (beta and market cap are frequently absent).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioRow {
    /// The symbol the row was reported for, when the source labels it.
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub quarter: Option<i32>,
    #[serde(default)]
    pub price_to_earning: Option<f64>,
    #[serde(default)]
    pub price_to_book: Option<f64>,
    #[serde(default)]
    pub earning_per_share: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
    #[serde(default)]
    pub roa: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

/// The canonical metric set for one symbol, dated at the end of its fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub symbol: String,
    pub date: NaiveDate,
    pub beta: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub market_cap: Option<f64>,
}
