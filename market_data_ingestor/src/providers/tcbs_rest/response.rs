use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::bar::RawBar;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TcbsBar {
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    /// ISO-8601 timestamp, e.g. `2024-01-02T00:00:00.000Z`.
    pub trading_date: String,
}

#[derive(Deserialize, Debug)]
pub struct TcbsBarsResponse {
    /// The symbol the upstream answered for; checked against the request.
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub data: Vec<TcbsBar>,
}

/// Whether a payload labelled `reported` belongs to `requested`. Unlabelled payloads
/// are accepted.
pub fn ticker_matches(requested: &str, reported: Option<&str>) -> bool {
    reported.is_none_or(|t| t.trim().eq_ignore_ascii_case(requested))
}

impl TcbsBar {
    /// The calendar date prefix of `trading_date`.
    pub fn date(&self) -> Option<NaiveDate> {
        let prefix = self.trading_date.get(..10)?;
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }

    pub fn into_raw(self) -> Option<RawBar> {
        Some(RawBar {
            date: self.date()?,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}
