//! Market-wide index levels, one wide row per trading date.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The fixed set of tracked market indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketIndex {
    VnIndex,
    Vn30,
    Hnx30,
    HnxIndex,
}

impl MarketIndex {
    /// Fetch order. The first index that returns data anchors the date axis.
    pub const ALL: [MarketIndex; 4] = [
        MarketIndex::VnIndex,
        MarketIndex::Vn30,
        MarketIndex::Hnx30,
        MarketIndex::HnxIndex,
    ];

    /// Symbol understood by the quoting source.
    pub fn remote_symbol(self) -> &'static str {
        match self {
            MarketIndex::VnIndex => "VNINDEX",
            MarketIndex::Vn30 => "VN30",
            MarketIndex::Hnx30 => "HNX30",
            MarketIndex::HnxIndex => "HNXINDEX",
        }
    }
}

impl fmt::Display for MarketIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.remote_symbol())
    }
}

/// Close level and day-over-day percentage change of one index on one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexLevel {
    pub level: Option<f64>,
    /// Percent (×100), `None` on the first date of the window.
    pub change_pct: Option<f64>,
}

/// One wide market row keyed by date.
///
/// Breadth counts and totals are not reported by the index history endpoints and stay
/// `None` unless a caller fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: NaiveDate,
    pub vnindex: IndexLevel,
    pub vn30: IndexLevel,
    pub hnx30: IndexLevel,
    pub hnx_index: IndexLevel,
    pub total_volume: Option<i64>,
    pub total_value: Option<f64>,
    pub advancing: Option<i32>,
    pub declining: Option<i32>,
    pub unchanged: Option<i32>,
}

impl MarketSnapshot {
    /// An empty row for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            vnindex: IndexLevel::default(),
            vn30: IndexLevel::default(),
            hnx30: IndexLevel::default(),
            hnx_index: IndexLevel::default(),
            total_volume: None,
            total_value: None,
            advancing: None,
            declining: None,
            unchanged: None,
        }
    }

    pub fn level_mut(&mut self, index: MarketIndex) -> &mut IndexLevel {
        match index {
            MarketIndex::VnIndex => &mut self.vnindex,
            MarketIndex::Vn30 => &mut self.vn30,
            MarketIndex::Hnx30 => &mut self.hnx30,
            MarketIndex::HnxIndex => &mut self.hnx_index,
        }
    }
}
