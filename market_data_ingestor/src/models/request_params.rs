use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::asset::AssetClass;

/// Vendor-agnostic parameters for one daily history request.
///
/// Exactly one symbol per request: the fetch loop is strictly sequential so that a
/// rate-limited upstream sees one call at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// Symbol to request (e.g., `"VCB"`, `"VNINDEX"`).
    pub symbol: String,

    /// Stock or market index.
    pub asset_class: AssetClass,

    /// First trading date to include (inclusive).
    pub start: NaiveDate,

    /// Last trading date to include (inclusive).
    pub end: NaiveDate,
}

impl HistoryRequest {
    pub fn stock(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class: AssetClass::Stock,
            start,
            end,
        }
    }

    pub fn index(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class: AssetClass::Index,
            start,
            end,
        }
    }
}
