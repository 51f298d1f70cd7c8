//! A collection of cleaned daily bars for one symbol.

use chrono::NaiveDate;

use crate::models::bar::PriceBar;

/// Represents a complete, cleaned set of daily bars for a single symbol.
///
/// Bars are sorted ascending by date and carry no duplicate dates.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    /// The symbol this data represents (e.g., "VCB", "FPT").
    pub symbol: String,
    /// The collection of cleaned bars.
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// First and last trading date covered by the series.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.bars.first()?.date, self.bars.last()?.date))
    }

    /// Most recent bar.
    pub fn latest(&self) -> Option<&PriceBar> {
        self.bars.last()
    }
}
