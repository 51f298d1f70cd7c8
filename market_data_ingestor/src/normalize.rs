//! Cleaning of raw daily series and condensing of ratio histories.
//!
//! Everything here is pure: no I/O, no clock. The fetch loops call into it once per
//! symbol and treat a [`NormalizeError`] as a malformed response.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{
    bar::{PriceBar, RawBar},
    bar_series::PriceSeries,
    ratio::{MetricSnapshot, RatioRow},
};

/// Trailing window, in bars, of the volatility proxy.
pub const VOLATILITY_WINDOW: usize = 20;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("no rows to normalize for {symbol}")]
    Empty { symbol: String },

    #[error("column '{column}' has no values for {symbol}")]
    MissingColumn {
        symbol: String,
        column: &'static str,
    },
}

/// Turns one symbol's raw bars into a sorted, gap-free series with derived fields.
///
/// Rows are sorted ascending by date; when a date repeats the later row wins. Missing
/// or non-finite OHLCV values are linearly interpolated by position, and values before
/// the first (after the last) observation take the first (last) observed value.
pub fn clean_price_series(symbol: &str, raw: Vec<RawBar>) -> Result<PriceSeries, NormalizeError> {
    let rows = sort_and_collapse(raw);
    if rows.is_empty() {
        return Err(NormalizeError::Empty {
            symbol: symbol.to_string(),
        });
    }

    let column = |name: &'static str, pick: fn(&RawBar) -> Option<f64>| {
        let values: Vec<Option<f64>> = rows.iter().map(pick).collect();
        interpolate(&values).ok_or_else(|| NormalizeError::MissingColumn {
            symbol: symbol.to_string(),
            column: name,
        })
    };

    let open = column("open", |b| b.open)?;
    let high = column("high", |b| b.high)?;
    let low = column("low", |b| b.low)?;
    let close = column("close", |b| b.close)?;
    let volume_values: Vec<Option<f64>> = rows.iter().map(|b| b.volume).collect();
    let volume = interpolate(&volume_values);

    let returns = daily_returns(&close);
    let volatility = trailing_volatility(&returns);

    let bars = rows
        .iter()
        .enumerate()
        .map(|(i, row)| PriceBar {
            date: row.date,
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: volume.as_ref().map(|v| v[i].round() as i64),
            daily_return: returns[i],
            volatility: volatility[i],
        })
        .collect();

    Ok(PriceSeries {
        symbol: symbol.to_string(),
        bars,
    })
}

fn sort_and_collapse(mut raw: Vec<RawBar>) -> Vec<RawBar> {
    // Stable sort keeps source order among equal dates, so the last one seen wins.
    raw.sort_by_key(|b| b.date);
    let mut out: Vec<RawBar> = Vec::with_capacity(raw.len());
    for bar in raw {
        match out.last_mut() {
            Some(prev) if prev.date == bar.date => *prev = bar,
            _ => out.push(bar),
        }
    }
    out
}

/// Fills gaps by linear interpolation on row position, extending the edge values
/// outward. Returns `None` when no value is present at all.
fn interpolate(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    let (&(first_idx, first_val), &(last_idx, last_val)) = (known.first()?, known.last()?);

    let mut out = vec![0.0; values.len()];
    out[..=first_idx].fill(first_val);
    out[last_idx..].fill(last_val);
    for pair in known.windows(2) {
        let (a, va) = pair[0];
        let (b, vb) = pair[1];
        for (i, slot) in out.iter_mut().enumerate().take(b + 1).skip(a) {
            let t = (i - a) as f64 / (b - a) as f64;
            *slot = va + (vb - va) * t;
        }
    }
    Some(out)
}

/// Fractional change of close versus the previous row. The first row, and any row
/// following a zero close, is 0.
fn daily_returns(close: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(close.len());
    out.push(0.0);
    for pair in close.windows(2) {
        let r = if pair[0] == 0.0 {
            0.0
        } else {
            pair[1] / pair[0] - 1.0
        };
        out.push(r);
    }
    out
}

/// Sample standard deviation of the returns in the trailing window ending at each row.
///
/// The first row has no real return, so it never counts toward the window; rows with
/// fewer than two defined returns in their window get 0.
fn trailing_volatility(returns: &[f64]) -> Vec<f64> {
    (0..returns.len())
        .map(|i| {
            let lo = (i + 1).saturating_sub(VOLATILITY_WINDOW).max(1);
            if i < lo {
                return 0.0;
            }
            sample_std(&returns[lo..=i]).unwrap_or(0.0)
        })
        .collect()
}

fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Condenses a ratio history into the snapshot of the most recent fiscal period.
///
/// The latest period is the one with the largest `(year, quarter)`; its snapshot is dated
/// December 31 of that year (or of `fallback_year` when the source omits the year).
/// Returns `None` for an empty history.
pub fn condense_ratios(symbol: &str, rows: &[RatioRow], fallback_year: i32) -> Option<MetricSnapshot> {
    let latest = rows
        .iter()
        .max_by_key(|r| (r.year.unwrap_or(i32::MIN), r.quarter.unwrap_or(i32::MIN)))?;
    let year = latest.year.unwrap_or(fallback_year);
    let date = NaiveDate::from_ymd_opt(year, 12, 31)
        .or_else(|| NaiveDate::from_ymd_opt(fallback_year, 12, 31))?;

    Some(MetricSnapshot {
        symbol: symbol.to_string(),
        date,
        beta: latest.beta,
        pe_ratio: latest.price_to_earning,
        eps: latest.earning_per_share,
        pb_ratio: latest.price_to_book,
        roe: latest.roe,
        roa: latest.roa,
        market_cap: latest.market_cap,
    })
}

/// Close level and day-over-day change in percent for an index series.
///
/// Rows are sorted and collapsed like [`clean_price_series`], but nothing is
/// interpolated: a missing close stays `None`, and so does the change next to it.
pub fn index_changes(raw: &[RawBar]) -> Vec<(NaiveDate, Option<f64>, Option<f64>)> {
    let rows = sort_and_collapse(raw.to_vec());
    let mut prev: Option<f64> = None;
    rows.iter()
        .map(|row| {
            let level = row.close.filter(|c| c.is_finite());
            let change = match (prev, level) {
                (Some(p), Some(c)) if p != 0.0 => Some((c / p - 1.0) * 100.0),
                _ => None,
            };
            prev = level;
            (row.date, level, change)
        })
        .collect()
}
