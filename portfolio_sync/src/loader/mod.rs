//! Idempotent batch writes of companies, prices, metrics and market rows.
//!
//! Each write path is keyed on the entity's natural key, so loading the same data
//! twice leaves one row per key. Failures are isolated to the smallest safe unit:
//!
//! - companies: one savepoint per company; a constraint violation skips that row.
//! - prices, metrics: one immediate transaction per symbol; a constraint violation
//!   rolls back that symbol only.
//! - market summary: one transaction for all rows.
//!
//! The per-symbol paths take an optional cancel flag, checked between symbols. A raised
//! flag ends the load early with every earlier symbol already committed.
//!
//! Anything that is not a constraint violation (see [`StoreError::is_recoverable`])
//! aborts the write path and is returned to the caller.

pub mod repo;

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use diesel::{Connection, SqliteConnection};
use indexmap::IndexMap;
use market_data_ingestor::models::{
    bar::PriceBar, bar_series::PriceSeries, market_index::MarketSnapshot, ratio::MetricSnapshot,
};
use tracing::{info, warn};

use crate::{
    error::StoreError,
    models::{NewCompany, NewMarketSummary, NewMetric, NewPrice},
    reference::Company,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompanyLoadStats {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchLoadStats {
    pub rows_written: usize,
    pub symbols_committed: usize,
    pub failed_symbols: Vec<String>,
}

/// Writes companies after making sure every industry and exchange they reference
/// has been resolved.
pub fn load_companies(
    conn: &mut SqliteConnection,
    companies: &[Company],
) -> Result<CompanyLoadStats, StoreError> {
    info!(companies = companies.len(), "loading companies");

    conn.immediate_transaction(|conn| {
        let mut industry_ids: HashMap<&str, i32> = HashMap::new();
        let mut exchange_ids: HashMap<&str, Option<i32>> = HashMap::new();
        for c in companies {
            if !industry_ids.contains_key(c.icb_name.as_str()) {
                industry_ids.insert(&c.icb_name, repo::ensure_industry(conn, &c.icb_name)?);
            }
            if !exchange_ids.contains_key(c.exchange.as_str()) {
                let id = repo::resolve_exchange(conn, &c.exchange)?;
                if id.is_none() {
                    warn!(exchange = %c.exchange, "unknown exchange code, companies stored without exchange");
                }
                exchange_ids.insert(&c.exchange, id);
            }
        }

        let mut stats = CompanyLoadStats::default();
        for c in companies {
            let row = NewCompany {
                symbol: &c.symbol,
                organ_name: &c.organ_name,
                exchange_id: exchange_ids.get(c.exchange.as_str()).copied().flatten(),
                industry_id: industry_ids.get(c.icb_name.as_str()).copied(),
            };
            match conn.transaction(|conn| repo::upsert_company(conn, &row)) {
                Ok(true) => stats.inserted += 1,
                Ok(false) => stats.updated += 1,
                Err(e) if e.is_recoverable() => {
                    warn!(symbol = %c.symbol, error = %e, "company skipped");
                    stats.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            inserted = stats.inserted,
            updated = stats.updated,
            skipped = stats.skipped,
            "companies loaded"
        );
        Ok(stats)
    })
}

fn price_record<'a>(symbol: &'a str, bar: &PriceBar) -> NewPrice<'a> {
    NewPrice {
        symbol,
        date: bar.date,
        open: Some(bar.open),
        high: Some(bar.high),
        low: Some(bar.low),
        close: Some(bar.close),
        volume: bar.volume,
        value: bar.traded_value(),
    }
}

fn metric_record(m: &MetricSnapshot) -> NewMetric<'_> {
    NewMetric {
        symbol: &m.symbol,
        date: m.date,
        beta: m.beta,
        pe_ratio: m.pe_ratio,
        eps: m.eps,
        pb_ratio: m.pb_ratio,
        roe: m.roe,
        roa: m.roa,
        market_cap: m.market_cap,
    }
}

fn market_record(s: &MarketSnapshot) -> NewMarketSummary {
    NewMarketSummary {
        date: s.date,
        vnindex: s.vnindex.level,
        vnindex_change: s.vnindex.change_pct,
        vn30: s.vn30.level,
        vn30_change: s.vn30.change_pct,
        hnx30: s.hnx30.level,
        hnx30_change: s.hnx30.change_pct,
        hnx_index: s.hnx_index.level,
        hnx_index_change: s.hnx_index.change_pct,
        total_volume: s.total_volume,
        total_value: s.total_value,
        advancing: s.advancing,
        declining: s.declining,
        unchanged: s.unchanged,
    }
}

/// Commits `write` once per symbol, rolling back and recording symbols whose batch
/// hits a constraint violation.
fn load_per_symbol<T>(
    conn: &mut SqliteConnection,
    entity: &str,
    batches: &IndexMap<String, T>,
    cancel: Option<&AtomicBool>,
    mut write: impl FnMut(&mut SqliteConnection, &str, &T) -> Result<usize, StoreError>,
) -> Result<BatchLoadStats, StoreError> {
    let mut stats = BatchLoadStats::default();
    for (symbol, batch) in batches {
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            warn!(
                entity,
                committed = stats.symbols_committed,
                remaining = batches.len() - stats.symbols_committed - stats.failed_symbols.len(),
                "load cancelled"
            );
            break;
        }
        match conn.immediate_transaction(|conn| write(conn, symbol, batch)) {
            Ok(rows) => {
                stats.rows_written += rows;
                stats.symbols_committed += 1;
            }
            Err(e) if e.is_recoverable() => {
                warn!(entity, %symbol, error = %e, "batch rolled back");
                stats.failed_symbols.push(symbol.clone());
            }
            Err(e) => return Err(e),
        }
    }
    info!(
        entity,
        rows = stats.rows_written,
        symbols = stats.symbols_committed,
        failed = stats.failed_symbols.len(),
        "batch load complete"
    );
    Ok(stats)
}

pub fn load_prices(
    conn: &mut SqliteConnection,
    prices: &IndexMap<String, PriceSeries>,
    cancel: Option<&AtomicBool>,
) -> Result<BatchLoadStats, StoreError> {
    load_per_symbol(conn, "prices", prices, cancel, |conn, symbol, series| {
        let mut rows = 0;
        for bar in &series.bars {
            rows += repo::upsert_price(conn, &price_record(symbol, bar))?;
        }
        Ok(rows)
    })
}

pub fn load_metrics(
    conn: &mut SqliteConnection,
    metrics: &IndexMap<String, MetricSnapshot>,
    cancel: Option<&AtomicBool>,
) -> Result<BatchLoadStats, StoreError> {
    load_per_symbol(conn, "metrics", metrics, cancel, |conn, _symbol, snapshot| {
        repo::upsert_metric(conn, &metric_record(snapshot))
    })
}

pub fn load_market_summary(
    conn: &mut SqliteConnection,
    rows: &[MarketSnapshot],
) -> Result<usize, StoreError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let written = conn.immediate_transaction(|conn| {
        let mut n = 0;
        for row in rows {
            n += repo::upsert_market_summary(conn, &market_record(row))?;
        }
        Ok::<_, StoreError>(n)
    })?;
    info!(rows = written, "market summary loaded");
    Ok(written)
}
