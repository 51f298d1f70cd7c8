//! Keyed, idempotent single-row statements for each entity.
use chrono::NaiveDate;
use diesel::{dsl::now, insert_into, prelude::*};

use crate::{
    error::StoreError,
    models::{
        CompanyRow, MarketSummaryRow, MetricRow, NewCompany, NewIndustry, NewMarketSummary,
        NewMetric, NewPrice, PriceRow,
    },
    schema::{companies, exchanges, industries, market_summary, stock_metrics, stock_prices_daily},
};

/// Returns the id of the industry named `name`, creating it on first sighting.
pub fn ensure_industry(conn: &mut SqliteConnection, name: &str) -> Result<i32, StoreError> {
    let id = insert_into(industries::table)
        .values(&NewIndustry { icb_name: name })
        .on_conflict(industries::icb_name)
        .do_update()
        .set(industries::icb_name.eq(name))
        .returning(industries::id)
        .get_result(conn)?;
    Ok(id)
}

/// Looks up a seeded exchange by code. Unknown codes resolve to `None`.
pub fn resolve_exchange(conn: &mut SqliteConnection, code: &str) -> Result<Option<i32>, StoreError> {
    let id = exchanges::table
        .filter(exchanges::code.eq(code))
        .select(exchanges::id)
        .first(conn)
        .optional()?;
    Ok(id)
}

/// Inserts or refreshes a company by symbol. Returns `true` when the row is new.
///
/// The insert is a no-op on a symbol conflict, so its row count alone says whether
/// the company existed; only then are its attributes rewritten.
pub fn upsert_company(conn: &mut SqliteConnection, row: &NewCompany<'_>) -> Result<bool, StoreError> {
    let inserted = insert_into(companies::table)
        .values(row)
        .on_conflict(companies::symbol)
        .do_nothing()
        .execute(conn)?;
    if inserted == 1 {
        return Ok(true);
    }

    diesel::update(companies::table.filter(companies::symbol.eq(row.symbol)))
        .set((
            companies::organ_name.eq(row.organ_name),
            companies::exchange_id.eq(row.exchange_id),
            companies::industry_id.eq(row.industry_id),
            companies::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(false)
}

pub fn upsert_price(conn: &mut SqliteConnection, row: &NewPrice<'_>) -> Result<usize, StoreError> {
    let n = insert_into(stock_prices_daily::table)
        .values(row)
        .on_conflict((stock_prices_daily::symbol, stock_prices_daily::date))
        .do_update()
        .set(row)
        .execute(conn)?;
    Ok(n)
}

pub fn upsert_metric(conn: &mut SqliteConnection, row: &NewMetric<'_>) -> Result<usize, StoreError> {
    let n = insert_into(stock_metrics::table)
        .values(row)
        .on_conflict((stock_metrics::symbol, stock_metrics::date))
        .do_update()
        .set(row)
        .execute(conn)?;
    Ok(n)
}

pub fn upsert_market_summary(
    conn: &mut SqliteConnection,
    row: &NewMarketSummary,
) -> Result<usize, StoreError> {
    let n = insert_into(market_summary::table)
        .values(row)
        .on_conflict(market_summary::date)
        .do_update()
        .set(row)
        .execute(conn)?;
    Ok(n)
}

pub fn read_company(conn: &mut SqliteConnection, symbol: &str) -> Result<Option<CompanyRow>, StoreError> {
    let row = companies::table
        .filter(companies::symbol.eq(symbol))
        .select(CompanyRow::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

pub fn read_price(
    conn: &mut SqliteConnection,
    symbol: &str,
    date: NaiveDate,
) -> Result<Option<PriceRow>, StoreError> {
    let row = stock_prices_daily::table
        .filter(stock_prices_daily::symbol.eq(symbol))
        .filter(stock_prices_daily::date.eq(date))
        .select(PriceRow::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

pub fn read_metric(
    conn: &mut SqliteConnection,
    symbol: &str,
    date: NaiveDate,
) -> Result<Option<MetricRow>, StoreError> {
    let row = stock_metrics::table
        .filter(stock_metrics::symbol.eq(symbol))
        .filter(stock_metrics::date.eq(date))
        .select(MetricRow::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}

pub fn read_market_summary(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> Result<Option<MarketSummaryRow>, StoreError> {
    let row = market_summary::table
        .filter(market_summary::date.eq(date))
        .select(MarketSummaryRow::as_select())
        .first(conn)
        .optional()?;
    Ok(row)
}
