//! Post-load verification counts.

use chrono::NaiveDate;
use diesel::{
    dsl::{count_distinct, max, min},
    prelude::*,
};
use tracing::info;

use crate::{
    error::StoreError,
    schema::{companies, market_summary, stock_metrics, stock_prices_daily},
};

/// Aggregate counts read back from the store after loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub companies: i64,
    pub symbols_with_prices: i64,
    pub price_records: i64,
    pub metric_records: i64,
    pub market_records: i64,
    pub earliest_price_date: Option<NaiveDate>,
    pub latest_price_date: Option<NaiveDate>,
}

pub fn database_stats(conn: &mut SqliteConnection) -> Result<DatabaseStats, StoreError> {
    let stats = DatabaseStats {
        companies: companies::table.count().get_result(conn)?,
        symbols_with_prices: stock_prices_daily::table
            .select(count_distinct(stock_prices_daily::symbol))
            .get_result(conn)?,
        price_records: stock_prices_daily::table.count().get_result(conn)?,
        metric_records: stock_metrics::table.count().get_result(conn)?,
        market_records: market_summary::table.count().get_result(conn)?,
        earliest_price_date: stock_prices_daily::table
            .select(min(stock_prices_daily::date))
            .get_result(conn)?,
        latest_price_date: stock_prices_daily::table
            .select(max(stock_prices_daily::date))
            .get_result(conn)?,
    };
    info!(
        companies = stats.companies,
        symbols_with_prices = stats.symbols_with_prices,
        price_records = stats.price_records,
        metric_records = stats.metric_records,
        market_records = stats.market_records,
        "store verification"
    );
    Ok(stats)
}
