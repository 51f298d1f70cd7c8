//! Diesel models mapping to the database schema.
//!
//! Read models (`Queryable` + `Selectable`) mirror the tables in [`crate::schema`];
//! the `New*` types are the typed records the loader writes. Price, metric and market
//! rows double as their own `ON CONFLICT` changeset, with `None` written as `NULL` so a
//! re-load overwrites every value column.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use crate::schema::*;

/// A row in [`crate::schema::exchanges`]. Seeded by the schema manager.
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = exchanges, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Exchange {
    pub id: i32,
    /// Short code such as `HOSE`.
    pub code: String,
    pub name: Option<String>,
    pub country: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = exchanges)]
pub struct NewExchange<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub country: &'a str,
}

/// A row in [`crate::schema::industries`], created lazily per ICB name.
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable)]
#[diesel(table_name = industries, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Industry {
    pub id: i32,
    pub icb_name: String,
    pub icb_code: Option<String>,
    pub sector: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = industries)]
pub struct NewIndustry<'a> {
    pub icb_name: &'a str,
}

/// A row in [`crate::schema::companies`], unique by symbol.
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations, Selectable)]
#[diesel(table_name = companies, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Exchange, foreign_key = exchange_id))]
#[diesel(belongs_to(Industry, foreign_key = industry_id))]
pub struct CompanyRow {
    pub id: i32,
    pub symbol: String,
    /// Legal name.
    pub organ_name: String,
    pub short_name: Option<String>,
    pub exchange_id: Option<i32>,
    pub industry_id: Option<i32>,
    pub listing_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = companies)]
pub struct NewCompany<'a> {
    pub symbol: &'a str,
    pub organ_name: &'a str,
    pub exchange_id: Option<i32>,
    pub industry_id: Option<i32>,
}

/// A row in [`crate::schema::stock_prices_daily`], unique by `(symbol, date)`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = stock_prices_daily, check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceRow {
    pub id: i32,
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
    /// Traded value, close × volume.
    pub value: Option<f64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = stock_prices_daily, treat_none_as_null = true)]
pub struct NewPrice<'a> {
    pub symbol: &'a str,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
    pub value: Option<f64>,
}

/// A row in [`crate::schema::stock_metrics`], unique by `(symbol, date)`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = stock_metrics, check_for_backend(diesel::sqlite::Sqlite))]
pub struct MetricRow {
    pub id: i32,
    pub symbol: String,
    pub date: NaiveDate,
    pub beta: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub market_cap: Option<f64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = stock_metrics, treat_none_as_null = true)]
pub struct NewMetric<'a> {
    pub symbol: &'a str,
    pub date: NaiveDate,
    pub beta: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub market_cap: Option<f64>,
}

/// A row in [`crate::schema::market_summary`], unique by date.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = market_summary, check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketSummaryRow {
    pub id: i32,
    pub date: NaiveDate,
    pub vnindex: Option<f64>,
    pub vnindex_change: Option<f64>,
    pub vn30: Option<f64>,
    pub vn30_change: Option<f64>,
    pub hnx30: Option<f64>,
    pub hnx30_change: Option<f64>,
    pub hnx_index: Option<f64>,
    pub hnx_index_change: Option<f64>,
    pub total_volume: Option<i64>,
    pub total_value: Option<f64>,
    pub advancing: Option<i32>,
    pub declining: Option<i32>,
    pub unchanged: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable, AsChangeset)]
#[diesel(table_name = market_summary, treat_none_as_null = true)]
pub struct NewMarketSummary {
    pub date: NaiveDate,
    pub vnindex: Option<f64>,
    pub vnindex_change: Option<f64>,
    pub vn30: Option<f64>,
    pub vn30_change: Option<f64>,
    pub hnx30: Option<f64>,
    pub hnx30_change: Option<f64>,
    pub hnx_index: Option<f64>,
    pub hnx_index_change: Option<f64>,
    pub total_volume: Option<i64>,
    pub total_value: Option<f64>,
    pub advancing: Option<i32>,
    pub declining: Option<i32>,
    pub unchanged: Option<i32>,
}
