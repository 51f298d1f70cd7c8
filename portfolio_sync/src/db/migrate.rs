//! Schema management: embedded migrations, exchange seed and read views.

use diesel::{SqliteConnection, connection::SimpleConnection, insert_into, prelude::*};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::{error::StoreError, models::NewExchange, schema::exchanges};

/// Embedded Diesel migrations bundled with this crate (tables and indexes).
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Exchange codes accepted in the reference file, with display names.
pub const EXCHANGES: [(&str, &str); 3] = [
    ("HOSE", "Ho Chi Minh Stock Exchange"),
    ("HNX", "Hanoi Stock Exchange"),
    ("UPCOM", "Unlisted Public Company Market"),
];

pub const VIEW_NAMES: [&str; 3] = ["v_stock_full_info", "v_latest_prices", "v_stock_dashboard"];

const VIEWS_SQL: &str = r#"
DROP VIEW IF EXISTS v_stock_dashboard;
DROP VIEW IF EXISTS v_latest_prices;
DROP VIEW IF EXISTS v_stock_full_info;

CREATE VIEW v_stock_full_info AS
SELECT
    c.symbol,
    c.organ_name,
    c.short_name,
    e.code AS exchange,
    e.name AS exchange_name,
    i.icb_name AS industry,
    i.sector,
    c.is_active,
    c.listing_date
FROM companies c
LEFT JOIN exchanges e ON c.exchange_id = e.id
LEFT JOIN industries i ON c.industry_id = i.id;

CREATE VIEW v_latest_prices AS
SELECT
    p.symbol,
    p.date,
    p.close AS latest_price,
    p.volume AS latest_volume,
    (p.close - p.open) / NULLIF(p.open, 0) * 100 AS daily_change_pct
FROM stock_prices_daily p
WHERE p.date = (SELECT MAX(p2.date) FROM stock_prices_daily p2 WHERE p2.symbol = p.symbol);

CREATE VIEW v_stock_dashboard AS
SELECT
    f.symbol,
    f.organ_name,
    f.exchange,
    f.industry,
    l.latest_price,
    l.daily_change_pct,
    l.date AS last_update,
    m.beta,
    m.pe_ratio,
    m.eps,
    m.pb_ratio,
    m.roe,
    m.market_cap
FROM v_stock_full_info f
LEFT JOIN v_latest_prices l ON f.symbol = l.symbol
LEFT JOIN stock_metrics m
    ON m.symbol = f.symbol
   AND m.date = (SELECT MAX(m2.date) FROM stock_metrics m2 WHERE m2.symbol = f.symbol)
WHERE f.is_active = 1;
"#;

/// Brings the store to the current schema. Safe to call on every run.
///
/// Migrations, the exchange seed and the view rebuild share one immediate
/// transaction; any failure rolls all of it back and surfaces as
/// [`StoreError::Schema`].
pub fn ensure_schema(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    conn.immediate_transaction::<_, StoreError, _>(|conn| {
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|source| StoreError::Schema { source })?
            .len();
        let seeded = seed_exchanges(conn)?;
        conn.batch_execute(VIEWS_SQL)?;
        info!(migrations = applied, exchanges_seeded = seeded, "schema ready");
        Ok(())
    })
    .map_err(StoreError::into_schema)
}

fn seed_exchanges(conn: &mut SqliteConnection) -> Result<usize, StoreError> {
    let mut seeded = 0;
    for (code, name) in EXCHANGES {
        seeded += insert_into(exchanges::table)
            .values(&NewExchange {
                code,
                name,
                country: "Vietnam",
            })
            .on_conflict(exchanges::code)
            .do_nothing()
            .execute(conn)?;
    }
    Ok(seeded)
}
