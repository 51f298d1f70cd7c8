//! Store access: connections and schema management.
//!
//! - [`connection::connect_sqlite`] opens a connection with WAL journaling,
//!   `foreign_keys=ON` and a 5000 ms busy timeout; [`connection::StoreSession`] wraps it
//!   for the lifetime of one pipeline run.
//! - [`migrate::ensure_schema`] applies the embedded migrations, seeds the exchanges and
//!   recreates the read views in one immediate transaction.
//!
//! ```no_run
//! use portfolio_sync::db::{connection, migrate};
//!
//! let mut conn = connection::connect_sqlite("data/portfolio.db").expect("connect");
//! migrate::ensure_schema(&mut conn).expect("schema");
//! ```

pub mod connection;
pub mod migrate;
